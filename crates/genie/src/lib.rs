//! genie - HTTP service and CLI for SynthGenie
//!
//! This library provides:
//! - `web`: axum routes for prompts, tool discovery and health
//! - `serve`: pipeline wiring and the server loop
//! - `commands`: offline CLI commands
//! - `telemetry`: tracing subscriber and OTLP export

pub mod commands;
pub mod serve;
pub mod telemetry;
pub mod web;
