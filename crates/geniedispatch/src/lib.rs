//! Dispatch pipeline for SynthGenie.
//!
//! Takes a free-text prompt and a caller credential, and returns validated
//! MIDI change messages for an Elektron Digitone:
//!
//! 1. classify the prompt ([`PromptClassifier`])
//! 2. pick machine and track ([`RoutingDecider`])
//! 3. let a tool-calling model set parameters ([`SoundDesignModel`])
//! 4. re-check every message, retrying with feedback
//! 5. count the request ([`UsageTracker`])
//!
//! The `Llm*` collaborators talk to any OpenAI-compatible endpoint.

pub mod agents;
pub mod chat;
pub mod collaborator;
pub mod error;
pub mod pipeline;
pub mod usage;

pub use agents::{LlmPromptClassifier, LlmRoutingDecider, LlmSoundDesigner};
pub use chat::ChatClient;
pub use collaborator::{
    DesignRequest, MachineRoutingDecision, ModelItem, PromptClassifier, RawRoutingDecision,
    RoutingDecider, SoundDesignModel,
};
pub use error::{CollaboratorError, DispatchError, UsageError};
pub use pipeline::{DispatchItem, DispatchOutcome, DispatchPipeline, PipelineState};
pub use usage::{SqliteUsageTracker, UsageRecord, UsageStore, UsageTracker};
