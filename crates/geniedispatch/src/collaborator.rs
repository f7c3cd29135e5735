//! Contracts for the external services a run depends on.
//!
//! The pipeline never trusts what these return. Routing decisions are
//! checked against the known machines and tracks, and model output is
//! re-validated against the wire contract before it leaves the process.

use async_trait::async_trait;
use genieparams::{AmbiguousResult, Machine, ParameterChangeMessage, ToolInfo};
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Decides whether a prompt is about sound design at all.
#[async_trait]
pub trait PromptClassifier: Send + Sync {
    async fn is_sound_design(&self, prompt: &str) -> Result<bool, CollaboratorError>;
}

/// Routing answer exactly as the decider produced it, before checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRoutingDecision {
    pub machine: String,
    pub track: i64,
    #[serde(default)]
    pub reasoning: String,
}

/// Routing answer after the pipeline accepted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineRoutingDecision {
    pub machine: Machine,
    pub track: u8,
    pub reasoning: String,
    pub original_prompt: String,
}

/// Picks the machine and track a prompt is aimed at.
#[async_trait]
pub trait RoutingDecider: Send + Sync {
    /// `feedback` explains what was wrong with the previous decision, if any.
    async fn decide(
        &self,
        prompt: &str,
        feedback: Option<&str>,
    ) -> Result<RawRoutingDecision, CollaboratorError>;
}

/// Everything the tool-enabled model sees for one attempt.
#[derive(Debug, Clone)]
pub struct DesignRequest<'a> {
    pub prompt: &'a str,
    pub decision: &'a MachineRoutingDecision,
    /// Tools the model may call: the machine set plus the shared sets.
    pub tools: &'a [ToolInfo],
    /// Corrections from earlier attempts, oldest first.
    pub feedback: &'a [String],
    /// 1-based.
    pub attempt: u32,
}

/// One element of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelItem {
    Change(ParameterChangeMessage),
    Ambiguous(AmbiguousResult),
    /// A tool call the model made that could not be turned into a message.
    Rejected { tool: String, reason: String },
}

/// The tool-enabled model: prompt plus tool subset in, messages out.
#[async_trait]
pub trait SoundDesignModel: Send + Sync {
    async fn design(&self, request: &DesignRequest<'_>)
        -> Result<Vec<ModelItem>, CollaboratorError>;
}
