//! Pipeline limits and language model endpoint settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds applied to every dispatch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Prompts longer than this many characters are rejected.
    #[serde(default = "DispatchConfig::default_max_prompt_length")]
    pub max_prompt_length: usize,

    /// Extra attempts after a machine agent returns invalid output.
    #[serde(default = "DispatchConfig::default_machine_retries")]
    pub machine_retries: u32,

    /// Extra attempts after the router returns a malformed decision.
    #[serde(default = "DispatchConfig::default_router_retries")]
    pub router_retries: u32,

    /// Per-call deadline for classification and routing.
    #[serde(default = "DispatchConfig::default_routing_timeout_ms")]
    pub routing_timeout_ms: u64,

    /// Per-call deadline for the tool-enabled model run.
    #[serde(default = "DispatchConfig::default_model_timeout_ms")]
    pub model_timeout_ms: u64,

    /// Collaborator calls allowed in one run before it fails as over limit.
    #[serde(default = "DispatchConfig::default_max_model_requests")]
    pub max_model_requests: u32,
}

impl DispatchConfig {
    fn default_max_prompt_length() -> usize {
        2000
    }

    fn default_machine_retries() -> u32 {
        2
    }

    fn default_router_retries() -> u32 {
        1
    }

    fn default_routing_timeout_ms() -> u64 {
        30_000
    }

    fn default_model_timeout_ms() -> u64 {
        60_000
    }

    fn default_max_model_requests() -> u32 {
        64
    }

    pub fn routing_timeout(&self) -> Duration {
        Duration::from_millis(self.routing_timeout_ms)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_prompt_length: Self::default_max_prompt_length(),
            machine_retries: Self::default_machine_retries(),
            router_retries: Self::default_router_retries(),
            routing_timeout_ms: Self::default_routing_timeout_ms(),
            model_timeout_ms: Self::default_model_timeout_ms(),
            max_model_requests: Self::default_max_model_requests(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default: https://api.openai.com/v1
    #[serde(default = "ModelConfig::default_base_url")]
    pub base_url: String,

    /// Model for the machine sound designers.
    #[serde(default = "ModelConfig::default_model")]
    pub model: String,

    /// Model for routing; falls back to `model`.
    #[serde(default)]
    pub router_model: Option<String>,

    /// Model for the topical classifier; falls back to `model`.
    #[serde(default)]
    pub classifier_model: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "ModelConfig::default_temperature")]
    pub temperature: f32,
}

impl ModelConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_model() -> String {
        "gpt-4".to_string()
    }

    fn default_temperature() -> f32 {
        0.3
    }

    pub fn router_model(&self) -> &str {
        self.router_model.as_deref().unwrap_or(&self.model)
    }

    pub fn classifier_model(&self) -> &str {
        self.classifier_model.as_deref().unwrap_or(&self.model)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            router_model: None,
            classifier_model: None,
            api_key: None,
            temperature: Self::default_temperature(),
        }
    }
}
