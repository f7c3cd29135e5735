//! Prompt in, validated MIDI change messages out.
//!
//! ```text
//! Validating -> Routing -> Executing -> ValidatingOutput -> TrackingUsage -> Done
//!                               ^               |
//!                               +--- retry -----+
//! ```
//!
//! Any state may fall into `Failed`. A model reply made only of ambiguous
//! answers skips output validation and lands in `Ambiguous`.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use genieconf::DispatchConfig;
use genieparams::{
    AmbiguousResult, Machine, ParameterChangeMessage, ToolInfo, ToolRegistry, MAX_CHANNEL,
    MIN_CHANNEL,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collaborator::{
    DesignRequest, MachineRoutingDecision, ModelItem, PromptClassifier, RawRoutingDecision,
    RoutingDecider, SoundDesignModel,
};
use crate::error::{CollaboratorError, DispatchError};
use crate::usage::UsageTracker;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    Routing,
    Executing,
    ValidatingOutput,
    TrackingUsage,
    Done,
    Ambiguous,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Ambiguous | PipelineState::Failed
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Validating => "validating",
            PipelineState::Routing => "routing",
            PipelineState::Executing => "executing",
            PipelineState::ValidatingOutput => "validating_output",
            PipelineState::TrackingUsage => "tracking_usage",
            PipelineState::Done => "done",
            PipelineState::Ambiguous => "ambiguous",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One element of the response list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchItem {
    Change(ParameterChangeMessage),
    Ambiguous(AmbiguousResult),
}

/// Successful end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// `Done` or `Ambiguous`.
    pub state: PipelineState,
    pub items: Vec<DispatchItem>,
    pub decision: MachineRoutingDecision,
    /// Generation attempts used, 1-based.
    pub attempts: u32,
}

/// Collaborator calls left in one run.
struct Budget {
    limit: u32,
    used: AtomicU32,
}

impl Budget {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    fn take(&self) -> Result<(), DispatchError> {
        let used = self.used.fetch_add(1, Ordering::SeqCst) + 1;
        if used > self.limit {
            return Err(DispatchError::UsageLimitExceeded { limit: self.limit });
        }
        Ok(())
    }
}

/// Outcome of checking one model reply.
enum Verdict {
    Accept(Vec<DispatchItem>),
    AmbiguousOnly(Vec<DispatchItem>),
    Retry(String),
}

/// The dispatch state machine and its collaborators.
///
/// Cheap to share: hold it in an `Arc` and call [`run`](Self::run) from as
/// many tasks as needed. Nothing in here is mutated by a run.
pub struct DispatchPipeline {
    config: DispatchConfig,
    registry: Arc<ToolRegistry>,
    classifier: Arc<dyn PromptClassifier>,
    router: Arc<dyn RoutingDecider>,
    model: Arc<dyn SoundDesignModel>,
    usage: Arc<dyn UsageTracker>,
}

impl DispatchPipeline {
    pub fn new(
        config: DispatchConfig,
        registry: Arc<ToolRegistry>,
        classifier: Arc<dyn PromptClassifier>,
        router: Arc<dyn RoutingDecider>,
        model: Arc<dyn SoundDesignModel>,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            config,
            registry,
            classifier,
            router,
            model,
            usage,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Drive one prompt through every state.
    ///
    /// `credential` is only used to count usage. Cancelling `cancel` aborts
    /// the in-flight collaborator call and skips usage tracking.
    #[tracing::instrument(
        skip(self, prompt, credential, cancel),
        fields(
            run.id = %Uuid::new_v4(),
            credential = %fingerprint(credential),
            machine = tracing::field::Empty,
            track = tracing::field::Empty,
        )
    )]
    pub async fn run(
        &self,
        prompt: &str,
        credential: &str,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome, DispatchError> {
        tracing::info!(prompt = %preview(prompt), "Dispatch started");
        let mut state = PipelineState::Validating;
        let budget = Budget::new(self.config.max_model_requests);

        let result = self.drive(&mut state, prompt, credential, &budget, &cancel).await;
        match &result {
            Ok(outcome) => {
                tracing::info!(
                    state = %outcome.state,
                    items = outcome.items.len(),
                    attempts = outcome.attempts,
                    "Dispatch finished"
                );
            }
            Err(e) => {
                transition(&mut state, PipelineState::Failed);
                tracing::warn!(error = %e, status = e.status_code(), "Dispatch failed");
            }
        }
        result
    }

    async fn drive(
        &self,
        state: &mut PipelineState,
        prompt: &str,
        credential: &str,
        budget: &Budget,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.validate_prompt(prompt, budget, cancel).await?;

        transition(state, PipelineState::Routing);
        let decision = self.route(prompt, budget, cancel).await?;
        let span = tracing::Span::current();
        span.record("machine", decision.machine.as_str());
        span.record("track", decision.track);

        transition(state, PipelineState::Executing);
        let (items, terminal, attempts) = self
            .execute(state, prompt, &decision, budget, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        transition(state, PipelineState::TrackingUsage);
        self.track_usage(credential).await;
        transition(state, terminal);

        Ok(DispatchOutcome {
            state: terminal,
            items,
            decision,
            attempts,
        })
    }

    async fn validate_prompt(
        &self,
        prompt: &str,
        budget: &Budget,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let length = prompt.chars().count();
        if length > self.config.max_prompt_length {
            return Err(DispatchError::UnprocessableRequest(format!(
                "prompt is {} characters, the limit is {}",
                length, self.config.max_prompt_length
            )));
        }
        if prompt.trim().is_empty() {
            return Err(DispatchError::UnprocessableRequest(
                "prompt is empty".to_string(),
            ));
        }

        budget.take()?;
        let about_sound = self
            .call(
                "classification",
                self.config.routing_timeout(),
                cancel,
                self.classifier.is_sound_design(prompt),
            )
            .await?
            .map_err(|e| DispatchError::Collaborator(e.to_string()))?;

        if !about_sound {
            return Err(DispatchError::UnprocessableRequest(
                "prompt is not about sound design".to_string(),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn route(
        &self,
        prompt: &str,
        budget: &Budget,
        cancel: &CancellationToken,
    ) -> Result<MachineRoutingDecision, DispatchError> {
        let attempts = 1 + self.config.router_retries;
        let mut feedback: Option<String> = None;

        for attempt in 1..=attempts {
            budget.take()?;
            let reply = self
                .call(
                    "routing",
                    self.config.routing_timeout(),
                    cancel,
                    self.router.decide(prompt, feedback.as_deref()),
                )
                .await?;

            let problem = match reply {
                Ok(raw) => match check_decision(raw, prompt) {
                    Ok(decision) => {
                        tracing::debug!(
                            attempt,
                            machine = %decision.machine,
                            track = decision.track,
                            "Routing accepted"
                        );
                        return Ok(decision);
                    }
                    Err(problem) => problem,
                },
                Err(CollaboratorError::Malformed(detail)) => {
                    format!("the decision could not be parsed: {}", detail)
                }
                Err(other) => return Err(DispatchError::Collaborator(other.to_string())),
            };

            tracing::info!(attempt, problem = %problem, "Routing decision rejected");
            feedback = Some(problem);
        }

        Err(DispatchError::Routing(
            feedback.unwrap_or_else(|| "no routing decision".to_string()),
        ))
    }

    /// Executing and ValidatingOutput, looped until the output is clean or
    /// the retry budget is gone.
    async fn execute(
        &self,
        state: &mut PipelineState,
        prompt: &str,
        decision: &MachineRoutingDecision,
        budget: &Budget,
        cancel: &CancellationToken,
    ) -> Result<(Vec<DispatchItem>, PipelineState, u32), DispatchError> {
        let tools: Vec<ToolInfo> = self.registry.infos(Some(decision.machine));
        let attempts = 1 + self.config.machine_retries;
        let mut feedback: Vec<String> = Vec::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                transition(state, PipelineState::Executing);
            }
            budget.take()?;

            let request = DesignRequest {
                prompt,
                decision,
                tools: &tools,
                feedback: &feedback,
                attempt,
            };
            let reply = self
                .call(
                    "model",
                    self.config.model_timeout(),
                    cancel,
                    self.model.design(&request),
                )
                .await?;

            transition(state, PipelineState::ValidatingOutput);
            let verdict = match reply {
                Ok(items) => self.judge(decision.machine, items),
                Err(CollaboratorError::Malformed(detail)) => {
                    Verdict::Retry(format!("The reply could not be read: {}", detail))
                }
                Err(other) => return Err(DispatchError::Collaborator(other.to_string())),
            };

            match verdict {
                Verdict::Accept(items) => return Ok((items, PipelineState::Done, attempt)),
                Verdict::AmbiguousOnly(items) => {
                    return Ok((items, PipelineState::Ambiguous, attempt))
                }
                Verdict::Retry(problem) => {
                    tracing::info!(attempt, problem = %problem, "Model output rejected");
                    feedback.push(problem);
                }
            }
        }

        Err(DispatchError::ValidationExhausted {
            attempts,
            last: feedback.pop().unwrap_or_default(),
        })
    }

    fn judge(&self, machine: Machine, items: Vec<ModelItem>) -> Verdict {
        if items.is_empty() {
            return Verdict::Retry(
                "The reply contained no parameter changes. Call at least one tool, \
                 or answer with a short explanation if the request cannot be done."
                    .to_string(),
            );
        }

        let mut accepted = Vec::with_capacity(items.len());
        let mut problems = Vec::new();
        let mut concrete = 0usize;

        for item in items {
            match item {
                ModelItem::Change(msg) => {
                    concrete += 1;
                    if !self.registry.is_exposed(machine, &msg.used_tool) {
                        problems.push(format!(
                            "{} is not a tool for the {} machine",
                            msg.used_tool, machine
                        ));
                        continue;
                    }
                    let violations = msg.validate();
                    if violations.is_empty() {
                        accepted.push(DispatchItem::Change(msg));
                    } else {
                        for v in violations {
                            problems.push(format!("{}: {}", msg.used_tool, v));
                        }
                    }
                }
                ModelItem::Ambiguous(amb) => accepted.push(DispatchItem::Ambiguous(amb)),
                ModelItem::Rejected { tool, reason } => {
                    concrete += 1;
                    problems.push(format!("{}: {}", tool, reason));
                }
            }
        }

        if concrete == 0 {
            return Verdict::AmbiguousOnly(accepted);
        }
        if !problems.is_empty() {
            return Verdict::Retry(format!(
                "These calls were invalid, fix them and try again: {}",
                problems.join("; ")
            ));
        }
        Verdict::Accept(accepted)
    }

    async fn track_usage(&self, credential: &str) {
        match self.usage.record(credential).await {
            Ok(record) => {
                tracing::debug!(request_count = record.request_count, "Usage recorded");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Usage tracking failed; continuing");
            }
        }
    }

    /// Run a collaborator call under a deadline, racing cancellation.
    async fn call<T, F>(
        &self,
        stage: &'static str,
        limit: Duration,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<Result<T, CollaboratorError>, DispatchError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = tokio::time::timeout(limit, fut) => {
                result.map_err(|_| DispatchError::Timeout { stage, after: limit })
            }
        }
    }
}

/// Accept a raw decision only for a known machine and a track in 1-16.
fn check_decision(
    raw: RawRoutingDecision,
    prompt: &str,
) -> Result<MachineRoutingDecision, String> {
    let machine: Machine = raw.machine.parse().map_err(|_| {
        let known: Vec<_> = Machine::ALL.iter().map(Machine::as_str).collect();
        format!(
            "machine {:?} is not one of {}",
            raw.machine,
            known.join(", ")
        )
    })?;
    if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&raw.track) {
        return Err(format!("track {} is outside 1-16", raw.track));
    }
    Ok(MachineRoutingDecision {
        machine,
        track: raw.track as u8,
        reasoning: raw.reasoning,
        original_prompt: prompt.to_string(),
    })
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    tracing::debug!(from = %state, to = %next, "Pipeline transition");
    *state = next;
}

/// First characters of a prompt, for logs.
fn preview(prompt: &str) -> String {
    const LIMIT: usize = 100;
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(LIMIT).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Enough of a credential to tell callers apart in logs.
pub fn fingerprint(credential: &str) -> String {
    let head: String = credential.chars().take(6).collect();
    format!("{}***", head)
}
