//! Pipeline behavior against scripted collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use genieconf::DispatchConfig;
use genieparams::{
    Addressing, AmbiguousResult, Machine, ParameterCatalog, ParameterChangeMessage, ToolRegistry,
};
use geniedispatch::{
    CollaboratorError, DesignRequest, DispatchError, DispatchItem, DispatchPipeline, ModelItem,
    PipelineState, PromptClassifier, RawRoutingDecision, RoutingDecider, SoundDesignModel,
    SqliteUsageTracker, UsageError, UsageRecord, UsageStore, UsageTracker,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

struct StubClassifier {
    verdict: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl PromptClassifier for StubClassifier {
    async fn is_sound_design(&self, _prompt: &str) -> Result<bool, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict)
    }
}

/// Replays scripted decisions; the last one repeats.
struct StubRouter {
    script: Vec<Result<RawRoutingDecision, CollaboratorError>>,
    calls: AtomicUsize,
    feedback: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl RoutingDecider for StubRouter {
    async fn decide(
        &self,
        _prompt: &str,
        feedback: Option<&str>,
    ) -> Result<RawRoutingDecision, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.feedback.lock().unwrap().push(feedback.map(str::to_string));
        self.script[n.min(self.script.len() - 1)].clone()
    }
}

/// Replays scripted replies; the last one repeats.
struct StubModel {
    script: Vec<Result<Vec<ModelItem>, CollaboratorError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen_feedback: Mutex<Vec<Vec<String>>>,
    seen_tools: Mutex<Vec<usize>>,
}

#[async_trait]
impl SoundDesignModel for StubModel {
    async fn design(
        &self,
        request: &DesignRequest<'_>,
    ) -> Result<Vec<ModelItem>, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_feedback
            .lock()
            .unwrap()
            .push(request.feedback.to_vec());
        self.seen_tools.lock().unwrap().push(request.tools.len());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script[n.min(self.script.len() - 1)].clone()
    }
}

#[derive(Default)]
struct CountingUsage {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl UsageTracker for CountingUsage {
    async fn record(&self, key: &str) -> Result<UsageRecord, UsageError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(UsageError::Store("database is locked".to_string()));
        }
        Ok(UsageRecord {
            key: key.to_string(),
            request_count: n as u64,
            last_used_at: chrono::Utc::now(),
        })
    }
}

struct Harness {
    classifier: Arc<StubClassifier>,
    router: Arc<StubRouter>,
    model: Arc<StubModel>,
    usage: Arc<CountingUsage>,
    pipeline: DispatchPipeline,
}

fn registry() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::from_catalog(
        &ParameterCatalog::digitone().unwrap(),
    ))
}

fn decision(machine: &str, track: i64) -> Result<RawRoutingDecision, CollaboratorError> {
    Ok(RawRoutingDecision {
        machine: machine.to_string(),
        track,
        reasoning: "named in the prompt".to_string(),
    })
}

fn volume(value: u16) -> ModelItem {
    ModelItem::Change(ParameterChangeMessage::new(
        "set_amp_volume",
        1,
        Addressing::StandardCc { cc: 90 },
        value,
    ))
}

fn cutoff() -> ModelItem {
    ModelItem::Change(ParameterChangeMessage::new(
        "set_multi_mode_filter_frequency",
        1,
        Addressing::Nrpn { msb: 1, lsb: 20 },
        8127,
    ))
}

fn ambiguous(text: &str) -> ModelItem {
    ModelItem::Ambiguous(AmbiguousResult {
        message: text.to_string(),
    })
}

struct Setup {
    config: DispatchConfig,
    verdict: bool,
    routes: Vec<Result<RawRoutingDecision, CollaboratorError>>,
    replies: Vec<Result<Vec<ModelItem>, CollaboratorError>>,
    delay: Option<Duration>,
    usage_fails: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            config: DispatchConfig::default(),
            verdict: true,
            routes: vec![decision("wavetone", 1)],
            replies: vec![Ok(vec![cutoff()])],
            delay: None,
            usage_fails: false,
        }
    }
}

impl Setup {
    fn build(self) -> Harness {
        let classifier = Arc::new(StubClassifier {
            verdict: self.verdict,
            calls: AtomicUsize::new(0),
        });
        let router = Arc::new(StubRouter {
            script: self.routes,
            calls: AtomicUsize::new(0),
            feedback: Mutex::new(Vec::new()),
        });
        let model = Arc::new(StubModel {
            script: self.replies,
            delay: self.delay,
            calls: AtomicUsize::new(0),
            seen_feedback: Mutex::new(Vec::new()),
            seen_tools: Mutex::new(Vec::new()),
        });
        let usage = Arc::new(CountingUsage {
            calls: AtomicUsize::new(0),
            fail: self.usage_fails,
        });
        let pipeline = DispatchPipeline::new(
            self.config,
            registry(),
            classifier.clone(),
            router.clone(),
            model.clone(),
            usage.clone(),
        );
        Harness {
            classifier,
            router,
            model,
            usage,
            pipeline,
        }
    }
}

async fn run(h: &Harness, prompt: &str) -> Result<geniedispatch::DispatchOutcome, DispatchError> {
    h.pipeline
        .run(prompt, "test-key-123", CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_happy_path_returns_messages_and_counts_usage() {
    let h = Setup {
        routes: vec![decision("wavetone", 2)],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "crashing acid bassline on track 2 using wavetone")
        .await
        .unwrap();

    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.decision.machine, Machine::Wavetone);
    assert_eq!(outcome.decision.track, 2);
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 1);

    // Wavetone set plus the shared sets, nothing from other machines
    let offered = h.model.seen_tools.lock().unwrap()[0];
    let expected = h.pipeline.registry().tools_for(Machine::Wavetone).len();
    assert_eq!(offered, expected);
}

#[tokio::test]
async fn test_out_of_range_value_retried_with_feedback() {
    let h = Setup {
        replies: vec![Ok(vec![volume(200)]), Ok(vec![volume(90)])],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "loud pad with wavetone").await.unwrap();

    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.attempts, 2);
    match &outcome.items[0] {
        DispatchItem::Change(msg) => assert_eq!(msg.value, 90),
        other => panic!("unexpected item {:?}", other),
    }
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 1);

    let feedback = h.model.seen_feedback.lock().unwrap();
    assert!(feedback[0].is_empty());
    assert_eq!(feedback[1].len(), 1);
    assert!(feedback[1][0].contains("set_amp_volume"));
    assert!(feedback[1][0].contains("200"));
}

#[tokio::test]
async fn test_model_channel_seventeen_is_retried_not_rerouted() {
    let wrong_channel = ModelItem::Change(ParameterChangeMessage::new(
        "set_amp_volume",
        17,
        Addressing::StandardCc { cc: 90 },
        90,
    ));
    let rejected = ModelItem::Rejected {
        tool: "set_amp_release".to_string(),
        reason: "midi_channel 17 is outside 1-16".to_string(),
    };
    let h = Setup {
        replies: vec![Ok(vec![wrong_channel, rejected]), Ok(vec![volume(90)])],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "quiet pad with wavetone").await.unwrap();

    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(h.router.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 2);

    let feedback = h.model.seen_feedback.lock().unwrap();
    assert!(feedback[1][0].contains("17"));
}

#[tokio::test]
async fn test_always_invalid_exhausts_after_configured_retries() {
    let h = Setup {
        replies: vec![Ok(vec![volume(500)])],
        ..Default::default()
    }
    .build();

    let err = run(&h, "pad with wavetone").await.unwrap_err();

    assert!(matches!(err, DispatchError::ValidationExhausted { attempts: 3, .. }));
    assert_eq!(err.status_code(), 422);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retry_count_follows_config() {
    let h = Setup {
        config: DispatchConfig {
            machine_retries: 0,
            ..Default::default()
        },
        replies: vec![Ok(vec![volume(500)])],
        ..Default::default()
    }
    .build();

    let err = run(&h, "pad with wavetone").await.unwrap_err();
    assert!(matches!(err, DispatchError::ValidationExhausted { attempts: 1, .. }));
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_off_topic_prompt_is_unprocessable_without_routing() {
    let h = Setup {
        verdict: false,
        ..Default::default()
    }
    .build();

    let err = run(&h, "play a C major chord").await.unwrap_err();

    assert!(matches!(err, DispatchError::UnprocessableRequest(_)));
    assert_eq!(err.status_code(), 422);
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.router.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_overlong_prompt_rejected_before_classifier() {
    let h = Setup::default().build();

    let err = run(&h, &"a".repeat(2001)).await.unwrap_err();
    assert!(matches!(err, DispatchError::UnprocessableRequest(_)));
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);

    // Exactly at the limit is fine
    assert!(run(&h, &"a".repeat(2000)).await.is_ok());
}

#[tokio::test]
async fn test_ambiguous_only_reply_skips_validation_and_counts_once() {
    let h = Setup {
        replies: vec![Ok(vec![ambiguous("Which sound do you have in mind?")])],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "make it sound good").await.unwrap();

    assert_eq!(outcome.state, PipelineState::Ambiguous);
    assert_eq!(
        outcome.items,
        vec![DispatchItem::Ambiguous(AmbiguousResult {
            message: "Which sound do you have in mind?".to_string()
        })]
    );
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mixed_reply_with_concrete_message_is_accepted() {
    let h = Setup {
        replies: vec![Ok(vec![cutoff(), ambiguous("Reverb was left alone")])],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "dark pad with wavetone").await.unwrap();
    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.items.len(), 2);

    let json = serde_json::to_value(&outcome.items).unwrap();
    assert_eq!(json[0]["nrpn_lsb"], 20);
    assert_eq!(json[1], serde_json::json!({"message": "Reverb was left alone"}));
}

#[tokio::test]
async fn test_empty_reply_triggers_retry() {
    let h = Setup {
        replies: vec![Ok(vec![]), Ok(vec![cutoff()])],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "pad with wavetone").await.unwrap();
    assert_eq!(outcome.attempts, 2);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rejected_call_and_foreign_tool_trigger_retry() {
    let foreign = ModelItem::Change(ParameterChangeMessage::new(
        "set_fm_drum_tune",
        1,
        Addressing::StandardCc { cc: 40 },
        64,
    ));
    let rejected = ModelItem::Rejected {
        tool: "set_amp_pan".to_string(),
        reason: "value 99 is outside -64 to 64".to_string(),
    };
    let h = Setup {
        routes: vec![decision("swarmer", 1)],
        replies: vec![Ok(vec![foreign]), Ok(vec![rejected]), Ok(vec![volume(100)])],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "supersaw lead with swarmer").await.unwrap();
    assert_eq!(outcome.attempts, 3);

    let feedback = h.model.seen_feedback.lock().unwrap();
    assert!(feedback[1][0].contains("set_fm_drum_tune"));
    assert!(feedback[2][1].contains("outside -64 to 64"));
}

#[tokio::test]
async fn test_malformed_model_reply_is_retried() {
    let h = Setup {
        replies: vec![
            Err(CollaboratorError::Malformed("not json".to_string())),
            Ok(vec![cutoff()]),
        ],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "pad with wavetone").await.unwrap();
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn test_router_gets_one_retry() {
    let h = Setup {
        routes: vec![decision("analog_four", 1), decision("fm_tone", 3)],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "bell with fm tone on track 3").await.unwrap();
    assert_eq!(outcome.decision.machine, Machine::FmTone);
    assert_eq!(outcome.decision.track, 3);
    assert_eq!(
        outcome.decision.original_prompt,
        "bell with fm tone on track 3"
    );
    assert_eq!(h.router.calls.load(Ordering::SeqCst), 2);

    let feedback = h.router.feedback.lock().unwrap();
    assert_eq!(feedback[0], None);
    assert!(feedback[1].as_deref().unwrap().contains("analog_four"));
}

#[tokio::test]
async fn test_bad_routing_twice_fails_without_model_call() {
    let h = Setup {
        routes: vec![decision("fm_tone", 17)],
        ..Default::default()
    }
    .build();

    let err = run(&h, "bell with fm tone on track 17").await.unwrap_err();
    match &err {
        DispatchError::Routing(reason) => assert!(reason.contains("17")),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.status_code(), 422);
    assert_eq!(h.router.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unparsable_routing_counts_as_malformed() {
    let h = Setup {
        routes: vec![
            Err(CollaboratorError::Malformed("expected value".to_string())),
            decision("swarmer", 4),
        ],
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "drone with swarmer on track 4").await.unwrap();
    assert_eq!(outcome.decision.machine, Machine::Swarmer);
}

#[tokio::test]
async fn test_collaborator_failure_is_internal_error() {
    let h = Setup {
        replies: vec![Err(CollaboratorError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })],
        ..Default::default()
    }
    .build();

    let err = run(&h, "pad with wavetone").await.unwrap_err();
    assert!(matches!(err, DispatchError::Collaborator(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_model_times_out() {
    let h = Setup {
        config: DispatchConfig {
            model_timeout_ms: 1_000,
            ..Default::default()
        },
        delay: Some(Duration::from_secs(5)),
        ..Default::default()
    }
    .build();

    let err = run(&h, "pad with wavetone").await.unwrap_err();
    assert!(matches!(err, DispatchError::Timeout { stage: "model", .. }));
    assert_eq!(err.status_code(), 503);
    // Timeouts are not retried and never counted
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_skips_usage() {
    let h = Setup {
        delay: Some(Duration::from_secs(10)),
        ..Default::default()
    }
    .build();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = h
        .pipeline
        .run("pad with wavetone", "test-key-123", cancel)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Cancelled);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_usage_failure_is_swallowed() {
    let h = Setup {
        usage_fails: true,
        ..Default::default()
    }
    .build();

    let outcome = run(&h, "pad with wavetone").await.unwrap();
    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(h.usage.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_budget_exceeded() {
    // classifier + router + 1 model call fit, the retry does not
    let h = Setup {
        config: DispatchConfig {
            max_model_requests: 3,
            ..Default::default()
        },
        replies: vec![Ok(vec![volume(500)])],
        ..Default::default()
    }
    .build();

    let err = run(&h, "pad with wavetone").await.unwrap_err();
    assert_eq!(err, DispatchError::UsageLimitExceeded { limit: 3 });
    assert_eq!(err.status_code(), 429);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_keep_usage_per_credential() {
    let tracker = Arc::new(SqliteUsageTracker::new(UsageStore::in_memory().unwrap()));
    let h = Setup::default().build();
    let pipeline = Arc::new(DispatchPipeline::new(
        DispatchConfig::default(),
        registry(),
        h.classifier.clone(),
        h.router.clone(),
        h.model.clone(),
        tracker.clone(),
    ));

    let mut handles = Vec::new();
    for i in 0..20 {
        let pipeline = pipeline.clone();
        let key = if i % 2 == 0 { "alice-key" } else { "bob-key" };
        handles.push(tokio::spawn(async move {
            pipeline
                .run("pad with wavetone", key, CancellationToken::new())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let store = tracker.store();
    assert_eq!(store.get("alice-key").unwrap().unwrap().request_count, 10);
    assert_eq!(store.get("bob-key").unwrap().unwrap().request_count, 10);
}
