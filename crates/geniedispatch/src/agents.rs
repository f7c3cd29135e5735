//! Language-model backed collaborators.
//!
//! Each one turns a single chat completion into the typed answer its trait
//! promises. Tool calls are executed locally through the [`ToolRegistry`];
//! the model only ever names a tool and its arguments.

use std::sync::Arc;

use async_trait::async_trait;
use genieconf::ModelConfig;
use genieparams::{AmbiguousResult, Machine, ToolRegistry};
use serde::Deserialize;
use serde_json::Value;

use crate::chat::{ChatClient, ChatMessage, ChatRequest, ChatTool};
use crate::collaborator::{
    DesignRequest, ModelItem, PromptClassifier, RawRoutingDecision, RoutingDecider,
    SoundDesignModel,
};
use crate::error::CollaboratorError;

const CLASSIFIER_PROMPT: &str = "\
You decide whether a request belongs to a synthesizer sound-design assistant.

Answer True for:
- Sound design: synthesizer programming, shaping timbre, textures or atmospheres, \
sound effects, envelopes, filters, modulation or effects for a specific sound. \
\"Make a gritty bass for industrial techno\", \"how do I get an 80s reverb?\"
- Parameter commands: setting or adjusting a synth parameter directly, including \
modulation routings and per-track settings. \"Set filter cutoff to 127\", \
\"on track 4 set lfo2 destination to filter envelope depth\", \"reverb send to 40%\"
- Parameter questions: what a parameter does, where it lives or what controls a \
sound characteristic. \"What does resonance do?\", \"where is the overdrive?\", \
\"how do I make it brighter?\"

Answer False for composition, harmony, playing notes or chords, tempo, mixing, \
arrangement, gear purchases, music history, and anything vague or ambiguous.

Answer with exactly one word, True or False.";

const ROUTER_PROMPT: &str = "\
You route requests for an Elektron Digitone to one of its synthesis machines.

Machines: fm_tone, fm_drum, wavetone, swarmer. The user names the machine \
somewhere in the request (\"with FM Tone\", \"using wavetone\", \"on the swarmer\"). \
If no machine is named, pick wavetone and say so in the reasoning.

Tracks are 1-16. Read phrases like \"track 5\" or \"channel 3\"; use 1 when none is given.

Reply with a JSON object only: {\"machine\": string, \"track\": integer, \"reasoning\": string}";

fn machine_brief(machine: Machine) -> &'static str {
    match machine {
        Machine::FmTone => {
            "FM Tone: four operators (C, A, B1, B2) in eight algorithms. Ratios set the \
             harmonic relationship, operator levels and envelopes shape brightness over \
             time, feedback and harmonics add grit. Good for keys, bells, pads and basses."
        }
        Machine::FmDrum => {
            "FM Drum: a body section with pitch sweep, a noise section and a transient. \
             Tune and sweep shape the hit, body decay sets its length, noise and transient \
             add snap and air. Good for kicks, snares, toms, hats and percussion."
        }
        Machine::Wavetone => {
            "Wavetone: two wavetable oscillators with phase distortion, ring modulation or \
             hard sync between them, plus a shaped noise source. Good for basses, leads, \
             evolving pads and metallic textures."
        }
        Machine::Swarmer => {
            "Swarmer: one main oscillator with a swarm of detuned copies around it. Swarm \
             and detune set width and thickness, animation adds movement. Good for \
             supersaw leads, lush pads and thick drones."
        }
    }
}

fn designer_prompt(machine: Machine, track: u8) -> String {
    format!(
        "You are a sound designer programming an Elektron Digitone.\n\n\
         {}\n\n\
         Build the requested sound by calling the tools. Every call takes a display \
         value in the range its description states and midi_channel {}. Set only the \
         parameters that matter for the sound, usually between 5 and 25 of them, and \
         include the filter and amp envelope.\n\n\
         If the request cannot be done with these tools, do not call any and answer \
         with one short sentence explaining why.",
        machine_brief(machine),
        track
    )
}

/// Asks the model for a one-word True/False verdict.
pub struct LlmPromptClassifier {
    client: ChatClient,
    model: String,
}

impl LlmPromptClassifier {
    pub fn new(client: ChatClient, config: &ModelConfig) -> Self {
        Self {
            client,
            model: config.classifier_model().to_string(),
        }
    }
}

#[async_trait]
impl PromptClassifier for LlmPromptClassifier {
    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn is_sound_design(&self, prompt: &str) -> Result<bool, CollaboratorError> {
        let mut request = ChatRequest::new(
            &self.model,
            vec![ChatMessage::system(CLASSIFIER_PROMPT), ChatMessage::user(prompt)],
        );
        request.temperature = Some(0.0);

        let message = self.client.complete(&request).await?.into_message()?;
        let verdict = message.content.unwrap_or_default();
        let verdict = verdict.trim().trim_end_matches('.');
        tracing::debug!(verdict, "Prompt classified");
        Ok(verdict.eq_ignore_ascii_case("true"))
    }
}

#[derive(Debug, Deserialize)]
struct RouterReply {
    machine: String,
    #[serde(default)]
    track: Option<i64>,
    #[serde(default)]
    reasoning: String,
}

/// Asks the model for a JSON routing decision.
pub struct LlmRoutingDecider {
    client: ChatClient,
    model: String,
}

impl LlmRoutingDecider {
    pub fn new(client: ChatClient, config: &ModelConfig) -> Self {
        Self {
            client,
            model: config.router_model().to_string(),
        }
    }
}

/// Default track when the reply leaves it out.
const DEFAULT_TRACK: i64 = 1;

fn parse_router_reply(content: &str) -> Result<RawRoutingDecision, CollaboratorError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let reply: RouterReply = serde_json::from_str(trimmed)
        .map_err(|e| CollaboratorError::Malformed(format!("routing reply: {}", e)))?;
    Ok(RawRoutingDecision {
        machine: reply.machine,
        track: reply.track.unwrap_or(DEFAULT_TRACK),
        reasoning: reply.reasoning,
    })
}

#[async_trait]
impl RoutingDecider for LlmRoutingDecider {
    #[tracing::instrument(skip_all, fields(model = %self.model, retry = feedback.is_some()))]
    async fn decide(
        &self,
        prompt: &str,
        feedback: Option<&str>,
    ) -> Result<RawRoutingDecision, CollaboratorError> {
        let mut messages = vec![ChatMessage::system(ROUTER_PROMPT), ChatMessage::user(prompt)];
        if let Some(feedback) = feedback {
            messages.push(ChatMessage::user(format!(
                "Your previous decision was rejected: {}. Reply again with valid JSON.",
                feedback
            )));
        }

        let mut request = ChatRequest::new(&self.model, messages);
        request.temperature = Some(0.0);
        request.response_format = Some(serde_json::json!({"type": "json_object"}));

        let message = self.client.complete(&request).await?.into_message()?;
        parse_router_reply(message.content.as_deref().unwrap_or_default())
    }
}

/// Tool-calling sound designer, one chat completion per attempt.
pub struct LlmSoundDesigner {
    client: ChatClient,
    registry: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
}

impl LlmSoundDesigner {
    pub fn new(client: ChatClient, registry: Arc<ToolRegistry>, config: &ModelConfig) -> Self {
        Self {
            client,
            registry,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl SoundDesignModel for LlmSoundDesigner {
    #[tracing::instrument(
        skip_all,
        fields(
            model = %self.model,
            machine = %request.decision.machine,
            attempt = request.attempt,
            tool_calls = tracing::field::Empty,
        )
    )]
    async fn design(
        &self,
        request: &DesignRequest<'_>,
    ) -> Result<Vec<ModelItem>, CollaboratorError> {
        let decision = request.decision;
        let mut messages = vec![
            ChatMessage::system(designer_prompt(decision.machine, decision.track)),
            ChatMessage::user(request.prompt),
        ];
        for note in request.feedback {
            messages.push(ChatMessage::user(note.clone()));
        }

        let mut chat = ChatRequest::new(&self.model, messages);
        chat.temperature = Some(self.temperature);
        chat.tools = Some(request.tools.iter().map(ChatTool::from).collect());

        let message = self.client.complete(&chat).await?.into_message()?;
        let calls = message.tool_calls.unwrap_or_default();
        tracing::Span::current().record("tool_calls", calls.len());

        if calls.is_empty() {
            let text = message.content.unwrap_or_default();
            let text = text.trim();
            if text.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![ModelItem::Ambiguous(AmbiguousResult {
                message: text.to_string(),
            })]);
        }

        let items = calls
            .into_iter()
            .map(|call| {
                let name = call.function.name;
                let args: Value = match serde_json::from_str(&call.function.arguments) {
                    Ok(args) => args,
                    Err(e) => {
                        return ModelItem::Rejected {
                            tool: name,
                            reason: format!("arguments are not valid JSON: {}", e),
                        }
                    }
                };
                match self.registry.invoke_in(decision.machine, &name, args) {
                    Ok(msg) => ModelItem::Change(msg),
                    Err(e) => ModelItem::Rejected {
                        tool: name,
                        reason: e.to_string(),
                    },
                }
            })
            .collect();
        Ok(items)
    }
}
