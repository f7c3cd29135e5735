//! Tool registry - one named, typed setter per catalog parameter.
//!
//! Tools are grouped into sets so the model only sees the ones that make
//! sense for the routed machine. Grouping has no other runtime effect.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::ParameterCatalog;
use crate::message::{build_message, BuildError, ParameterChangeMessage};
use crate::types::{DisplayValue, Domain, Machine, ParameterDefinition, Section};

/// Arguments every tool accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ToolArgs {
    /// Display value: a number, an option label, or an `[a, b]` pair.
    pub value: DisplayValue,
    /// MIDI channel (track) to address, 1-16.
    pub midi_channel: i64,
}

/// Tool metadata for discovery and for the model's function list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool {tool} is not available for the {machine} machine")]
    NotExposed { tool: String, machine: Machine },

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Named group of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolSet {
    /// Filter, amp, fx and LFO pages every machine has.
    Universal,
    /// Track mute/level and trig parameters.
    Performance,
    Machine(Machine),
}

impl ToolSet {
    /// Set a section's tools belong to. Non-default filter families belong
    /// to none; they are only reachable by name.
    pub fn for_section(section: Section) -> Option<ToolSet> {
        match section {
            Section::MultiModeFilter | Section::Amp | Section::Fx | Section::Lfo1 | Section::Lfo2 => {
                Some(ToolSet::Universal)
            }
            Section::Track | Section::Trig => Some(ToolSet::Performance),
            other => other.machine().map(ToolSet::Machine),
        }
    }
}

type Invoke = dyn Fn(&ToolArgs) -> Result<ParameterChangeMessage, BuildError> + Send + Sync;

/// A tool bound to exactly one parameter definition.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameter: String,
    pub section: Section,
    invoke: Arc<Invoke>,
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("parameter", &self.parameter)
            .finish_non_exhaustive()
    }
}

impl ToolSpec {
    pub fn for_definition(definition: &ParameterDefinition) -> Self {
        let name = definition.tool_name();
        let description = describe(definition);
        let bound = definition.clone();
        let tool_name = name.clone();
        let invoke = move |args: &ToolArgs| {
            build_message(&bound, args.midi_channel, &args.value, &tool_name)
        };

        Self {
            name,
            description,
            parameter: definition.name.clone(),
            section: definition.section,
            invoke: Arc::new(invoke),
        }
    }

    pub fn call(&self, args: &ToolArgs) -> Result<ParameterChangeMessage, BuildError> {
        (self.invoke)(args)
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: schema_for::<ToolArgs>(),
        }
    }
}

/// Helper to generate JSON schema for a type
pub fn schema_for<T: JsonSchema>() -> Value {
    let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let gen = settings.into_generator();
    let schema = gen.into_root_schema_for::<T>();
    serde_json::to_value(schema).unwrap_or_default()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn describe(def: &ParameterDefinition) -> String {
    let domain = match &def.domain {
        Domain::Range(r) => {
            let mut text = format!(
                "Value ranges from {} to {}",
                format_number(r.min_display),
                format_number(r.max_display)
            );
            if !r.is_integer {
                text.push_str(", decimals allowed");
            }
            text
        }
        Domain::Enum(e) => {
            let labels: Vec<_> = e.options.iter().map(|o| o.label.as_str()).collect();
            format!("Value is one of: {}", labels.join(", "))
        }
        Domain::MultiCounter(m) => {
            let steps: Vec<_> = m.a.steps.iter().map(|s| format_number(*s)).collect();
            format!(
                "Value is a pair [{}, {}], each one of: {}",
                m.a.name,
                m.b.name,
                steps.join(", ")
            )
        }
    };

    let mut text = format!("{} ({}, {}). {}.", def.summary, def.label, def.addressing, domain);
    if let Some(default) = &def.default_display {
        text.push_str(&format!(" Default is {}.", default));
    }
    text
}

/// Every tool, indexed by name and grouped into sets.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
    by_name: HashMap<String, usize>,
    sets: HashMap<ToolSet, Vec<usize>>,
}

impl ToolRegistry {
    pub fn from_catalog(catalog: &ParameterCatalog) -> Self {
        let mut registry = Self::default();
        for definition in catalog.iter() {
            let spec = ToolSpec::for_definition(definition);
            let idx = registry.tools.len();
            registry.by_name.insert(spec.name.clone(), idx);
            if let Some(set) = ToolSet::for_section(definition.section) {
                registry.sets.entry(set).or_default().push(idx);
            }
            registry.tools.push(spec);
        }
        tracing::debug!(tools = registry.tools.len(), "Tool registry built");
        registry
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn set(&self, set: ToolSet) -> Vec<&ToolSpec> {
        self.sets
            .get(&set)
            .map(|ids| ids.iter().map(|&i| &self.tools[i]).collect())
            .unwrap_or_default()
    }

    /// Tools offered to the model for one machine: its own set, then the
    /// universal and performance sets.
    pub fn tools_for(&self, machine: Machine) -> Vec<&ToolSpec> {
        let mut tools = self.set(ToolSet::Machine(machine));
        tools.extend(self.set(ToolSet::Universal));
        tools.extend(self.set(ToolSet::Performance));
        tools
    }

    pub fn is_exposed(&self, machine: Machine, name: &str) -> bool {
        let Some(spec) = self.get(name) else {
            return false;
        };
        match ToolSet::for_section(spec.section) {
            Some(ToolSet::Machine(m)) => m == machine,
            Some(_) => true,
            None => false,
        }
    }

    /// Tool infos for one machine, or for every tool when `machine` is `None`.
    pub fn infos(&self, machine: Option<Machine>) -> Vec<ToolInfo> {
        match machine {
            Some(m) => self.tools_for(m).into_iter().map(ToolSpec::info).collect(),
            None => self.tools.iter().map(ToolSpec::info).collect(),
        }
    }

    /// Call any tool by name with raw JSON arguments.
    pub fn invoke(&self, name: &str, args: Value) -> Result<ParameterChangeMessage, ToolError> {
        let spec = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args: ToolArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
                tool: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(spec.call(&args)?)
    }

    /// Like [`invoke`](Self::invoke), but only for tools exposed to `machine`.
    pub fn invoke_in(
        &self,
        machine: Machine,
        name: &str,
        args: Value,
    ) -> Result<ParameterChangeMessage, ToolError> {
        if self.get(name).is_none() {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        if !self.is_exposed(machine, name) {
            return Err(ToolError::NotExposed {
                tool: name.to_string(),
                machine,
            });
        }
        self.invoke(name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DomainError;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::from_catalog(&ParameterCatalog::digitone().unwrap())
    }

    #[test]
    fn test_every_definition_gets_a_tool() {
        let catalog = ParameterCatalog::digitone().unwrap();
        let registry = ToolRegistry::from_catalog(&catalog);
        assert_eq!(registry.len(), catalog.len());
        assert!(registry.get("set_fm_drum_sweep_time").is_some());
        assert!(registry.get("set_lfo1_trigger_mode").is_some());
        assert!(registry.get("set_comb_plus_filter_feedback").is_some());
    }

    #[test]
    fn test_machine_sets_do_not_leak() {
        let registry = registry();
        let fm_drum: Vec<_> = registry
            .tools_for(Machine::FmDrum)
            .into_iter()
            .map(|t| t.name.clone())
            .collect();
        assert!(fm_drum.contains(&"set_fm_drum_tune".to_string()));
        assert!(fm_drum.contains(&"set_multi_mode_filter_frequency".to_string()));
        assert!(fm_drum.contains(&"set_trig_note".to_string()));
        assert!(!fm_drum.iter().any(|n| n.starts_with("set_fm_tone_")));
        assert!(!fm_drum.iter().any(|n| n.starts_with("set_comb_minus_filter_")));
    }

    #[test]
    fn test_set_sizes() {
        let registry = registry();
        assert_eq!(registry.set(ToolSet::Machine(Machine::Swarmer)).len(), 8);
        assert_eq!(registry.set(ToolSet::Machine(Machine::Wavetone)).len(), 23);
        assert_eq!(registry.set(ToolSet::Machine(Machine::FmDrum)).len(), 30);
        assert_eq!(registry.set(ToolSet::Performance).len(), 9);
    }

    #[test]
    fn test_invoke_filter_cutoff() {
        let msg = registry()
            .invoke(
                "set_multi_mode_filter_frequency",
                json!({"value": 63, "midi_channel": 1}),
            )
            .unwrap();
        assert_eq!(msg.used_tool, "set_multi_mode_filter_frequency");
        assert_eq!(msg.value, 8127);
        assert_eq!((msg.nrpn_msb, msg.nrpn_lsb), (Some(1), Some(20)));
        assert_eq!(msg.midi_cc, None);
    }

    #[test]
    fn test_invoke_enum_label() {
        let msg = registry()
            .invoke("set_lfo1_waveform", json!({"value": "saw", "midi_channel": 4}))
            .unwrap();
        assert_eq!(msg.midi_cc, Some(106));
        assert_eq!(msg.value, 3);
        assert_eq!(msg.midi_channel, 4);
    }

    #[test]
    fn test_invoke_b_ratio_pair() {
        let msg = registry()
            .invoke("set_fm_tone_b_ratio", json!({"value": [1.0, 2.0], "midi_channel": 2}))
            .unwrap();
        // b1 = 1 is step 2, b2 = 2 is step 3
        assert_eq!(msg.value, 2 * 19 + 3);
        assert_eq!((msg.nrpn_msb, msg.nrpn_lsb), (Some(1), Some(76)));
    }

    #[test]
    fn test_invoke_errors() {
        let registry = registry();
        assert!(matches!(
            registry.invoke("set_nothing", json!({"value": 1, "midi_channel": 1})),
            Err(ToolError::UnknownTool(_))
        ));
        assert!(matches!(
            registry.invoke("set_amp_volume", json!({"value": 1})),
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(matches!(
            registry.invoke("set_amp_volume", json!({"value": 90, "midi_channel": 17})),
            Err(ToolError::Build(BuildError::ChannelOutOfRange(17)))
        ));
        match registry.invoke("set_amp_volume", json!({"value": 200, "midi_channel": 1})) {
            Err(ToolError::Build(BuildError::ValueOutOfRange { source, .. })) => {
                assert!(matches!(source, DomainError::OutOfRange { .. }));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_invoke_in_respects_machine() {
        let registry = registry();
        let args = json!({"value": 10, "midi_channel": 1});
        assert!(registry
            .invoke_in(Machine::Swarmer, "set_swarmer_detune", args.clone())
            .is_ok());
        assert!(matches!(
            registry.invoke_in(Machine::Swarmer, "set_fm_drum_tune", args.clone()),
            Err(ToolError::NotExposed { machine: Machine::Swarmer, .. })
        ));
        assert!(registry.invoke_in(Machine::Swarmer, "set_amp_pan", args).is_ok());
    }

    #[test]
    fn test_tool_info_schema_and_description() {
        let registry = registry();
        let info = registry.get("set_amp_envelope_mode").unwrap().info();
        assert!(info.description.contains("AHD, ADSR"));
        assert!(info.description.contains("Default is ADSR"));
        let props = &info.input_schema["properties"];
        assert!(props.get("value").is_some());
        assert!(props.get("midi_channel").is_some());
    }
}
