//! Wire contract and the builder that produces it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ParameterCatalog;
use crate::codec::{self, DomainError};
use crate::types::{Addressing, DisplayValue, ParameterDefinition, MAX_14BIT, MAX_7BIT};

/// Lowest and highest MIDI channel a message may target.
pub const MIN_CHANNEL: i64 = 1;
pub const MAX_CHANNEL: i64 = 16;

/// One parameter change, serialized exactly as clients expect it.
///
/// Exactly one addressing payload is populated: `midi_cc` alone,
/// `midi_cc` + `midi_cc_lsb`, or `nrpn_msb` + `nrpn_lsb`. Unused slots
/// serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterChangeMessage {
    pub used_tool: String,
    pub midi_channel: u8,
    pub value: u16,
    pub midi_cc: Option<u8>,
    pub midi_cc_lsb: Option<u8>,
    pub nrpn_msb: Option<u8>,
    pub nrpn_lsb: Option<u8>,
}

/// Terminal answer used when a request cannot be fulfilled concretely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AmbiguousResult {
    pub message: String,
}

/// Something wrong with a message that claims to be wire-ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageViolation {
    #[error("midi_channel {0} is outside 1-16")]
    ChannelOutOfRange(i64),

    #[error("value {value} does not fit the {bits}-bit payload (max {max})")]
    ValueTooWide { value: u16, bits: u8, max: u16 },

    #[error("message must carry exactly one addressing payload, found {found}")]
    PayloadShape { found: String },
}

impl ParameterChangeMessage {
    /// Assemble a message for an already-encoded wire value.
    pub fn new(tool: impl Into<String>, channel: u8, addressing: Addressing, value: u16) -> Self {
        let mut msg = Self {
            used_tool: tool.into(),
            midi_channel: channel,
            value,
            midi_cc: None,
            midi_cc_lsb: None,
            nrpn_msb: None,
            nrpn_lsb: None,
        };
        match addressing {
            Addressing::StandardCc { cc } => msg.midi_cc = Some(cc),
            Addressing::HighResCc { msb, lsb } => {
                msg.midi_cc = Some(msb);
                msg.midi_cc_lsb = Some(lsb);
            }
            Addressing::Nrpn { msb, lsb } => {
                msg.nrpn_msb = Some(msb);
                msg.nrpn_lsb = Some(lsb);
            }
        }
        msg
    }

    /// Recover the addressing payload, rejecting mixed or empty shapes.
    pub fn addressing(&self) -> Result<Addressing, MessageViolation> {
        match (self.midi_cc, self.midi_cc_lsb, self.nrpn_msb, self.nrpn_lsb) {
            (Some(cc), None, None, None) => Ok(Addressing::StandardCc { cc }),
            (Some(msb), Some(lsb), None, None) => Ok(Addressing::HighResCc { msb, lsb }),
            (None, None, Some(msb), Some(lsb)) => Ok(Addressing::Nrpn { msb, lsb }),
            _ => Err(MessageViolation::PayloadShape {
                found: self.describe_slots(),
            }),
        }
    }

    fn describe_slots(&self) -> String {
        let slots = [
            ("midi_cc", self.midi_cc),
            ("midi_cc_lsb", self.midi_cc_lsb),
            ("nrpn_msb", self.nrpn_msb),
            ("nrpn_lsb", self.nrpn_lsb),
        ];
        let set: Vec<_> = slots
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| *k)
            .collect();
        if set.is_empty() {
            "none".to_string()
        } else {
            set.join(" + ")
        }
    }

    /// Check channel range, payload shape, and value width.
    ///
    /// A message with `midi_cc_lsb` or `nrpn_msb` set carries 14 bits, any
    /// other message carries 7.
    pub fn validate(&self) -> Vec<MessageViolation> {
        let mut violations = Vec::new();

        let channel = i64::from(self.midi_channel);
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
            violations.push(MessageViolation::ChannelOutOfRange(channel));
        }

        if let Err(shape) = self.addressing() {
            violations.push(shape);
        }

        let wide = self.midi_cc_lsb.is_some() || self.nrpn_msb.is_some();
        let (bits, max) = if wide { (14, MAX_14BIT) } else { (7, MAX_7BIT) };
        if self.value > max {
            violations.push(MessageViolation::ValueTooWide {
                value: self.value,
                bits,
                max,
            });
        }

        violations
    }
}

/// Failure to turn a (parameter, channel, value) triple into a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("midi_channel {0} is outside 1-16")]
    ChannelOutOfRange(i64),

    #[error("{parameter}: {source}")]
    ValueOutOfRange {
        parameter: String,
        #[source]
        source: DomainError,
    },
}

/// Build a message for one definition.
///
/// The channel is checked before anything else is looked at.
pub fn build_message(
    definition: &ParameterDefinition,
    channel: i64,
    value: &DisplayValue,
    tool_name: &str,
) -> Result<ParameterChangeMessage, BuildError> {
    if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
        return Err(BuildError::ChannelOutOfRange(channel));
    }

    let wire = codec::encode(definition, value).map_err(|source| BuildError::ValueOutOfRange {
        parameter: definition.name.clone(),
        source,
    })?;

    Ok(ParameterChangeMessage::new(
        tool_name,
        channel as u8,
        definition.addressing,
        wire,
    ))
}

/// Catalog-backed builder.
#[derive(Debug, Clone, Copy)]
pub struct MessageBuilder<'a> {
    catalog: &'a ParameterCatalog,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(catalog: &'a ParameterCatalog) -> Self {
        Self { catalog }
    }

    pub fn build(
        &self,
        definition_name: &str,
        channel: i64,
        value: &DisplayValue,
        tool_name: &str,
    ) -> Result<ParameterChangeMessage, BuildError> {
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
            return Err(BuildError::ChannelOutOfRange(channel));
        }
        let definition = self
            .catalog
            .lookup(definition_name)
            .ok_or_else(|| BuildError::UnknownParameter(definition_name.to_string()))?;
        build_message(definition, channel, value, tool_name)
    }
}
