//! Core parameter types: addressing, value domains, display values.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest value a standard 7-bit CC can carry.
pub const MAX_7BIT: u16 = 127;

/// Largest value a 14-bit high-res CC or NRPN can carry.
pub const MAX_14BIT: u16 = 16383;

/// How a parameter is addressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Addressing {
    /// Plain 7-bit continuous controller.
    StandardCc { cc: u8 },
    /// MSB/LSB controller pair carrying a 14-bit value.
    HighResCc { msb: u8, lsb: u8 },
    /// Non-registered parameter number.
    Nrpn { msb: u8, lsb: u8 },
}

impl Addressing {
    /// Maximum wire value this addressing mode can transmit.
    pub fn max_wire(&self) -> u16 {
        match self {
            Addressing::StandardCc { .. } => MAX_7BIT,
            Addressing::HighResCc { .. } | Addressing::Nrpn { .. } => MAX_14BIT,
        }
    }

    pub fn is_14bit(&self) -> bool {
        !matches!(self, Addressing::StandardCc { .. })
    }
}

impl fmt::Display for Addressing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addressing::StandardCc { cc } => write!(f, "CC {}", cc),
            Addressing::HighResCc { msb, lsb } => write!(f, "CC {}/{}", msb, lsb),
            Addressing::Nrpn { msb, lsb } => write!(f, "NRPN {}:{}", msb, lsb),
        }
    }
}

/// Continuous (or stepped) linear range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeDomain {
    pub min_wire: u16,
    pub max_wire: u16,
    pub min_display: f64,
    pub max_display: f64,
    /// Display values must be whole numbers.
    pub is_integer: bool,
    /// The receiving firmware divides by 8.192, so steps are sent pre-multiplied.
    #[serde(default)]
    pub firmware_scaled: bool,
}

/// Numerator and denominator of the ratio-offset firmware scale.
const FIRMWARE_SCALE: (u32, u32) = (8192, 1000);

impl RangeDomain {
    /// True when wire and display coincide (0-127 attack, decay, ...).
    pub fn is_identity(&self) -> bool {
        self.min_display == f64::from(self.min_wire) && self.max_display == f64::from(self.max_wire)
    }

    pub fn contains(&self, display: f64) -> bool {
        display >= self.min_display - DISPLAY_EPSILON && display <= self.max_display + DISPLAY_EPSILON
    }

    /// Value put on the wire for a step of this range.
    pub fn to_sent(&self, step: u16) -> u16 {
        if !self.firmware_scaled {
            return step;
        }
        let (num, den) = FIRMWARE_SCALE;
        let sent = u32::from(step) * num / den;
        sent.min(u32::from(MAX_14BIT)) as u16
    }

    /// Step a received wire value stands for. Inverse of [`RangeDomain::to_sent`].
    pub fn from_sent(&self, sent: u16) -> u16 {
        if !self.firmware_scaled {
            return sent;
        }
        let (num, den) = FIRMWARE_SCALE;
        let step = (u32::from(sent) * den + num / 2) / num;
        step.min(u32::from(u16::MAX)) as u16
    }
}

/// Tolerance used when comparing floating display values against bounds.
pub(crate) const DISPLAY_EPSILON: f64 = 1e-9;

/// One selectable option of an enumerated parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub wire: u16,
    pub label: String,
}

/// Ordered list of discrete options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDomain {
    pub options: Vec<EnumOption>,
}

impl EnumDomain {
    /// Ratio and multiplier tables: numbers name options, never index them.
    pub fn has_numeric_labels(&self) -> bool {
        self.options.iter().any(|o| o.label.parse::<f64>().is_ok())
    }
}

/// One sub-counter of a revolving encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    pub steps: Vec<f64>,
}

impl Counter {
    pub fn min(&self) -> f64 {
        self.steps.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.steps.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Two sub-counters driven by one wire value, odometer style.
///
/// `b` completes a full revolution for every step of `a`. Wire values are
/// spread evenly across the `a.len() * b.len()` combinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiCounterDomain {
    pub min_wire: u16,
    pub max_wire: u16,
    pub a: Counter,
    pub b: Counter,
}

impl MultiCounterDomain {
    /// Number of (a, b) combinations.
    pub fn combinations(&self) -> usize {
        self.a.steps.len() * self.b.steps.len()
    }

    /// Number of distinct wire values.
    pub fn wire_span(&self) -> usize {
        usize::from(self.max_wire - self.min_wire) + 1
    }
}

/// The set of legal values for a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    Range(RangeDomain),
    Enum(EnumDomain),
    MultiCounter(MultiCounterDomain),
}

impl Domain {
    /// Largest wire value the domain can produce.
    pub fn max_wire(&self) -> u16 {
        match self {
            Domain::Range(r) => r.to_sent(r.max_wire),
            Domain::Enum(e) => e.options.iter().map(|o| o.wire).max().unwrap_or(0),
            Domain::MultiCounter(m) => m.max_wire,
        }
    }
}

/// A human-facing value as the language model or a user supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DisplayValue {
    Number(f64),
    Pair([f64; 2]),
    Label(String),
}

impl From<f64> for DisplayValue {
    fn from(v: f64) -> Self {
        DisplayValue::Number(v)
    }
}

impl From<i32> for DisplayValue {
    fn from(v: i32) -> Self {
        DisplayValue::Number(f64::from(v))
    }
}

impl From<&str> for DisplayValue {
    fn from(v: &str) -> Self {
        DisplayValue::Label(v.to_string())
    }
}

impl From<[f64; 2]> for DisplayValue {
    fn from(v: [f64; 2]) -> Self {
        DisplayValue::Pair(v)
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Number(n) => write!(f, "{}", n),
            DisplayValue::Pair([a, b]) => write!(f, "[{}, {}]", a, b),
            DisplayValue::Label(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for DisplayValue {
    type Err = std::convert::Infallible;

    /// Parses `63`, `1.0,2.5` (pair) or falls back to a label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<f64>() {
            return Ok(DisplayValue::Number(n));
        }
        if let Some((a, b)) = trimmed
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split_once(',')
        {
            if let (Ok(a), Ok(b)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                return Ok(DisplayValue::Pair([a, b]));
            }
        }
        Ok(DisplayValue::Label(trimmed.to_string()))
    }
}

/// Synthesizer sound engine a track can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Machine {
    FmTone,
    FmDrum,
    Wavetone,
    Swarmer,
}

impl Machine {
    pub const ALL: [Machine; 4] = [
        Machine::FmTone,
        Machine::FmDrum,
        Machine::Wavetone,
        Machine::Swarmer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Machine::FmTone => "fm_tone",
            Machine::FmDrum => "fm_drum",
            Machine::Wavetone => "wavetone",
            Machine::Swarmer => "swarmer",
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Machine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fm_tone" => Ok(Machine::FmTone),
            "fm_drum" => Ok(Machine::FmDrum),
            "wavetone" => Ok(Machine::Wavetone),
            "swarmer" => Ok(Machine::Swarmer),
            other => Err(format!("unknown machine: {}", other)),
        }
    }
}

/// Table grouping a definition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    MultiModeFilter,
    Lowpass4Filter,
    LegacyLpHpFilter,
    CombMinusFilter,
    CombPlusFilter,
    EqualizerFilter,
    BaseWidthFilter,
    Amp,
    Fx,
    Lfo1,
    Lfo2,
    FmTone,
    FmDrum,
    Wavetone,
    Swarmer,
    Track,
    Trig,
}

impl Section {
    /// Name prefix shared by every definition in the section.
    pub fn prefix(&self) -> &'static str {
        match self {
            Section::MultiModeFilter => "multi_mode_filter",
            Section::Lowpass4Filter => "lowpass_4_filter",
            Section::LegacyLpHpFilter => "legacy_lp_hp_filter",
            Section::CombMinusFilter => "comb_minus_filter",
            Section::CombPlusFilter => "comb_plus_filter",
            Section::EqualizerFilter => "equalizer_filter",
            Section::BaseWidthFilter => "base_width_filter",
            Section::Amp => "amp",
            Section::Fx => "fx",
            Section::Lfo1 => "lfo1",
            Section::Lfo2 => "lfo2",
            Section::FmTone => "fm_tone",
            Section::FmDrum => "fm_drum",
            Section::Wavetone => "wavetone",
            Section::Swarmer => "swarmer",
            Section::Track => "track",
            Section::Trig => "trig",
        }
    }

    /// The machine whose engine owns this section, if any.
    pub fn machine(&self) -> Option<Machine> {
        match self {
            Section::FmTone => Some(Machine::FmTone),
            Section::FmDrum => Some(Machine::FmDrum),
            Section::Wavetone => Some(Machine::Wavetone),
            Section::Swarmer => Some(Machine::Swarmer),
            _ => None,
        }
    }
}

/// One controllable synthesizer parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Unique key, `<section>.<parameter>`.
    pub name: String,
    pub section: Section,
    /// Label printed on the device screen.
    pub label: String,
    pub summary: String,
    pub addressing: Addressing,
    pub domain: Domain,
    pub default_display: Option<DisplayValue>,
}

impl ParameterDefinition {
    /// Name of the tool that sets this parameter.
    pub fn tool_name(&self) -> String {
        format!("set_{}", self.name.replace('.', "_"))
    }
}
