//! Immutable, name-keyed table of parameter definitions.
//!
//! Tables are grouped by section for construction only; lookup is flat.
//! The catalog is built once at startup and shared read-only.

mod fm_drum;
mod fm_tone;
mod performance;
mod shared;
mod swarmer;
mod wavetone;

use std::collections::HashMap;

use thiserror::Error;

use crate::codec;
use crate::types::{
    Addressing, Counter, DisplayValue, Domain, EnumDomain, EnumOption, MultiCounterDomain,
    ParameterDefinition, RangeDomain, Section,
};

/// Problems found while assembling the catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("duplicate parameter name: {0}")]
    Duplicate(String),

    #[error("{name}: domain reaches wire {max_wire} but {addressing} carries at most {limit}")]
    WireWidth {
        name: String,
        max_wire: u16,
        addressing: Addressing,
        limit: u16,
    },

    #[error("{name}: invalid domain ({reason})")]
    InvalidDomain { name: String, reason: String },

    #[error("{name}: default {value} is outside the domain ({reason})")]
    InvalidDefault {
        name: String,
        value: DisplayValue,
        reason: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ParameterCatalog {
    definitions: Vec<ParameterDefinition>,
    index: HashMap<String, usize>,
}

impl ParameterCatalog {
    /// Full Digitone catalog.
    pub fn digitone() -> Result<Self, CatalogError> {
        let mut defs = Vec::new();
        defs.extend(shared::filters());
        defs.extend(shared::amp());
        defs.extend(shared::fx());
        defs.extend(shared::lfo(Section::Lfo1, 102));
        defs.extend(shared::lfo(Section::Lfo2, 111));
        defs.extend(fm_tone::definitions());
        defs.extend(fm_drum::definitions());
        defs.extend(wavetone::definitions());
        defs.extend(swarmer::definitions());
        defs.extend(performance::definitions());

        let catalog = Self::from_definitions(defs)?;
        tracing::debug!(parameters = catalog.len(), "Parameter catalog built");
        Ok(catalog)
    }

    /// Build a catalog from arbitrary definitions, validating each one.
    pub fn from_definitions(definitions: Vec<ParameterDefinition>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            validate_definition(def)?;
            if index.insert(def.name.clone(), i).is_some() {
                return Err(CatalogError::Duplicate(def.name.clone()));
            }
        }
        Ok(Self { definitions, index })
    }

    pub fn lookup(&self, name: &str) -> Option<&ParameterDefinition> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.iter()
    }

    pub fn section(&self, section: Section) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.iter().filter(move |d| d.section == section)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn validate_definition(def: &ParameterDefinition) -> Result<(), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidDomain {
        name: def.name.clone(),
        reason: reason.to_string(),
    };

    match &def.domain {
        Domain::Range(r) => {
            if r.min_wire > r.max_wire {
                return Err(invalid("min_wire above max_wire"));
            }
            if !(r.min_display <= r.max_display) {
                return Err(invalid("min_display above max_display"));
            }
        }
        Domain::Enum(e) => {
            if e.options.is_empty() {
                return Err(invalid("no options"));
            }
            let mut wires: Vec<_> = e.options.iter().map(|o| o.wire).collect();
            wires.sort_unstable();
            wires.dedup();
            if wires.len() != e.options.len() {
                return Err(invalid("two options share a wire value"));
            }
        }
        Domain::MultiCounter(m) => {
            if m.min_wire > m.max_wire {
                return Err(invalid("min_wire above max_wire"));
            }
            if m.a.steps.is_empty() || m.b.steps.is_empty() {
                return Err(invalid("empty counter"));
            }
        }
    }

    let limit = def.addressing.max_wire();
    let max_wire = def.domain.max_wire();
    if max_wire > limit {
        return Err(CatalogError::WireWidth {
            name: def.name.clone(),
            max_wire,
            addressing: def.addressing,
            limit,
        });
    }

    if let Some(default) = &def.default_display {
        codec::encode(def, default).map_err(|e| CatalogError::InvalidDefault {
            name: def.name.clone(),
            value: default.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

/// Terse table-row builder. Defaults to a 0-127 identity on the row's CC.
pub(crate) struct Def {
    section: Section,
    key: &'static str,
    label: &'static str,
    summary: &'static str,
    addressing: Addressing,
    domain: Domain,
    default_display: Option<DisplayValue>,
}

pub(crate) fn def(
    section: Section,
    key: &'static str,
    label: &'static str,
    cc: u8,
    summary: &'static str,
) -> Def {
    Def {
        section,
        key,
        label,
        summary,
        addressing: Addressing::StandardCc { cc },
        domain: Domain::Range(RangeDomain {
            min_wire: 0,
            max_wire: 127,
            min_display: 0.0,
            max_display: 127.0,
            is_integer: true,
            firmware_scaled: false,
        }),
        default_display: None,
    }
}

impl Def {
    /// Address through NRPN `msb:lsb` instead of the CC.
    pub(crate) fn nrpn(mut self, msb: u8, lsb: u8) -> Self {
        self.addressing = Addressing::Nrpn { msb, lsb };
        self
    }

    /// 7-bit wire with a different integer display scale.
    pub(crate) fn display(self, min_display: f64, max_display: f64) -> Self {
        self.range(0, 127, min_display, max_display)
    }

    pub(crate) fn range(mut self, min_wire: u16, max_wire: u16, min_display: f64, max_display: f64) -> Self {
        self.domain = Domain::Range(RangeDomain {
            min_wire,
            max_wire,
            min_display,
            max_display,
            is_integer: true,
            firmware_scaled: false,
        });
        self
    }

    /// Allow fractional display values.
    pub(crate) fn fine(mut self) -> Self {
        if let Domain::Range(r) = &mut self.domain {
            r.is_integer = false;
        }
        self
    }

    /// Send steps pre-multiplied by 8.192 (FM ratio offsets).
    pub(crate) fn firmware_scaled(mut self) -> Self {
        if let Domain::Range(r) = &mut self.domain {
            r.firmware_scaled = true;
        }
        self
    }

    /// Options on consecutive wire values starting at 0.
    pub(crate) fn options(mut self, labels: &[&str]) -> Self {
        self.domain = Domain::Enum(EnumDomain {
            options: labels
                .iter()
                .enumerate()
                .map(|(i, label)| EnumOption {
                    wire: i as u16,
                    label: label.to_string(),
                })
                .collect(),
        });
        self
    }

    /// Options on explicit, possibly sparse, wire values.
    pub(crate) fn sparse(mut self, options: &[(u16, &str)]) -> Self {
        self.domain = Domain::Enum(EnumDomain {
            options: options
                .iter()
                .map(|(wire, label)| EnumOption {
                    wire: *wire,
                    label: label.to_string(),
                })
                .collect(),
        });
        self
    }

    pub(crate) fn counter(
        mut self,
        min_wire: u16,
        max_wire: u16,
        a: (&str, &[f64]),
        b: (&str, &[f64]),
    ) -> Self {
        self.domain = Domain::MultiCounter(MultiCounterDomain {
            min_wire,
            max_wire,
            a: Counter {
                name: a.0.to_string(),
                steps: a.1.to_vec(),
            },
            b: Counter {
                name: b.0.to_string(),
                steps: b.1.to_vec(),
            },
        });
        self
    }

    pub(crate) fn default(mut self, value: impl Into<DisplayValue>) -> Self {
        self.default_display = Some(value.into());
        self
    }
}

impl From<Def> for ParameterDefinition {
    fn from(d: Def) -> Self {
        ParameterDefinition {
            name: format!("{}.{}", d.section.prefix(), d.key),
            section: d.section,
            label: d.label.to_string(),
            summary: d.summary.to_string(),
            addressing: d.addressing,
            domain: d.domain,
            default_display: d.default_display,
        }
    }
}

pub(crate) fn build(rows: Vec<Def>) -> Vec<ParameterDefinition> {
    rows.into_iter().map(ParameterDefinition::from).collect()
}
