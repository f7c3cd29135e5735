//! Display-value to wire-value conversion.
//!
//! Every parameter domain has a bit-exact transform:
//!
//! - **Range**: `wire = round(min_wire + (display - min_display) * wire_span / display_span)`.
//!   Identity ranges (0-127 attack, decay, ...) pass straight through.
//! - **Enum**: lookup by label, numeric label, or option index.
//! - **MultiCounter**: two sub-counters packed into one wire value, the second
//!   counter cycling fastest.
//!
//! Values outside the display domain are rejected, never clamped.

use thiserror::Error;

use crate::types::{
    DisplayValue, Domain, EnumDomain, MultiCounterDomain, ParameterDefinition, RangeDomain,
    DISPLAY_EPSILON,
};

/// A value that does not belong to a parameter's domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("{value} is outside the allowed range {min} to {max}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("{value} must be a whole number")]
    NotInteger { value: f64 },

    #[error("'{label}' is not a valid option (expected one of: {expected})")]
    UnknownOption { label: String, expected: String },

    #[error("expected {expected}, got {got}")]
    ShapeMismatch { expected: &'static str, got: String },

    #[error("wire value {wire} is outside {min} to {max}")]
    WireOutOfRange { wire: i64, min: u16, max: u16 },
}

/// Encode a display value into a wire value for `definition`.
pub fn encode(definition: &ParameterDefinition, value: &DisplayValue) -> Result<u16, DomainError> {
    encode_domain(&definition.domain, value)
}

/// Decode a wire value back into the display value it represents.
pub fn decode(definition: &ParameterDefinition, wire: u16) -> Result<DisplayValue, DomainError> {
    decode_domain(&definition.domain, wire)
}

pub fn encode_domain(domain: &Domain, value: &DisplayValue) -> Result<u16, DomainError> {
    match domain {
        Domain::Range(r) => encode_range(r, value),
        Domain::Enum(e) => encode_enum(e, value),
        Domain::MultiCounter(m) => encode_counter(m, value),
    }
}

pub fn decode_domain(domain: &Domain, wire: u16) -> Result<DisplayValue, DomainError> {
    match domain {
        Domain::Range(r) => decode_range(r, wire).map(DisplayValue::Number),
        Domain::Enum(e) => decode_enum(e, wire),
        Domain::MultiCounter(m) => decode_counter(m, wire),
    }
}

fn check_wire(wire: i64, min: u16, max: u16) -> Result<u16, DomainError> {
    if wire < i64::from(min) || wire > i64::from(max) {
        return Err(DomainError::WireOutOfRange { wire, min, max });
    }
    Ok(wire as u16)
}

fn numeric(value: &DisplayValue) -> Result<f64, DomainError> {
    match value {
        DisplayValue::Number(n) => Ok(*n),
        DisplayValue::Label(s) => s.trim().parse::<f64>().map_err(|_| DomainError::ShapeMismatch {
            expected: "a number",
            got: format!("'{}'", s),
        }),
        DisplayValue::Pair(_) => Err(DomainError::ShapeMismatch {
            expected: "a number",
            got: value.to_string(),
        }),
    }
}

fn encode_range(r: &RangeDomain, value: &DisplayValue) -> Result<u16, DomainError> {
    let display = numeric(value)?;

    if !display.is_finite() || !r.contains(display) {
        return Err(DomainError::OutOfRange {
            value: display,
            min: r.min_display,
            max: r.max_display,
        });
    }
    if r.is_integer && (display - display.round()).abs() > DISPLAY_EPSILON {
        return Err(DomainError::NotInteger { value: display });
    }

    let min_wire = f64::from(r.min_wire);
    let max_wire = f64::from(r.max_wire);
    let display_span = r.max_display - r.min_display;

    let wire = if r.is_identity() {
        display.round()
    } else if display_span.abs() < DISPLAY_EPSILON {
        min_wire
    } else {
        (min_wire + (display - r.min_display) * (max_wire - min_wire) / display_span).round()
    };

    // Float noise at the bounds only; out-of-domain input was rejected above.
    let wire = wire.clamp(min_wire, max_wire);
    check_wire(wire as i64, r.min_wire, r.max_wire).map(|step| r.to_sent(step))
}

fn decode_range(r: &RangeDomain, sent: u16) -> Result<f64, DomainError> {
    let wire = check_wire(i64::from(r.from_sent(sent)), r.min_wire, r.max_wire)?;

    let wire_span = f64::from(r.max_wire - r.min_wire);
    let display = if wire_span == 0.0 {
        r.min_display
    } else {
        r.min_display + f64::from(wire - r.min_wire) * (r.max_display - r.min_display) / wire_span
    };

    Ok(if r.is_integer { display.round() } else { display })
}

fn expected_labels(e: &EnumDomain) -> String {
    e.options
        .iter()
        .map(|o| o.label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Labels are matched case-insensitively. In a table with numeric labels a
/// number must match one of them; elsewhere a number is an option index.
fn encode_enum(e: &EnumDomain, value: &DisplayValue) -> Result<u16, DomainError> {
    let unknown = |label: String| DomainError::UnknownOption {
        label,
        expected: expected_labels(e),
    };

    let number = match value {
        DisplayValue::Label(label) => {
            let wanted = label.trim();
            if let Some(option) = e.options.iter().find(|o| o.label.eq_ignore_ascii_case(wanted)) {
                return Ok(option.wire);
            }
            wanted.parse::<f64>().map_err(|_| unknown(label.clone()))?
        }
        DisplayValue::Number(n) => *n,
        DisplayValue::Pair(_) => {
            return Err(DomainError::ShapeMismatch {
                expected: "an option label or index",
                got: value.to_string(),
            })
        }
    };

    if let Some(option) = e.options.iter().find(|o| {
        o.label
            .parse::<f64>()
            .map(|l| (l - number).abs() < DISPLAY_EPSILON)
            .unwrap_or(false)
    }) {
        return Ok(option.wire);
    }
    if e.has_numeric_labels() {
        return Err(unknown(number.to_string()));
    }

    let index = number.round();
    if (number - index).abs() < DISPLAY_EPSILON && index >= 0.0 && (index as usize) < e.options.len() {
        return Ok(e.options[index as usize].wire);
    }

    Err(unknown(number.to_string()))
}

fn decode_enum(e: &EnumDomain, wire: u16) -> Result<DisplayValue, DomainError> {
    e.options
        .iter()
        .find(|o| o.wire == wire)
        .map(|o| DisplayValue::Label(o.label.clone()))
        .ok_or_else(|| DomainError::WireOutOfRange {
            wire: i64::from(wire),
            min: e.options.iter().map(|o| o.wire).min().unwrap_or(0),
            max: e.options.iter().map(|o| o.wire).max().unwrap_or(0),
        })
}

/// Combination index a wire value lands on.
pub fn counter_index(m: &MultiCounterDomain, wire: u16) -> usize {
    let combos = m.combinations();
    let span = m.wire_span();
    let offset = usize::from(wire.saturating_sub(m.min_wire));

    if combos <= 1 || span <= 1 {
        return 0;
    }
    if span == combos {
        return offset.min(combos - 1);
    }

    let scaled = (offset as f64) * ((combos - 1) as f64) / ((span - 1) as f64);
    (scaled.round() as usize).min(combos - 1)
}

/// Closest wire value to a combination index. Ties go to the lower wire.
fn counter_wire(m: &MultiCounterDomain, target: usize) -> u16 {
    let combos = m.combinations();
    let span = m.wire_span();
    if combos <= 1 || span <= 1 {
        return m.min_wire;
    }

    let guess = ((target as f64) * ((span - 1) as f64) / ((combos - 1) as f64)).round() as i64;
    let mut best: Option<(usize, u16)> = None;
    for offset in (guess - 1)..=(guess + 1) {
        if offset < 0 || offset >= span as i64 {
            continue;
        }
        let wire = m.min_wire + offset as u16;
        let distance = counter_index(m, wire).abs_diff(target);
        match best {
            Some((d, _)) if d <= distance => {}
            _ => best = Some((distance, wire)),
        }
    }
    best.map(|(_, w)| w).unwrap_or(m.min_wire)
}

/// Index of the step nearest to `value`, first match winning ties.
fn nearest_step(steps: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, step) in steps.iter().enumerate() {
        let distance = (step - value).abs();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

fn encode_counter(m: &MultiCounterDomain, value: &DisplayValue) -> Result<u16, DomainError> {
    let [a, b] = match value {
        DisplayValue::Pair(pair) => *pair,
        other => {
            return Err(DomainError::ShapeMismatch {
                expected: "a pair [a, b]",
                got: other.to_string(),
            })
        }
    };

    for (v, counter) in [(a, &m.a), (b, &m.b)] {
        let (min, max) = (counter.min(), counter.max());
        if !v.is_finite() || v < min - DISPLAY_EPSILON || v > max + DISPLAY_EPSILON {
            return Err(DomainError::OutOfRange { value: v, min, max });
        }
    }

    let target = nearest_step(&m.a.steps, a) * m.b.steps.len() + nearest_step(&m.b.steps, b);
    check_wire(i64::from(counter_wire(m, target)), m.min_wire, m.max_wire)
}

fn decode_counter(m: &MultiCounterDomain, wire: u16) -> Result<DisplayValue, DomainError> {
    check_wire(i64::from(wire), m.min_wire, m.max_wire)?;

    let index = counter_index(m, wire);
    let b_len = m.b.steps.len().max(1);
    let (ai, bi) = (index / b_len, index % b_len);

    match (m.a.steps.get(ai), m.b.steps.get(bi)) {
        (Some(a), Some(b)) => Ok(DisplayValue::Pair([*a, *b])),
        _ => Err(DomainError::WireOutOfRange {
            wire: i64::from(wire),
            min: m.min_wire,
            max: m.max_wire,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Counter, EnumOption};

    fn range(min_wire: u16, max_wire: u16, min_display: f64, max_display: f64, is_integer: bool) -> Domain {
        Domain::Range(RangeDomain {
            min_wire,
            max_wire,
            min_display,
            max_display,
            is_integer,
            firmware_scaled: false,
        })
    }

    fn options(labels: &[&str]) -> Domain {
        Domain::Enum(EnumDomain {
            options: labels
                .iter()
                .enumerate()
                .map(|(i, l)| EnumOption {
                    wire: i as u16,
                    label: l.to_string(),
                })
                .collect(),
        })
    }

    #[test]
    fn test_linear_cutoff_scaling() {
        let cutoff = range(0, 16383, 0.0, 127.0, false);
        assert_eq!(encode_domain(&cutoff, &63.0.into()).unwrap(), 8127);
        assert_eq!(encode_domain(&cutoff, &0.0.into()).unwrap(), 0);
        assert_eq!(encode_domain(&cutoff, &127.0.into()).unwrap(), 16383);
    }

    #[test]
    fn test_linear_offset_range() {
        // Harmonics: -26..26 over 4596..11530
        let harm = range(4596, 11530, -26.0, 26.0, false);
        assert_eq!(encode_domain(&harm, &(-26.0).into()).unwrap(), 4596);
        assert_eq!(encode_domain(&harm, &0.0.into()).unwrap(), 8063);
        assert_eq!(encode_domain(&harm, &26.0.into()).unwrap(), 11530);
    }

    #[test]
    fn test_out_of_display_range_rejected() {
        let pan = range(0, 127, -64.0, 64.0, true);
        let err = encode_domain(&pan, &65.0.into()).unwrap_err();
        assert!(matches!(err, DomainError::OutOfRange { .. }));
        assert!(encode_domain(&pan, &(-64.5).into()).is_err());
        assert!(encode_domain(&pan, &f64::NAN.into()).is_err());
    }

    #[test]
    fn test_integer_domain_rejects_fractions() {
        let algo = range(0, 7, 1.0, 8.0, true);
        assert_eq!(encode_domain(&algo, &1.0.into()).unwrap(), 0);
        assert_eq!(encode_domain(&algo, &8.0.into()).unwrap(), 7);
        assert_eq!(
            encode_domain(&algo, &2.5.into()).unwrap_err(),
            DomainError::NotInteger { value: 2.5 }
        );
    }

    #[test]
    fn test_identity_passthrough() {
        let attack = range(0, 127, 0.0, 127.0, true);
        for v in [0, 1, 64, 126, 127] {
            assert_eq!(encode_domain(&attack, &v.into()).unwrap(), v as u16);
            assert_eq!(
                decode_domain(&attack, v as u16).unwrap(),
                DisplayValue::Number(f64::from(v))
            );
        }
    }

    #[test]
    fn test_numeric_label_for_range() {
        let attack = range(0, 127, 0.0, 127.0, true);
        assert_eq!(encode_domain(&attack, &"42".into()).unwrap(), 42);
        assert!(matches!(
            encode_domain(&attack, &"loud".into()).unwrap_err(),
            DomainError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn test_decode_rejects_foreign_wire() {
        let harm = range(4596, 11530, -26.0, 26.0, false);
        assert!(matches!(
            decode_domain(&harm, 100).unwrap_err(),
            DomainError::WireOutOfRange { .. }
        ));
    }

    #[test]
    fn test_enum_by_label_and_index() {
        let wave = options(&["tri", "sine", "sqr", "saw", "expo", "ramp", "rand"]);
        assert_eq!(encode_domain(&wave, &"sine".into()).unwrap(), 1);
        assert_eq!(encode_domain(&wave, &"SAW".into()).unwrap(), 3);
        assert_eq!(encode_domain(&wave, &6.0.into()).unwrap(), 6);
        assert_eq!(decode_domain(&wave, 4).unwrap(), DisplayValue::Label("expo".into()));
    }

    #[test]
    fn test_enum_rejects_unknown() {
        let onoff = options(&["off", "on"]);
        assert!(matches!(
            encode_domain(&onoff, &"maybe".into()).unwrap_err(),
            DomainError::UnknownOption { .. }
        ));
        assert!(encode_domain(&onoff, &2.0.into()).is_err());
        assert!(encode_domain(&onoff, &(-1.0).into()).is_err());
        assert!(decode_domain(&onoff, 5).is_err());
    }

    #[test]
    fn test_enum_numeric_labels_win_over_index() {
        let ratios = options(&["0.25", "0.5", "1", "2", "3"]);
        // 2 is the label "2" at index 3, not index 2
        assert_eq!(encode_domain(&ratios, &2.0.into()).unwrap(), 3);
        assert_eq!(encode_domain(&ratios, &0.5.into()).unwrap(), 1);
        assert_eq!(encode_domain(&ratios, &"3".into()).unwrap(), 4);
    }

    #[test]
    fn test_enum_numeric_table_has_no_index_fallback() {
        let ratios = options(&["0.25", "0.5", "1", "2", "3"]);
        for missing in [4.0, 17.0, 0.75] {
            assert!(matches!(
                encode_domain(&ratios, &missing.into()).unwrap_err(),
                DomainError::UnknownOption { .. }
            ));
        }
        assert!(encode_domain(&ratios, &"4".into()).is_err());

        let mult = options(&["1", "2", "4", "8", "1k"]);
        assert_eq!(encode_domain(&mult, &"1K".into()).unwrap(), 4);
        assert!(encode_domain(&mult, &3.0.into()).is_err());
    }

    #[test]
    fn test_firmware_scaled_range() {
        let offset = Domain::Range(RangeDomain {
            min_wire: 0,
            max_wire: 1999,
            min_display: -1.0,
            max_display: 0.999,
            is_integer: false,
            firmware_scaled: true,
        });
        assert_eq!(encode_domain(&offset, &(-1.0).into()).unwrap(), 0);
        assert_eq!(encode_domain(&offset, &0.0.into()).unwrap(), 8192);
        assert_eq!(encode_domain(&offset, &0.999.into()).unwrap(), 16375);
        let DisplayValue::Number(back) = decode_domain(&offset, 16375).unwrap() else {
            panic!("expected a number");
        };
        assert!((back - 0.999).abs() < 1e-6);
        assert!(decode_domain(&offset, 16383).is_err());
    }

    #[test]
    fn test_sparse_enum_wires() {
        let dest = Domain::Enum(EnumDomain {
            options: vec![
                EnumOption { wire: 0, label: "none".into() },
                EnumOption { wire: 67, label: "filter_freq".into() },
                EnumOption { wire: 90, label: "amp_volume".into() },
            ],
        });
        assert_eq!(encode_domain(&dest, &"filter_freq".into()).unwrap(), 67);
        assert_eq!(encode_domain(&dest, &2.0.into()).unwrap(), 90);
        assert!(decode_domain(&dest, 68).is_err());
    }

    fn small_counter(min_wire: u16, max_wire: u16) -> MultiCounterDomain {
        MultiCounterDomain {
            min_wire,
            max_wire,
            a: Counter { name: "a".into(), steps: vec![1.0, 2.0, 3.0] },
            b: Counter { name: "b".into(), steps: vec![10.0, 20.0] },
        }
    }

    #[test]
    fn test_counter_exact_resolution() {
        let m = small_counter(0, 5);
        let domain = Domain::MultiCounter(m);
        let expected = [
            [1.0, 10.0],
            [1.0, 20.0],
            [2.0, 10.0],
            [2.0, 20.0],
            [3.0, 10.0],
            [3.0, 20.0],
        ];
        for (wire, pair) in expected.iter().enumerate() {
            assert_eq!(decode_domain(&domain, wire as u16).unwrap(), DisplayValue::Pair(*pair));
            assert_eq!(encode_domain(&domain, &DisplayValue::Pair(*pair)).unwrap(), wire as u16);
        }
    }

    #[test]
    fn test_counter_coarse_resolution_picks_nearest() {
        // Four wire values for six combinations
        let m = small_counter(0, 3);
        let domain = Domain::MultiCounter(m.clone());
        assert_eq!(counter_index(&m, 0), 0);
        assert_eq!(counter_index(&m, 3), 5);

        let wire = encode_domain(&domain, &DisplayValue::Pair([2.0, 10.0])).unwrap();
        let idx = counter_index(&m, wire);
        assert!(idx.abs_diff(2) <= 1);
    }

    #[test]
    fn test_counter_fine_resolution_is_monotonic() {
        // More wire values than combinations
        let m = small_counter(0, 100);
        let mut last = 0;
        let mut seen = std::collections::BTreeSet::new();
        for wire in 0..=100u16 {
            let idx = counter_index(&m, wire);
            assert!(idx >= last);
            assert!(idx - last <= 1);
            last = idx;
            seen.insert(idx);
        }
        assert_eq!(seen.len(), m.combinations());
    }

    #[test]
    fn test_counter_rejects_out_of_range_and_shape() {
        let domain = Domain::MultiCounter(small_counter(0, 5));
        assert!(matches!(
            encode_domain(&domain, &DisplayValue::Pair([4.0, 10.0])).unwrap_err(),
            DomainError::OutOfRange { .. }
        ));
        assert!(matches!(
            encode_domain(&domain, &2.0.into()).unwrap_err(),
            DomainError::ShapeMismatch { .. }
        ));
    }
}
