//! FM tone machine: four operators, eight algorithms.

use super::{build, def};
use crate::types::{ParameterDefinition, Section};

/// Ratio steps shared by operator C and both B operators.
///
/// The device has 19 steps and the last two both read 16. Encoding "16"
/// always lands on the first of them, so the final step is only ever decoded.
pub(crate) const C_RATIOS: [f64; 19] = [
    0.25, 0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0,
    16.0, 16.0,
];

const C_RATIO_LABELS: [&str; 19] = [
    "0.25", "0.5", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14",
    "15", "16", "16",
];

const A_RATIO_LABELS: [&str; 36] = [
    "0.25", "0.5", "0.75", "1", "1.25", "1.5", "1.75", "2", "2.5", "3", "3.5", "4", "4.5", "5",
    "5.5", "6", "6.5", "7", "7.5", "8", "8.5", "9", "9.5", "10", "10.5", "11", "11.5", "12",
    "12.5", "13", "13.5", "14", "14.5", "15", "15.5", "16",
];

pub(super) fn definitions() -> Vec<ParameterDefinition> {
    let s = Section::FmTone;
    let on_off: &[&str] = &["off", "on"];

    build(vec![
        // Page 1: ratios and algorithm
        def(s, "algorithm", "ALGO", 40, "Operator routing algorithm")
            .range(0, 7, 1.0, 8.0)
            .default(1),
        def(s, "c_ratio", "C", 41, "Frequency ratio of carrier operator C")
            .options(&C_RATIO_LABELS)
            .default("1"),
        def(s, "a_ratio", "A", 42, "Frequency ratio of operator A")
            .options(&A_RATIO_LABELS)
            .default("1"),
        def(s, "b_ratio", "B", 43, "Frequency ratios of B1 and B2, revolving like watch hands")
            .nrpn(1, 76)
            .counter(0, 360, ("b1", &C_RATIOS[..]), ("b2", &C_RATIOS[..]))
            .default([1.0, 1.0]),
        def(s, "harmonics", "HARM", 44, "Extra harmonic content")
            .nrpn(1, 77)
            .range(4596, 11530, -26.0, 26.0)
            .default(0),
        def(s, "detune", "DTUN", 45, "Detune between operators")
            .nrpn(1, 78)
            .range(0, 12700, 0.0, 127.0)
            .fine()
            .default(0),
        def(s, "feedback", "FDBK", 46, "Operator self-modulation"),
        def(s, "mix", "MIX", 47, "Balance between the X and Y outputs")
            .display(-63.0, 63.0)
            .default(-63),
        // Page 2: operator envelopes
        def(s, "a_attack", "A.ATK", 48, "Operator A envelope attack"),
        def(s, "a_decay", "A.DEC", 49, "Operator A envelope decay").default(32),
        def(s, "a_end", "A.END", 50, "Operator A envelope end level").default(127),
        def(s, "a_level", "A.LEV", 51, "Operator A output level"),
        def(s, "b_attack", "B.ATK", 52, "Operator B envelope attack"),
        def(s, "b_decay", "B.DEC", 53, "Operator B envelope decay").default(32),
        def(s, "b_end", "B.END", 54, "Operator B envelope end level").default(127),
        def(s, "b_level", "B.LEV", 55, "Operator B output level"),
        // Page 3: envelope behavior
        def(s, "a_delay", "A.DEL", 56, "Delay before operator A envelope starts"),
        def(s, "a_trigger", "A.TRIG", 57, "Operator A envelope follows trigs")
            .options(on_off)
            .default("on"),
        def(s, "a_reset", "A.RES", 58, "Operator A envelope resets on trig")
            .options(on_off)
            .default("on"),
        def(s, "phase_reset", "PH.RES", 59, "Which operators restart their phase on trig")
            .options(&["off", "all", "c", "a+b", "a+b2"])
            .default("all"),
        def(s, "b_delay", "B.DEL", 60, "Delay before operator B envelope starts"),
        def(s, "b_trigger", "B.TRIG", 61, "Operator B envelope follows trigs")
            .options(on_off)
            .default("on"),
        def(s, "b_reset", "B.RES", 62, "Operator B envelope resets on trig")
            .options(on_off)
            .default("on"),
        // Page 4: fine ratio offsets and key tracking
        def(s, "c_ratio_offset", "C.RATIO", 70, "Fine offset added to the C ratio")
            .nrpn(1, 97)
            .range(0, 1999, -1.0, 0.999)
            .fine()
            .firmware_scaled()
            .default(0),
        def(s, "a_ratio_offset", "A.RATIO", 71, "Fine offset added to the A ratio")
            .nrpn(1, 98)
            .range(0, 1999, -1.0, 0.999)
            .fine()
            .firmware_scaled()
            .default(0),
        def(s, "b1_ratio_offset", "B1.RATIO", 72, "Fine offset added to the B1 ratio")
            .nrpn(1, 99)
            .range(0, 1999, -1.0, 0.999)
            .fine()
            .firmware_scaled()
            .default(0),
        def(s, "b2_ratio_offset", "B2.RATIO", 73, "Fine offset added to the B2 ratio")
            .nrpn(1, 100)
            .range(0, 1999, -1.0, 0.999)
            .fine()
            .firmware_scaled()
            .default(0),
        def(s, "a_key_track", "A.KTRK", 75, "Operator A level follows note pitch").default(0),
        def(s, "b1_key_track", "B1.KTRK", 76, "Operator B1 level follows note pitch").default(0),
        def(s, "b2_key_track", "B2.KTRK", 77, "Operator B2 level follows note pitch").default(0),
    ])
}
