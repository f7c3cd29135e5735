//! Pages every machine has: filters, amp, fx, LFOs.

use super::{build, def, Def};
use crate::types::{ParameterDefinition, Section};

const FILTER_FAMILIES: [Section; 7] = [
    Section::MultiModeFilter,
    Section::Lowpass4Filter,
    Section::LegacyLpHpFilter,
    Section::CombMinusFilter,
    Section::CombPlusFilter,
    Section::EqualizerFilter,
    Section::BaseWidthFilter,
];

/// Envelope and cutoff rows shared by every family except base-width.
///
/// All families answer on the same addresses; the active filter machine
/// decides what the sound does with them.
fn envelope_block(s: Section) -> Vec<Def> {
    vec![
        def(s, "attack", "ATK", 20, "Filter envelope attack time"),
        def(s, "decay", "DEC", 21, "Filter envelope decay time").default(64),
        def(s, "sustain", "SUS", 22, "Filter envelope sustain level"),
        def(s, "release", "REL", 23, "Filter envelope release time").default(64),
        def(s, "frequency", "FREQ", 16, "Filter cutoff frequency")
            .nrpn(1, 20)
            .range(0, 16383, 0.0, 127.0)
            .fine()
            .default(127),
        def(s, "envelope_depth", "ENV.DEPTH", 24, "Filter envelope modulation depth")
            .display(-64.0, 64.0)
            .default(0),
    ]
}

fn family(s: Section) -> Vec<Def> {
    let mut rows = if s == Section::BaseWidthFilter {
        Vec::new()
    } else {
        envelope_block(s)
    };
    match s {
        Section::MultiModeFilter => rows.extend([
            def(s, "resonance", "RESO", 17, "Filter resonance"),
            def(s, "type", "TYPE", 18, "Morph between lowpass, bandpass and highpass"),
        ]),
        Section::Lowpass4Filter => {
            rows.push(def(s, "resonance", "RESO", 17, "Filter resonance"));
        }
        Section::LegacyLpHpFilter => rows.extend([
            def(s, "resonance", "RESO", 17, "Filter resonance"),
            def(s, "type", "TYPE", 18, "Legacy filter mode")
                .options(&["lowpass", "highpass", "off"])
                .default("lowpass"),
        ]),
        Section::CombMinusFilter | Section::CombPlusFilter => rows.extend([
            def(s, "feedback", "FDBK", 17, "Comb filter feedback"),
            def(s, "lowpass", "LPF", 18, "Lowpass in the comb feedback path").default(127),
        ]),
        Section::EqualizerFilter => rows.extend([
            def(s, "gain", "GAIN", 17, "Equalizer band gain"),
            def(s, "q", "Q", 18, "Equalizer band width"),
        ]),
        Section::BaseWidthFilter => rows.extend([
            def(s, "envelope_delay", "ENV.DELAY", 19, "Delay before the filter envelope starts"),
            def(s, "key_tracking", "KEY.TRK", 26, "How much the note pitch moves the filter"),
            def(s, "base", "BASE", 27, "Lower edge of the pass band"),
            def(s, "width", "WDTH", 28, "Width of the pass band"),
            def(s, "envelope_reset", "ENV.RESET", 25, "Restart the filter envelope on each trig")
                .options(&["off", "on"])
                .default("off"),
        ]),
        _ => {}
    }
    rows
}

pub(super) fn filters() -> Vec<ParameterDefinition> {
    build(FILTER_FAMILIES.into_iter().flat_map(family).collect())
}

pub(super) fn amp() -> Vec<ParameterDefinition> {
    let s = Section::Amp;
    build(vec![
        def(s, "attack", "ATK", 84, "Amp envelope attack time").default(8),
        def(s, "hold", "HOLD", 85, "Amp envelope hold time").default(127),
        def(s, "decay", "DEC", 86, "Amp envelope decay time").default(32),
        def(s, "sustain", "SUS", 87, "Amp envelope sustain level").default(96),
        def(s, "release", "REL", 88, "Amp envelope release time").default(24),
        def(s, "envelope_reset", "RSET", 92, "Restart the amp envelope on each trig")
            .options(&["off", "on"])
            .default("on"),
        def(s, "envelope_mode", "MODE", 91, "Amp envelope shape")
            .options(&["AHD", "ADSR"])
            .default("ADSR"),
        def(s, "pan", "PAN", 89, "Stereo position").display(-64.0, 64.0).default(0),
        def(s, "volume", "VOL", 90, "Track volume").default(110),
    ])
}

pub(super) fn fx() -> Vec<ParameterDefinition> {
    let s = Section::Fx;
    build(vec![
        def(s, "bit_reduction", "BR", 78, "Bit depth reduction"),
        def(s, "overdrive", "OVER", 81, "Overdrive amount"),
        def(s, "sample_rate_reduction", "SRR", 79, "Sample rate reduction"),
        def(s, "sample_rate_routing", "SR.RT", 80, "Place sample rate reduction before or after the filter")
            .options(&["pre", "post"])
            .default("pre"),
        def(s, "overdrive_routing", "OD.RT", 82, "Place overdrive before or after the filter")
            .options(&["pre", "post"])
            .default("pre"),
        def(s, "delay", "DEL", 30, "Send level to the delay"),
        def(s, "reverb", "REV", 31, "Send level to the reverb"),
        def(s, "chorus", "CHR", 29, "Send level to the chorus"),
    ])
}

const LFO_DESTINATIONS: &[(u16, &str)] = &[
    (0, "none"),
    (25, "wavetone_osc1_pitch"),
    (26, "wavetone_osc1_waveform"),
    (27, "wavetone_osc1_phase_distortion"),
    (28, "wavetone_osc1_level"),
    (29, "wavetone_osc2_pitch"),
    (30, "wavetone_osc2_waveform"),
    (31, "wavetone_osc2_phase_distortion"),
    (32, "wavetone_osc2_level"),
    (33, "wavetone_osc1_offset"),
    (34, "wavetone_osc1_table"),
    (35, "wavetone_mod_type"),
    (36, "wavetone_reset_mode"),
    (37, "wavetone_osc2_offset"),
    (38, "wavetone_osc2_table"),
    (39, "wavetone_drift"),
    (40, "wavetone_attack"),
    (41, "wavetone_hold"),
    (42, "wavetone_decay"),
    (43, "wavetone_noise_level"),
    (44, "wavetone_noise_base"),
    (45, "wavetone_noise_width"),
    (46, "wavetone_noise_type"),
    (47, "wavetone_noise_character"),
    (66, "filter_type"),
    (67, "filter_freq"),
    (69, "filter_envelope_depth"),
    (70, "filter_attack"),
    (71, "filter_decay"),
    (72, "filter_sustain"),
    (73, "filter_release"),
    (74, "filter_resonance"),
    (75, "filter_envelope_delay"),
    (76, "filter_base"),
    (77, "filter_width"),
    (78, "filter_envelope_reset"),
    (79, "filter_key_track"),
    (81, "amp_attack"),
    (82, "amp_hold"),
    (83, "amp_decay"),
    (84, "amp_sustain"),
    (85, "amp_release"),
    (86, "fx_delay"),
    (87, "fx_reverb"),
    (88, "fx_chorus"),
    (89, "amp_pan"),
    (90, "amp_volume"),
    (95, "fx_bit_reduction"),
    (96, "fx_srr"),
    (97, "fx_srr_routing"),
    (98, "fx_overdrive"),
    (99, "fx_overdrive_routing"),
];

/// One LFO page; LFO1 starts at CC 102, LFO2 at CC 111.
pub(super) fn lfo(s: Section, base_cc: u8) -> Vec<ParameterDefinition> {
    build(vec![
        def(s, "speed", "SPD", base_cc, "LFO speed").default(48),
        def(s, "multiplier", "MULT", base_cc + 1, "LFO speed multiplier")
            .options(&["1", "2", "4", "8", "16", "32", "64", "128", "256", "512", "1k", "2k"])
            .default("2"),
        def(s, "fade", "FADE", base_cc + 2, "Fade the LFO in (negative) or out (positive)")
            .display(-64.0, 63.0)
            .default(0),
        def(s, "destination", "DEST", base_cc + 3, "Parameter the LFO modulates")
            .sparse(LFO_DESTINATIONS)
            .default("none"),
        def(s, "waveform", "WAVE", base_cc + 4, "LFO waveform")
            .options(&["tri", "sine", "sqr", "saw", "expo", "ramp", "rand"])
            .default("sine"),
        def(s, "start_phase", "SPH", base_cc + 5, "Phase the waveform starts at"),
        def(s, "trigger_mode", "MODE", base_cc + 6, "How trigs restart the LFO")
            .options(&["free", "trig", "hold", "one", "half"])
            .default("free"),
        def(s, "depth", "DEP", base_cc + 7, "Modulation depth")
            .display(-64.0, 64.0)
            .default(0),
    ])
}
