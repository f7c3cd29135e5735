//! Wavetone machine: two wavetable oscillators plus noise.

use super::{build, def};
use crate::types::{ParameterDefinition, Section};

pub(super) fn definitions() -> Vec<ParameterDefinition> {
    let s = Section::Wavetone;
    let tables: &[&str] = &["prim", "harm"];

    build(vec![
        def(s, "osc1_pitch", "TUN1", 40, "Oscillator 1 pitch in semitones")
            .display(-5.0, 5.0)
            .fine()
            .default(0),
        def(s, "osc1_waveform", "WAV1", 41, "Oscillator 1 wavetable position").display(0.0, 120.0),
        def(s, "osc1_phase_distortion", "PD1", 42, "Oscillator 1 phase distortion")
            .display(0.0, 100.0)
            .default(50),
        def(s, "osc1_level", "LEV1", 43, "Oscillator 1 level").default(100),
        def(s, "osc2_pitch", "TUN2", 44, "Oscillator 2 pitch in semitones")
            .display(-5.0, 5.0)
            .fine()
            .default(0),
        def(s, "osc2_waveform", "WAV2", 45, "Oscillator 2 wavetable position").display(0.0, 120.0),
        def(s, "osc2_phase_distortion", "PD2", 46, "Oscillator 2 phase distortion")
            .display(0.0, 100.0)
            .default(50),
        def(s, "osc2_level", "LEV2", 47, "Oscillator 2 level").default(100),
        def(s, "osc1_offset", "OFS1", 48, "Oscillator 1 fine tune offset")
            .display(-10.0, 10.0)
            .fine()
            .default(0),
        def(s, "osc1_table", "TBL1", 49, "Oscillator 1 wavetable bank")
            .options(tables)
            .default("prim"),
        def(s, "mod_type", "MOD", 50, "How oscillator 1 modulates oscillator 2")
            .options(&["off", "ring mod", "ring mod fixed", "hard sync"])
            .default("off"),
        def(s, "reset_mode", "RSET", 51, "Oscillator phase reset on trig")
            .options(&["off", "on", "random"])
            .default("on"),
        def(s, "osc2_offset", "OFS2", 52, "Oscillator 2 fine tune offset")
            .display(-10.0, 10.0)
            .fine()
            .default(0),
        def(s, "osc2_table", "TBL2", 53, "Oscillator 2 wavetable bank")
            .options(tables)
            .default("prim"),
        def(s, "drift", "DRIF", 55, "Random pitch drift"),
        def(s, "attack", "ATK", 56, "Noise envelope attack"),
        def(s, "hold", "HOLD", 57, "Noise envelope hold").default(127),
        def(s, "decay", "DEC", 58, "Noise envelope decay").default(127),
        def(s, "noise_level", "NLEV", 59, "Noise level"),
        def(s, "noise_base", "BASE", 60, "Lower edge of the noise band"),
        def(s, "noise_width", "WDTH", 61, "Width of the noise band").default(127),
        def(s, "noise_type", "TYPE", 62, "Noise generator")
            .options(&["grain noise", "tuned noise", "sample and hold noise"])
            .default("grain noise"),
        def(s, "noise_character", "CHAR", 63, "Noise color, depends on the noise type"),
    ])
}
