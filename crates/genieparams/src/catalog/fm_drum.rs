//! FM drum machine: body, operators and a noise/transient layer.

use super::{build, def};
use crate::types::{ParameterDefinition, Section};

pub(super) fn definitions() -> Vec<ParameterDefinition> {
    let s = Section::FmDrum;
    let on_off: &[&str] = &["off", "on"];

    build(vec![
        def(s, "tune", "TUNE", 40, "Base pitch in semitones").display(-60.0, 60.0).default(0),
        def(s, "sweep_time", "STIM", 41, "Duration of the pitch sweep"),
        def(s, "sweep_depth", "SDEP", 42, "Depth of the pitch sweep"),
        def(s, "algorithm", "ALGO", 43, "Operator routing algorithm")
            .range(0, 6, 1.0, 7.0)
            .default(1),
        def(s, "op_c_wave", "OP.C", 44, "Waveform of operator C"),
        def(s, "op_ab_wave", "OP.AB", 45, "Waveform of operators A and B"),
        def(s, "feedback", "FDBK", 46, "Operator self-modulation"),
        def(s, "fold", "FOLD", 47, "Wavefolding amount"),
        def(s, "ratio1", "RATIO1", 48, "Frequency ratio of the first modulator")
            .display(0.001, 31.75)
            .fine()
            .default(0.5),
        def(s, "decay1", "DEC1", 49, "Decay of the first modulator"),
        def(s, "end1", "END1", 50, "End level of the first modulator"),
        def(s, "mod1", "MOD1", 51, "Modulation amount of the first modulator"),
        def(s, "ratio2", "RATIO2", 52, "Frequency ratio of the second modulator")
            .display(0.001, 31.75)
            .fine()
            .default(0.5),
        def(s, "decay2", "DEC2", 53, "Decay of the second modulator"),
        def(s, "end2", "END2", 54, "End level of the second modulator"),
        def(s, "mod2", "MOD2", 55, "Modulation amount of the second modulator"),
        def(s, "body_hold", "HOLD", 56, "Hold time of the body envelope"),
        def(s, "body_decay", "DEC", 57, "Decay time of the body envelope"),
        def(s, "op_c_phase", "PH.C", 58, "Start phase of operator C").range(0, 91, 0.0, 91.0),
        def(s, "body_level", "LEV", 59, "Level of the body"),
        def(s, "noise_reset", "NRST", 62, "Restart the noise generator on each trig").options(on_off),
        def(s, "noise_ring_mod", "NRM", 63, "Ring modulate the noise with the body").options(on_off),
        def(s, "noise_hold", "NHLD", 70, "Hold time of the noise envelope"),
        def(s, "noise_decay", "NDEC", 71, "Decay time of the noise envelope"),
        def(s, "transient", "TRAN", 72, "Transient sample selection").range(0, 124, 0.0, 124.0),
        def(s, "transient_level", "TLEV", 73, "Level of the transient"),
        def(s, "noise_base", "BASE", 74, "Lower edge of the noise band"),
        def(s, "noise_width", "WDTH", 75, "Width of the noise band"),
        def(s, "noise_grain", "GRAN", 76, "Grain density of the noise"),
        def(s, "noise_level", "NLEV", 77, "Level of the noise"),
    ])
}
