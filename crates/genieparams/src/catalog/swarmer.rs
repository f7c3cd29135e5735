//! Swarmer machine: a main oscillator under a detuned swarm.

use super::{build, def};
use crate::types::{ParameterDefinition, Section};

pub(super) fn definitions() -> Vec<ParameterDefinition> {
    let s = Section::Swarmer;
    build(vec![
        def(s, "tune", "TUNE", 40, "Base pitch in semitones").display(-60.0, 60.0).default(0),
        def(s, "swarm", "SWRM", 41, "Swarm waveform").display(0.0, 120.0).default(80),
        def(s, "detune", "DET", 42, "Spread of the swarm voices").default(70),
        def(s, "mix", "MIX", 43, "Balance between main oscillator and swarm").default(127),
        def(s, "main_octave", "M.OCT", 44, "Octave of the main oscillator")
            .range(0, 2, 0.0, 2.0)
            .default(0),
        def(s, "main", "MAIN", 45, "Main oscillator waveform").display(0.0, 120.0).default(80),
        def(s, "animation", "ANIM", 46, "Movement of the swarm voices").default(15),
        def(s, "noise_mod", "N.MOD", 47, "Noise modulation of the swarm").default(20),
    ])
}
