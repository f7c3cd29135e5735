//! Per-track performance controls: mute, level and trig parameters.

use super::{build, def};
use crate::types::{ParameterDefinition, Section};

pub(super) fn definitions() -> Vec<ParameterDefinition> {
    let on_off: &[&str] = &["off", "on"];
    let track = Section::Track;
    let trig = Section::Trig;

    build(vec![
        def(track, "mute", "MUTE", 94, "Mute the track").options(on_off).default("off"),
        def(track, "level", "LEV", 95, "Track level"),
        def(trig, "note", "NOTE", 3, "Trig note as a MIDI note number"),
        def(trig, "velocity", "VEL", 4, "Trig velocity").default(100),
        def(trig, "length", "LEN", 5, "Trig note length"),
        def(trig, "filter_trig", "FLTR", 13, "Trigs restart the filter envelope")
            .options(on_off)
            .default("on"),
        def(trig, "lfo_trig", "LFO", 14, "Trigs restart the LFOs")
            .options(on_off)
            .default("on"),
        def(trig, "portamento_time", "PORT", 9, "Glide time between notes").default(0),
        def(trig, "portamento_on_off", "PORT.ON", 65, "Enable glide")
            .options(on_off)
            .default("off"),
    ])
}
