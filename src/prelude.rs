//! Re-exports of the commonly used API surface.
//!
//! ```
//! use notechart::prelude::*;
//!
//! let output = convert("#BPM 150\n#00011:01").expect("chart");
//! assert_eq!(output.chart.bpm, 150.0);
//! ```

pub use crate::{
    ChartFormat, ChartOutput, ChartWarning, ConvertError,
    bms::{BmsParseOutput, BmsWarning, DEFAULT_DIFFICULTY, KeyLayout},
    chart::{Chart, Note, TempoEvent, round_note_time, round_tempo_time},
    convert,
    encoding::{decode_shift_jis, decode_utf8},
    sm::{SM_LANE_COUNT, SmParseOutput, SmWarning},
    timeline::{
        BeatTimeMap, Breakpoint, DEFAULT_BPM, NOTE_MATCH_EPSILON, Pause, TEMPO_MATCH_EPSILON,
        TempoChange,
    },
};
