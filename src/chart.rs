//! The canonical chart model both front ends populate.
//!
//! A [`Chart`] is built once per input file (or group of files merged
//! into one song) and is not modified afterwards, except through
//! [`Chart::merge`] when several single-difficulty sources are grouped
//! together.

use std::collections::BTreeMap;

/// A single scheduled note.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// Hit time in seconds from the start of the chart.
    pub time: f64,
    /// Input column the note belongs to, always below the chart's lane
    /// count.
    pub lane: u8,
    /// Hold length in seconds. `0.0` is a tap; a positive value spans
    /// `[time, time + duration)`.
    pub duration: f64,
}

/// One entry of the tempo event log consumed by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TempoEvent {
    /// Wall-clock time of the change in seconds.
    pub time: f64,
    /// The tempo in force from this time on. `0.0` denotes a pause; a
    /// resume event with the previous tempo follows once the pause ends.
    pub bpm: f64,
}

/// The time-domain chart produced from one input file or group.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Chart {
    /// The tempo the chart starts with.
    pub bpm: f64,
    /// Audio offset in seconds, taken verbatim from the source.
    pub offset: f64,
    /// Tempo changes and pauses, non-decreasing in time, starting with
    /// an entry at time zero.
    pub tempo_events: Vec<TempoEvent>,
    /// Note lists keyed by difficulty name, each ascending in time.
    pub notes: BTreeMap<String, Vec<Note>>,
    /// Number of input columns of this chart's format family.
    pub lane_count: u8,
    /// Song title, when the source names one.
    pub title: Option<String>,
    /// Song artist, when the source names one.
    pub artist: Option<String>,
    /// Audio file name the source refers to, if any. Matching it against
    /// files on disk is the caller's concern.
    pub music: Option<String>,
}

impl Chart {
    /// Adds a difficulty stream, resolving name collisions by numeric
    /// suffixing (`name_2`, `name_3`, ...). An already present entry is
    /// never overwritten.
    pub fn insert_difficulty(&mut self, name: impl Into<String>, notes: Vec<Note>) {
        let name = name.into();
        if !self.notes.contains_key(&name) {
            self.notes.insert(name, notes);
            return;
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{name}_{suffix}");
            if !self.notes.contains_key(&candidate) {
                self.notes.insert(candidate, notes);
                return;
            }
            suffix += 1;
        }
    }

    /// Absorbs the difficulty streams of another chart.
    ///
    /// The receiver keeps its own tempo, offset and tempo event log: the
    /// first successfully parsed source of a group seeds those, later
    /// sources only contribute notes.
    pub fn merge(&mut self, other: Chart) {
        for (name, notes) in other.notes {
            self.insert_difficulty(name, notes);
        }
    }
}

/// Rounds a note time or hold duration to the stable serialization
/// precision of 4 decimal places.
#[must_use]
pub fn round_note_time(seconds: f64) -> f64 {
    (seconds * 1e4).round() / 1e4
}

/// Rounds a tempo event time to the stable serialization precision of
/// 6 decimal places.
#[must_use]
pub fn round_tempo_time(seconds: f64) -> f64 {
    (seconds * 1e6).round() / 1e6
}
