//! Front end for the row-grid chart format (`.sm`).
//!
//! Timing directives (`#BPMS`, `#STOPS`) live apart from the note data,
//! so this front end first builds a global [`BeatTimeMap`] and then
//! resolves every row's beat through it. Each `#NOTES` section carries
//! one difficulty stream: `:`-separated header fields followed by the
//! row grid, measures separated by `,`, one character per lane.

use std::collections::HashMap;

use itertools::Itertools;
use thiserror::Error;

use crate::{
    ConvertError,
    chart::{Chart, Note, round_note_time},
    timeline::{BeatTimeMap, Pause, TempoChange},
    util::parse_real,
};

/// Number of input columns of the row-grid format.
pub const SM_LANE_COUNT: u8 = 4;

/// Every measure spans this many beats, whatever its row count.
const BEATS_PER_MEASURE: f64 = 4.0;

const COMMENT_MARKER: &str = "//";

/// Index of the difficulty name among the `:`-separated `#NOTES` fields.
const DIFFICULTY_FIELD: usize = 2;

/// Minimum `#NOTES` field count: type, description, difficulty, meter,
/// radar values, row grid.
const NOTES_FIELD_COUNT: usize = 6;

/// A non-fatal condition found while converting a row-grid chart.
///
/// Each variant records a skip or fallback decision: data was dropped or
/// substituted, and the conversion carried on.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SmWarning {
    /// No `#BPMS` directive was found; the default tempo is used.
    #[error("no #BPMS directive, falling back to the default tempo")]
    MissingTempo,
    /// A `beat=value` entry of a timing directive did not parse.
    #[error("unparseable entry `{entry}` in #{directive} dropped")]
    MalformedDirectiveEntry {
        /// Name of the directive the entry belongs to.
        directive: String,
        /// The entry text as found in the source.
        entry: String,
    },
    /// The `#OFFSET` value did not parse; zero is used.
    #[error("unparseable #OFFSET value `{value}`, using 0")]
    MalformedOffset {
        /// The value text as found in the source.
        value: String,
    },
    /// A row shorter than the lane width was dropped. Dropping a row
    /// changes the measure's subdivision and thereby the timing of every
    /// remaining row in it.
    #[error("{difficulty}: measure {measure} row {row} is malformed, dropped")]
    MalformedRow {
        /// Difficulty stream the row belongs to.
        difficulty: String,
        /// Zero-based measure index within the stream.
        measure: usize,
        /// Zero-based row index within the measure, before filtering.
        row: usize,
    },
    /// A hold-end marker had no matching hold-start; no note is emitted.
    #[error("{difficulty}: measure {measure} hold end on lane {lane} without an open hold")]
    UnmatchedHoldEnd {
        /// Difficulty stream the marker belongs to.
        difficulty: String,
        /// Zero-based measure index within the stream.
        measure: usize,
        /// Lane of the dangling marker.
        lane: u8,
    },
    /// A hold was still open when the stream ended; no note is emitted.
    #[error("{difficulty}: hold on lane {lane} never closed")]
    UnterminatedHold {
        /// Difficulty stream the hold belongs to.
        difficulty: String,
        /// Lane of the open hold.
        lane: u8,
    },
    /// A `#NOTES` section had too few fields and was skipped entirely.
    #[error("#NOTES section {index} has too few fields, skipped")]
    MalformedNotesSection {
        /// Zero-based index of the section within the file.
        index: usize,
    },
}

/// A converted row-grid chart and the warnings collected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct SmParseOutput {
    /// The canonical chart.
    pub chart: Chart,
    /// Skip and fallback decisions, in source order.
    pub warnings: Vec<SmWarning>,
}

/// One `#TAG:value;` segment. The value may span lines and contain `:`;
/// it ends at the first `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Directive<'a> {
    tag: &'a str,
    value: &'a str,
}

fn directives(source: &str) -> Vec<Directive<'_>> {
    let mut found = Vec::new();
    let mut index = 0;
    while let Some(hash) = source[index..].find('#') {
        let tag_start = index + hash + 1;
        let Some(colon) = source[tag_start..].find(':') else {
            break;
        };
        let tag = &source[tag_start..tag_start + colon];
        if tag.contains(';') || tag.contains('\n') {
            // Stray `#` without a directive; resync past it.
            index = tag_start;
            continue;
        }
        let value_start = tag_start + colon + 1;
        let Some(semicolon) = source[value_start..].find(';') else {
            break;
        };
        found.push(Directive {
            tag: tag.trim(),
            value: &source[value_start..value_start + semicolon],
        });
        index = value_start + semicolon + 1;
    }
    found
}

/// Parses a comma-separated `beat=value` list (`#BPMS`, `#STOPS`).
fn parse_beat_pairs(
    directive: &str,
    value: &str,
    warnings: &mut Vec<SmWarning>,
) -> Vec<(f64, f64)> {
    let cleaned = value.replace(['\n', '\r'], "");
    cleaned
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let parsed = entry
                .split_once('=')
                .and_then(|(beat, value)| Some((parse_real(beat)?, parse_real(value)?)));
            if parsed.is_none() {
                warnings.push(SmWarning::MalformedDirectiveEntry {
                    directive: directive.to_owned(),
                    entry: entry.trim().to_owned(),
                });
            }
            parsed
        })
        .collect()
}

/// Walks one difficulty stream's row grid and emits its notes.
fn decode_grid(
    grid: &str,
    map: &BeatTimeMap,
    difficulty: &str,
    warnings: &mut Vec<SmWarning>,
) -> Vec<Note> {
    let mut notes = Vec::new();
    let mut open_holds: HashMap<u8, f64> = HashMap::new();
    let mut measure_start = 0.0;

    for (measure_index, measure) in grid.split(',').enumerate() {
        // Filtering happens before the subdivision is computed, so a
        // dropped row retimes the whole measure.
        let mut rows = Vec::new();
        for (row_index, row) in measure.split_whitespace().enumerate() {
            if row.starts_with(COMMENT_MARKER) {
                continue;
            }
            if row.chars().count() < SM_LANE_COUNT as usize {
                warnings.push(SmWarning::MalformedRow {
                    difficulty: difficulty.to_owned(),
                    measure: measure_index,
                    row: row_index,
                });
                continue;
            }
            rows.push(row);
        }

        if !rows.is_empty() {
            let beats_per_line = BEATS_PER_MEASURE / rows.len() as f64;
            for (i, row) in rows.iter().enumerate() {
                let beat = measure_start + i as f64 * beats_per_line;
                let time = map.time_at_beat(beat);
                for (lane, symbol) in row.chars().take(SM_LANE_COUNT as usize).enumerate() {
                    let lane = lane as u8;
                    match symbol {
                        // Mines are scored like taps for now.
                        '1' | 'M' => notes.push(Note {
                            time: round_note_time(time),
                            lane,
                            duration: 0.0,
                        }),
                        '2' => {
                            open_holds.insert(lane, time);
                        }
                        '3' => match open_holds.remove(&lane) {
                            Some(opened) => notes.push(Note {
                                time: round_note_time(opened),
                                lane,
                                duration: round_note_time(time - opened),
                            }),
                            None => warnings.push(SmWarning::UnmatchedHoldEnd {
                                difficulty: difficulty.to_owned(),
                                measure: measure_index,
                                lane,
                            }),
                        },
                        _ => {}
                    }
                }
            }
        }
        measure_start += BEATS_PER_MEASURE;
    }

    for lane in open_holds.into_keys().sorted() {
        warnings.push(SmWarning::UnterminatedHold {
            difficulty: difficulty.to_owned(),
            lane,
        });
    }

    // Interpolation together with duplicate pause breakpoints can emit
    // out of order across measure boundaries.
    notes.sort_by(|a, b| a.time.total_cmp(&b.time));
    notes
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Converts a row-grid chart source into a [`Chart`].
///
/// # Errors
///
/// Returns [`ConvertError::NoNoteData`] when no `#NOTES` section yields
/// a single note.
pub fn parse(source: &str) -> Result<SmParseOutput, ConvertError> {
    let mut warnings = Vec::new();

    let mut title = None;
    let mut artist = None;
    let mut music = None;
    let mut offset = 0.0;
    let mut bpm_pairs = Vec::new();
    let mut stop_pairs = Vec::new();
    let mut note_sections = Vec::new();

    for directive in directives(source) {
        match directive.tag.to_ascii_uppercase().as_str() {
            "TITLE" => title = non_empty(directive.value),
            "ARTIST" => artist = non_empty(directive.value),
            "MUSIC" => music = non_empty(directive.value),
            "OFFSET" => match parse_real(directive.value) {
                Some(value) => offset = value,
                None => warnings.push(SmWarning::MalformedOffset {
                    value: directive.value.trim().to_owned(),
                }),
            },
            "BPMS" => bpm_pairs = parse_beat_pairs("BPMS", directive.value, &mut warnings),
            "STOPS" => stop_pairs = parse_beat_pairs("STOPS", directive.value, &mut warnings),
            "NOTES" => note_sections.push(directive.value),
            _ => {}
        }
    }

    if bpm_pairs.is_empty() {
        warnings.push(SmWarning::MissingTempo);
    }
    let tempo_changes: Vec<TempoChange> = bpm_pairs
        .iter()
        .map(|&(beat, bpm)| TempoChange { beat, bpm })
        .collect();
    let pauses: Vec<Pause> = stop_pairs
        .iter()
        .map(|&(beat, seconds)| Pause { beat, seconds })
        .collect();
    let (map, tempo_events) = BeatTimeMap::build(&tempo_changes, &pauses);

    let mut chart = Chart {
        bpm: tempo_events[0].bpm,
        offset,
        tempo_events,
        notes: Default::default(),
        lane_count: SM_LANE_COUNT,
        title,
        artist,
        music,
    };

    for (index, section) in note_sections.into_iter().enumerate() {
        let fields: Vec<&str> = section.split(':').collect();
        if fields.len() < NOTES_FIELD_COUNT {
            warnings.push(SmWarning::MalformedNotesSection { index });
            continue;
        }
        let difficulty = fields[DIFFICULTY_FIELD].trim();
        let grid = fields[fields.len() - 1];
        let notes = decode_grid(grid, &map, difficulty, &mut warnings);
        chart.insert_difficulty(difficulty, notes);
    }

    if chart.notes.values().all(Vec::is_empty) {
        return Err(ConvertError::NoNoteData);
    }
    Ok(SmParseOutput { chart, warnings })
}
