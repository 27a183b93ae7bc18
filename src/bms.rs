//! Front end for the channel/value chart format (`.bms`/`.bme`).
//!
//! Unlike the row-grid format, timing here is defined locally per
//! measure: note positions are fractional offsets within the enclosing
//! measure and tempo changes are inline events in the same stream as the
//! notes. A global breakpoint map would need a pre-pass this format does
//! not require, so the decoder integrates a running clock instead,
//! advancing `Δposition * measure_beats * 60 / bpm` between events.

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    ConvertError,
    chart::{Chart, Note, TempoEvent, round_note_time, round_tempo_time},
    timeline::DEFAULT_BPM,
    util::parse_real,
};

/// Difficulty name a channel/value chart's single stream lands under.
pub const DEFAULT_DIFFICULTY: &str = "Hard";

/// Beats of a measure with the default length factor of 1.
const BEATS_PER_MEASURE: f64 = 4.0;

/// Channel redefining the measure length as a factor of the default.
const SECTION_LEN_CHANNEL: &str = "02";
/// Channel carrying tempo changes as two-digit hex literals.
const INLINE_BPM_CHANNEL: &str = "03";
/// Channel referencing a `#BPMxx` tempo definition.
const BPM_REF_CHANNEL: &str = "08";

/// The channel-to-lane table in use, fixed per configured lane count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyLayout {
    /// Scratch plus seven keys, eight lanes. The scratch channel `16`
    /// maps to lane 0.
    #[default]
    Beat7Scratch,
    /// Seven keys without the scratch lane; scratch objects are dropped.
    Beat7,
}

impl KeyLayout {
    /// Number of lanes of this layout.
    #[must_use]
    pub const fn lane_count(self) -> u8 {
        match self {
            Self::Beat7Scratch => 8,
            Self::Beat7 => 7,
        }
    }

    /// Resolves a note channel code into a lane, `None` for channels
    /// this layout does not play.
    #[must_use]
    pub fn lane_of_channel(self, channel: &str) -> Option<u8> {
        match (self, channel) {
            (Self::Beat7Scratch, "16") => Some(0),
            (Self::Beat7Scratch, "11") => Some(1),
            (Self::Beat7Scratch, "12") => Some(2),
            (Self::Beat7Scratch, "13") => Some(3),
            (Self::Beat7Scratch, "14") => Some(4),
            (Self::Beat7Scratch, "15") => Some(5),
            (Self::Beat7Scratch, "18") => Some(6),
            (Self::Beat7Scratch, "19") => Some(7),
            (Self::Beat7, "11") => Some(0),
            (Self::Beat7, "12") => Some(1),
            (Self::Beat7, "13") => Some(2),
            (Self::Beat7, "14") => Some(3),
            (Self::Beat7, "15") => Some(4),
            (Self::Beat7, "18") => Some(5),
            (Self::Beat7, "19") => Some(6),
            _ => None,
        }
    }
}

/// A non-fatal condition found while converting a channel/value chart.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BmsWarning {
    /// No `#BPM` header was found; the default tempo is used.
    #[error("no #BPM header, falling back to the default tempo")]
    MissingTempo,
    /// A `#BPM` or `#BPMxx` value did not parse; the line is dropped.
    #[error("line {line}: unparseable tempo value `{value}`")]
    MalformedTempo {
        /// One-based source line number.
        line: usize,
        /// The value text as found in the source.
        value: String,
    },
    /// A channel `02` measure length factor did not parse or was not
    /// positive; the measure keeps the default length.
    #[error("measure {measure}: invalid length factor `{value}`")]
    MalformedMeasureLength {
        /// Measure index the factor belonged to.
        measure: usize,
        /// The value text as found in the source.
        value: String,
    },
    /// An inline tempo literal on channel `03` was not a positive hex
    /// number; the tempo is left unchanged.
    #[error("measure {measure}: invalid inline tempo `{value}`")]
    MalformedInlineTempo {
        /// Measure index the event sat in.
        measure: usize,
        /// The two-digit slot value.
        value: String,
    },
    /// A channel `08` event referenced an undefined `#BPMxx` id; the
    /// tempo is left unchanged.
    #[error("measure {measure}: unknown tempo definition `{id}`")]
    UnknownTempoRef {
        /// Measure index the event sat in.
        measure: usize,
        /// The referenced definition id.
        id: String,
    },
    /// A measure message carried non-ASCII data and was dropped.
    #[error("measure {measure}: undecodable message on channel {channel}")]
    MalformedMessage {
        /// Measure index of the message.
        measure: usize,
        /// Channel code of the message.
        channel: String,
    },
}

/// A converted channel/value chart and the warnings collected on the
/// way.
#[derive(Debug, Clone, PartialEq)]
pub struct BmsParseOutput {
    /// The canonical chart.
    pub chart: Chart,
    /// Skip and fallback decisions, in source order.
    pub warnings: Vec<BmsWarning>,
}

/// One `#mmmcc:data` line, grouped under its measure index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MeasureMessage<'a> {
    channel: &'a str,
    data: &'a str,
}

#[derive(Debug, Default)]
struct BmsSource<'a> {
    title: Option<&'a str>,
    artist: Option<&'a str>,
    bpm: Option<f64>,
    bpm_defs: HashMap<&'a str, f64>,
    messages: HashMap<usize, Vec<MeasureMessage<'a>>>,
}

fn lex<'a>(source: &'a str, warnings: &mut Vec<BmsWarning>) -> BmsSource<'a> {
    let mut lexed = BmsSource::default();
    for (index, raw) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim();
        if !line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#TITLE") {
            lexed.title = Some(rest.trim()).filter(|text| !text.is_empty());
        } else if let Some(rest) = line.strip_prefix("#ARTIST") {
            lexed.artist = Some(rest.trim()).filter(|text| !text.is_empty());
        } else if let Some(rest) = line.strip_prefix("#BPM ") {
            match parse_real(rest) {
                Some(value) if value > 0.0 => lexed.bpm = Some(value),
                _ => warnings.push(BmsWarning::MalformedTempo {
                    line: line_number,
                    value: rest.trim().to_owned(),
                }),
            }
        } else if let Some(rest) = line.strip_prefix("#BPM") {
            // `#BPMxx <value>`, a referencable tempo definition.
            if rest.len() >= 2 && rest.is_char_boundary(2) {
                let (id, tail) = rest.split_at(2);
                if id.bytes().all(|byte| byte.is_ascii_alphanumeric()) {
                    match parse_real(tail) {
                        Some(value) if value > 0.0 => {
                            lexed.bpm_defs.insert(id, value);
                        }
                        _ => warnings.push(BmsWarning::MalformedTempo {
                            line: line_number,
                            value: tail.trim().to_owned(),
                        }),
                    }
                }
            }
        } else if let Some((command, data)) = line.split_once(':') {
            let body = &command[1..];
            if body.len() == 5 && body.as_bytes()[..3].iter().all(u8::is_ascii_digit) {
                let Ok(measure) = body[..3].parse::<usize>() else {
                    continue;
                };
                lexed
                    .messages
                    .entry(measure)
                    .or_default()
                    .push(MeasureMessage {
                        channel: &body[3..],
                        data: data.trim(),
                    });
            }
        }
    }
    lexed
}

/// A non-empty slot of a measure message, positioned fractionally within
/// its measure.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SlotEvent<'a> {
    position: f64,
    channel: &'a str,
    value: &'a str,
}

/// Converts a channel/value chart source with the default key layout.
///
/// # Errors
///
/// Returns [`ConvertError::NoNoteData`] when no measure line emits a
/// single note.
pub fn parse(source: &str) -> Result<BmsParseOutput, ConvertError> {
    parse_with_layout(source, KeyLayout::default())
}

/// Converts a channel/value chart source with an explicit key layout.
///
/// # Errors
///
/// Returns [`ConvertError::NoNoteData`] when no measure line emits a
/// single note.
pub fn parse_with_layout(source: &str, layout: KeyLayout) -> Result<BmsParseOutput, ConvertError> {
    let mut warnings = Vec::new();
    let lexed = lex(source, &mut warnings);
    if lexed.messages.is_empty() {
        return Err(ConvertError::NoNoteData);
    }

    let default_bpm = lexed.bpm.unwrap_or_else(|| {
        warnings.push(BmsWarning::MissingTempo);
        DEFAULT_BPM
    });
    let max_measure = lexed.messages.keys().copied().max().unwrap_or(0);

    let mut notes = Vec::new();
    let mut tempo_events = vec![TempoEvent {
        time: 0.0,
        bpm: default_bpm,
    }];
    let mut current_bpm = default_bpm;
    let mut current_time = 0.0;

    for measure in 0..=max_measure {
        let mut measure_len = 1.0;
        let mut events: Vec<SlotEvent<'_>> = Vec::new();

        for message in lexed.messages.get(&measure).into_iter().flatten() {
            if message.channel == SECTION_LEN_CHANNEL {
                match parse_real(message.data) {
                    Some(factor) if factor > 0.0 => measure_len = factor,
                    _ => warnings.push(BmsWarning::MalformedMeasureLength {
                        measure,
                        value: message.data.to_owned(),
                    }),
                }
                continue;
            }
            if !message.data.is_ascii() {
                warnings.push(BmsWarning::MalformedMessage {
                    measure,
                    channel: message.channel.to_owned(),
                });
                continue;
            }
            let total = message.data.len() / 2;
            for i in 0..total {
                let value = &message.data[i * 2..i * 2 + 2];
                if value != "00" {
                    events.push(SlotEvent {
                        position: i as f64 / total as f64,
                        channel: message.channel,
                        value,
                    });
                }
            }
        }

        // Stable by construction: events on the same position apply in
        // source line order, tempo lines usually preceding note lines.
        events.sort_by(|a, b| a.position.total_cmp(&b.position));

        let measure_beats = BEATS_PER_MEASURE * measure_len;
        let mut last_position = 0.0;
        for event in events {
            current_time += (event.position - last_position) * measure_beats * 60.0 / current_bpm;
            last_position = event.position;

            if event.channel == INLINE_BPM_CHANNEL {
                match u32::from_str_radix(event.value, 16) {
                    Ok(value) if value > 0 => {
                        current_bpm = f64::from(value);
                        tempo_events.push(TempoEvent {
                            time: round_tempo_time(current_time),
                            bpm: current_bpm,
                        });
                    }
                    _ => warnings.push(BmsWarning::MalformedInlineTempo {
                        measure,
                        value: event.value.to_owned(),
                    }),
                }
            } else if event.channel == BPM_REF_CHANNEL {
                match lexed.bpm_defs.get(event.value) {
                    Some(&value) => {
                        current_bpm = value;
                        tempo_events.push(TempoEvent {
                            time: round_tempo_time(current_time),
                            bpm: current_bpm,
                        });
                    }
                    None => warnings.push(BmsWarning::UnknownTempoRef {
                        measure,
                        id: event.value.to_owned(),
                    }),
                }
            } else if let Some(lane) = layout.lane_of_channel(event.channel) {
                notes.push(Note {
                    time: round_note_time(current_time),
                    lane,
                    duration: 0.0,
                });
            }
        }
        // Run out the rest of the measure before the next one starts.
        current_time += (1.0 - last_position) * measure_beats * 60.0 / current_bpm;
    }

    if notes.is_empty() {
        return Err(ConvertError::NoNoteData);
    }
    notes.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut chart = Chart {
        bpm: default_bpm,
        offset: 0.0,
        tempo_events,
        notes: Default::default(),
        lane_count: layout.lane_count(),
        title: lexed.title.map(ToOwned::to_owned),
        artist: lexed.artist.map(ToOwned::to_owned),
        music: None,
    };
    chart.insert_difficulty(DEFAULT_DIFFICULTY, notes);
    Ok(BmsParseOutput { chart, warnings })
}
