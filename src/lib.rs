//! The chart timing and note extraction engine for rhythm game charts.
//!
//! This crate converts chart descriptions written in two community text
//! formats into one canonical, time-domain note schedule:
//!
//! - the row-grid format (`.sm`), where each measure is a stack of
//!   fixed-width rows and timing directives (`#BPMS`, `#STOPS`) live in a
//!   separate header, and
//! - the channel/value format (`.bms`/`.bme`), where notes and tempo
//!   changes are hex-pair slots on per-measure channels.
//!
//! Both front ends populate the same [`chart::Chart`] model: a default
//! tempo, an offset, an ordered tempo event log and per-difficulty note
//! lists. The row-grid front end resolves note times through a global
//! beat-to-time breakpoint map built by [`timeline::BeatTimeMap`]; the
//! channel/value front end integrates a running clock measure by measure,
//! because its positions are always relative to the enclosing measure.
//!
//! The engine is a pure transform: it reads an immutable text buffer and
//! returns a chart plus the warnings collected along the way. It performs
//! no file discovery and no I/O; callers decode raw bytes with the
//! helpers in [`encoding`] first.
//!
//! ```
//! use notechart::{convert, ChartOutput};
//!
//! let source = "#BPMS:0=120;\n#NOTES:a:b:Easy:1:0:1000\n0001\n;";
//! let ChartOutput { chart, warnings } = convert(source).expect("chart");
//! assert_eq!(chart.notes["Easy"].len(), 2);
//! assert!(warnings.is_empty());
//! ```

pub mod bms;
pub mod chart;
pub mod encoding;
pub mod prelude;
pub mod sm;
pub mod timeline;

mod util;

use thiserror::Error;

use crate::{bms::BmsWarning, chart::Chart, sm::SmWarning};

/// A hard failure that makes the whole input unusable.
///
/// Everything milder is reported as a [`ChartWarning`] on the output
/// instead; a file only fails as a whole when it cannot yield any chart
/// at all.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ConvertError {
    /// The input matched neither the row-grid nor the channel/value
    /// format.
    #[error("input is not a recognized chart format")]
    UnknownFormat,
    /// The measure walk finished without producing a single note.
    #[error("no usable note data in input")]
    NoNoteData,
}

/// A non-fatal condition reported by either front end.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChartWarning {
    /// A warning from the row-grid front end.
    #[error("sm: {0}")]
    Sm(#[from] SmWarning),
    /// A warning from the channel/value front end.
    #[error("bms: {0}")]
    Bms(#[from] BmsWarning),
}

/// The input family a chart source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartFormat {
    /// Row-grid format (`.sm`).
    Sm,
    /// Channel/value format (`.bms`/`.bme`).
    Bms,
}

impl ChartFormat {
    /// Guesses the format of `source` from its directives.
    ///
    /// Row-grid sources are recognized by their `#NOTES:`/`#BPMS:`
    /// headers, channel/value sources by the presence of at least one
    /// `#mmmcc:` measure line.
    #[must_use]
    pub fn detect(source: &str) -> Option<Self> {
        if source.contains("#NOTES:") || source.contains("#BPMS:") {
            return Some(Self::Sm);
        }
        let has_measure_line = source.lines().any(|raw| {
            let line = raw.trim().as_bytes();
            line.len() >= 7
                && line[0] == b'#'
                && line[1..4].iter().all(u8::is_ascii_digit)
                && line[6] == b':'
        });
        has_measure_line.then_some(Self::Bms)
    }
}

/// A converted chart together with every warning collected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOutput {
    /// The canonical chart.
    pub chart: Chart,
    /// Skip and fallback decisions made while converting, for auditing
    /// silent data loss.
    pub warnings: Vec<ChartWarning>,
}

/// Detects the format of `source` and runs the matching front end.
///
/// # Errors
///
/// Returns [`ConvertError::UnknownFormat`] when the format cannot be
/// detected and [`ConvertError::NoNoteData`] when the input contains no
/// usable notes.
pub fn convert(source: &str) -> Result<ChartOutput, ConvertError> {
    match ChartFormat::detect(source).ok_or(ConvertError::UnknownFormat)? {
        ChartFormat::Sm => {
            let sm::SmParseOutput { chart, warnings } = sm::parse(source)?;
            Ok(ChartOutput {
                chart,
                warnings: warnings.into_iter().map(ChartWarning::from).collect(),
            })
        }
        ChartFormat::Bms => {
            let bms::BmsParseOutput { chart, warnings } = bms::parse(source)?;
            Ok(ChartOutput {
                chart,
                warnings: warnings.into_iter().map(ChartWarning::from).collect(),
            })
        }
    }
}
