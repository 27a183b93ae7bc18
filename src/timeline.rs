//! Construction of the beat to wall-clock mapping.
//!
//! Tempo changes and pauses arrive as sparse directives keyed by beat
//! position. [`BeatTimeMap::build`] walks them once and produces an
//! ordered breakpoint sequence plus the tempo event log; the row-grid
//! decoder then resolves every note beat through
//! [`BeatTimeMap::time_at_beat`].
//!
//! A pause holds wall-clock time still while the beat position does not
//! advance, so the beat it sits on owns **two** breakpoints: one with
//! the time immediately before the pause and one immediately after.
//! The breakpoint list is therefore an ordered sequence of records, not
//! a keyed map, and lookups must never assume beat uniqueness.

use itertools::Itertools;

use crate::chart::{TempoEvent, round_tempo_time};

/// The tempo assumed when a chart defines none.
pub const DEFAULT_BPM: f64 = 120.0;

/// Tolerance in beats when matching a walked beat against the directive
/// lists.
pub const TEMPO_MATCH_EPSILON: f64 = 0.001;

/// Tolerance in beats when matching a note beat against a breakpoint.
///
/// Looser than [`TEMPO_MATCH_EPSILON`]: note grids are quantized more
/// coarsely than the directive lists, and this tolerance must be at
/// least as large as the directive one. Collapsing the two constants has
/// not been validated against real chart corpora, so they stay separate.
pub const NOTE_MATCH_EPSILON: f64 = 0.002;

/// A tempo change directive: from `beat` on, the chart runs at `bpm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    /// Beat position the change applies at.
    pub beat: f64,
    /// The new tempo in beats per minute.
    pub bpm: f64,
}

/// A pause directive: at `beat`, wall-clock time stands still for
/// `seconds` while the beat position does not advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pause {
    /// Beat position the pause applies at.
    pub beat: f64,
    /// Pause length in seconds.
    pub seconds: f64,
}

/// A resolved `(beat, time)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    /// Beat position of this breakpoint.
    pub beat: f64,
    /// Wall-clock time of this breakpoint in seconds.
    pub time: f64,
}

/// The monotonic beat to time mapping of one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatTimeMap {
    breakpoints: Vec<Breakpoint>,
    tempo_changes: Vec<TempoChange>,
}

impl BeatTimeMap {
    /// Builds the mapping and the tempo event log from unordered
    /// directive lists.
    ///
    /// The log always starts with an entry at time zero carrying the
    /// seed tempo: the earliest tempo change, or [`DEFAULT_BPM`] when
    /// the chart defines none. When a tempo change and a pause share a
    /// beat the tempo applies first, so the resume event carries the new
    /// tempo.
    #[must_use]
    pub fn build(tempo_changes: &[TempoChange], pauses: &[Pause]) -> (Self, Vec<TempoEvent>) {
        let mut tempo_changes = tempo_changes.to_vec();
        tempo_changes.sort_by(|a, b| a.beat.total_cmp(&b.beat));

        let mut current_bpm = tempo_changes.first().map_or(DEFAULT_BPM, |change| change.bpm);
        let mut current_beat = 0.0;
        let mut current_time = 0.0;
        let mut breakpoints = vec![Breakpoint {
            beat: 0.0,
            time: 0.0,
        }];
        let mut tempo_events = vec![TempoEvent {
            time: 0.0,
            bpm: current_bpm,
        }];

        // Beat 0 is the implicit origin and never walked.
        let beats: Vec<f64> = tempo_changes
            .iter()
            .map(|change| change.beat)
            .chain(pauses.iter().map(|pause| pause.beat))
            .filter(|&beat| beat > 0.0)
            .sorted_by(f64::total_cmp)
            .dedup_by(|a, b| (a - b).abs() < TEMPO_MATCH_EPSILON)
            .collect();

        for beat in beats {
            current_time += (beat - current_beat) * 60.0 / current_bpm;
            current_beat = beat;
            breakpoints.push(Breakpoint {
                beat,
                time: current_time,
            });

            if let Some(change) = tempo_changes
                .iter()
                .find(|change| (change.beat - beat).abs() < TEMPO_MATCH_EPSILON)
            {
                current_bpm = change.bpm;
                tempo_events.push(TempoEvent {
                    time: round_tempo_time(current_time),
                    bpm: current_bpm,
                });
            }

            if let Some(pause) = pauses
                .iter()
                .find(|pause| (pause.beat - beat).abs() < TEMPO_MATCH_EPSILON)
            {
                tempo_events.push(TempoEvent {
                    time: round_tempo_time(current_time),
                    bpm: 0.0,
                });
                current_time += pause.seconds;
                tempo_events.push(TempoEvent {
                    time: round_tempo_time(current_time),
                    bpm: current_bpm,
                });
                // Second breakpoint on the same beat, recording the
                // post-pause time.
                breakpoints.push(Breakpoint {
                    beat,
                    time: current_time,
                });
            }
        }

        (
            Self {
                breakpoints,
                tempo_changes,
            },
            tempo_events,
        )
    }

    /// Resolves a beat position into wall-clock seconds.
    ///
    /// When one or more breakpoints lie within [`NOTE_MATCH_EPSILON`] of
    /// the query, the **minimum** matching time wins: a note sitting
    /// exactly on a pause boundary must be judged against the time
    /// before the pause, not after it. Beats between breakpoints are
    /// interpolated linearly at the tempo in force at the preceding
    /// breakpoint.
    #[must_use]
    pub fn time_at_beat(&self, beat: f64) -> f64 {
        let earliest_match = self
            .breakpoints
            .iter()
            .filter(|breakpoint| (breakpoint.beat - beat).abs() < NOTE_MATCH_EPSILON)
            .map(|breakpoint| breakpoint.time)
            .reduce(f64::min);
        if let Some(time) = earliest_match {
            return time;
        }

        let mut last = Breakpoint {
            beat: 0.0,
            time: 0.0,
        };
        for breakpoint in &self.breakpoints {
            if breakpoint.beat > beat {
                break;
            }
            // On a pause beat this keeps the later record, so beats past
            // the pause interpolate from the post-pause time.
            last = *breakpoint;
        }

        let mut active_bpm = DEFAULT_BPM;
        for change in &self.tempo_changes {
            if change.beat <= last.beat + TEMPO_MATCH_EPSILON {
                active_bpm = change.bpm;
            } else {
                break;
            }
        }
        last.time + (beat - last.beat) * 60.0 / active_bpm
    }

    /// The ordered breakpoint sequence, duplicate beats included.
    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn constant_tempo_is_linear() {
        let (map, events) = BeatTimeMap::build(
            &[TempoChange {
                beat: 0.0,
                bpm: 120.0,
            }],
            &[],
        );
        assert_eq!(
            events,
            vec![TempoEvent {
                time: 0.0,
                bpm: 120.0
            }]
        );
        assert_eq!(map.time_at_beat(0.0), 0.0);
        assert_eq!(map.time_at_beat(1.0), 0.5);
        assert_eq!(map.time_at_beat(7.0), 3.5);
    }

    #[test]
    fn seeds_default_tempo_without_directives() {
        let (map, events) = BeatTimeMap::build(&[], &[]);
        assert_eq!(events[0].bpm, DEFAULT_BPM);
        assert_eq!(map.time_at_beat(2.0), 1.0);
    }

    #[test]
    fn pause_duplicates_its_breakpoint() {
        let (map, events) = BeatTimeMap::build(
            &[TempoChange {
                beat: 0.0,
                bpm: 120.0,
            }],
            &[Pause {
                beat: 1.0,
                seconds: 1.0,
            }],
        );
        assert_eq!(
            map.breakpoints(),
            &[
                Breakpoint {
                    beat: 0.0,
                    time: 0.0
                },
                Breakpoint {
                    beat: 1.0,
                    time: 0.5
                },
                Breakpoint {
                    beat: 1.0,
                    time: 1.5
                },
            ]
        );
        assert_eq!(
            events,
            vec![
                TempoEvent {
                    time: 0.0,
                    bpm: 120.0
                },
                TempoEvent {
                    time: 0.5,
                    bpm: 0.0
                },
                TempoEvent {
                    time: 1.5,
                    bpm: 120.0
                },
            ]
        );
    }

    #[test]
    fn pause_boundary_prefers_pre_pause_time() {
        let (map, _) = BeatTimeMap::build(
            &[TempoChange {
                beat: 0.0,
                bpm: 120.0,
            }],
            &[Pause {
                beat: 1.0,
                seconds: 1.0,
            }],
        );
        // Exactly on the pause: the earlier of the duplicate records.
        assert_eq!(map.time_at_beat(1.0), 0.5);
        // Past the pause: interpolated from the post-pause record.
        assert_eq!(map.time_at_beat(1.5), 1.75);
        // Before the pause: plain interpolation from the origin.
        assert_eq!(map.time_at_beat(0.5), 0.25);
    }

    #[test]
    fn tempo_change_halves_the_slope() {
        let (map, events) = BeatTimeMap::build(
            &[
                TempoChange {
                    beat: 0.0,
                    bpm: 120.0,
                },
                TempoChange {
                    beat: 8.0,
                    bpm: 240.0,
                },
            ],
            &[],
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], TempoEvent {
            time: 4.0,
            bpm: 240.0
        });
        assert_eq!(map.time_at_beat(4.0), 2.0);
        // Continuity at the change itself.
        assert_eq!(map.time_at_beat(8.0), 4.0);
        assert_eq!(map.time_at_beat(10.0), 4.5);
    }

    #[test]
    fn tempo_change_and_pause_on_the_same_beat() {
        let (map, events) = BeatTimeMap::build(
            &[
                TempoChange {
                    beat: 0.0,
                    bpm: 120.0,
                },
                TempoChange {
                    beat: 2.0,
                    bpm: 60.0,
                },
            ],
            &[Pause {
                beat: 2.0,
                seconds: 0.5,
            }],
        );
        // Tempo applies first, so the resume event carries the new bpm.
        assert_eq!(
            events,
            vec![
                TempoEvent {
                    time: 0.0,
                    bpm: 120.0
                },
                TempoEvent {
                    time: 1.0,
                    bpm: 60.0
                },
                TempoEvent {
                    time: 1.0,
                    bpm: 0.0
                },
                TempoEvent {
                    time: 1.5,
                    bpm: 60.0
                },
            ]
        );
        // Past the pause, the new tempo is in force.
        assert_eq!(map.time_at_beat(3.0), 2.5);
    }

    #[test]
    fn unordered_directives_are_sorted() {
        let (map, _) = BeatTimeMap::build(
            &[
                TempoChange {
                    beat: 4.0,
                    bpm: 240.0,
                },
                TempoChange {
                    beat: 0.0,
                    bpm: 120.0,
                },
            ],
            &[],
        );
        assert_eq!(map.time_at_beat(6.0), 2.5);
    }
}
