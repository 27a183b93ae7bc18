use notechart::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn taps_and_inline_tempo_change() {
    // Measure 0 holds a tap on its first slot and a tempo change to
    // 0xF0 = 240 bpm halfway through; measure 1 opens with a scratch.
    const SRC: &str = "\
#TITLE Sample
#ARTIST Someone
#BPM 120

#00011:01000000
#00003:0000F000
#00116:01
";

    let output = notechart::bms::parse(SRC).expect("chart");
    assert_eq!(output.warnings, vec![]);

    let chart = &output.chart;
    assert_eq!(chart.bpm, 120.0);
    assert_eq!(chart.offset, 0.0);
    assert_eq!(chart.lane_count, 8);
    assert_eq!(chart.title.as_deref(), Some("Sample"));
    assert_eq!(chart.artist.as_deref(), Some("Someone"));
    assert_eq!(chart.tempo_events, vec![
        TempoEvent {
            time: 0.0,
            bpm: 120.0
        },
        TempoEvent {
            time: 1.0,
            bpm: 240.0
        },
    ]);

    // Half a measure at 120 bpm (1.0s) plus half at 240 bpm (0.5s)
    // puts the start of measure 1 at 1.5s.
    assert_eq!(chart.notes[DEFAULT_DIFFICULTY], vec![
        Note {
            time: 0.0,
            lane: 1,
            duration: 0.0
        },
        Note {
            time: 1.5,
            lane: 0,
            duration: 0.0
        },
    ]);
}

#[test]
fn measure_length_factor_scales_time() {
    const SRC: &str = "\
#BPM 120
#00002:0.5
#00011:01
#00111:01
";

    let output = notechart::bms::parse(SRC).expect("chart");
    assert_eq!(output.warnings, vec![]);

    // Measure 0 is squeezed to two beats, so measure 1 starts after
    // one second instead of two.
    let notes = &output.chart.notes[DEFAULT_DIFFICULTY];
    assert_eq!(notes[0].time, 0.0);
    assert_eq!(notes[1].time, 1.0);
}

#[test]
fn tempo_definition_reference() {
    // Channel 08 swaps in the #BPM01 definition halfway through the
    // measure, before the second tap on the same slot is timed.
    const SRC: &str = "\
#BPM 60
#BPM01 240
#00008:0001
#00011:0101
";

    let output = notechart::bms::parse(SRC).expect("chart");
    assert_eq!(output.warnings, vec![]);

    let chart = &output.chart;
    assert_eq!(chart.tempo_events, vec![
        TempoEvent {
            time: 0.0,
            bpm: 60.0
        },
        TempoEvent {
            time: 2.0,
            bpm: 240.0
        },
    ]);
    assert_eq!(chart.notes[DEFAULT_DIFFICULTY], vec![
        Note {
            time: 0.0,
            lane: 1,
            duration: 0.0
        },
        Note {
            time: 2.0,
            lane: 1,
            duration: 0.0
        },
    ]);
}

#[test]
fn unknown_tempo_reference_is_reported() {
    const SRC: &str = "\
#BPM 120
#00008:0A
#00011:01
";

    let output = notechart::bms::parse(SRC).expect("chart");
    assert_eq!(output.warnings, vec![BmsWarning::UnknownTempoRef {
        measure: 0,
        id: "0A".into(),
    }]);
    // Tempo unchanged, note timing unaffected.
    assert_eq!(output.chart.notes[DEFAULT_DIFFICULTY][0].time, 0.0);
}

#[test]
fn missing_tempo_header_falls_back() {
    const SRC: &str = "#00011:01\n";

    let output = notechart::bms::parse(SRC).expect("chart");
    assert!(output.warnings.contains(&BmsWarning::MissingTempo));
    assert_eq!(output.chart.bpm, DEFAULT_BPM);
}

#[test]
fn keys_only_layout_drops_scratch_notes() {
    const SRC: &str = "\
#BPM 120
#00016:01
#00011:0001
";

    let output = notechart::bms::parse_with_layout(SRC, KeyLayout::Beat7).expect("chart");
    let chart = &output.chart;
    assert_eq!(chart.lane_count, 7);
    // The scratch object on channel 16 is gone; only the key remains.
    assert_eq!(chart.notes[DEFAULT_DIFFICULTY], vec![Note {
        time: 1.0,
        lane: 0,
        duration: 0.0,
    }]);
}

#[test]
fn gap_measures_advance_the_clock() {
    const SRC: &str = "\
#BPM 120
#00011:01
#00311:01
";

    let output = notechart::bms::parse(SRC).expect("chart");
    let notes = &output.chart.notes[DEFAULT_DIFFICULTY];
    // Measures 1 and 2 are silent but still two seconds each.
    assert_eq!(notes[1].time, 6.0);
}

#[test]
fn shift_jis_source_decodes() {
    // "#TITLE テスト" in Shift_JIS, followed by ASCII chart data.
    let mut bytes: Vec<u8> = Vec::new();
    bytes.extend_from_slice(b"#TITLE \x83\x65\x83\x58\x83\x67\n");
    bytes.extend_from_slice(b"#BPM 120\n#00011:01\n");

    let source = decode_shift_jis(&bytes);
    let output = notechart::bms::parse(&source).expect("chart");
    assert_eq!(output.chart.title.as_deref(), Some("テスト"));
}
