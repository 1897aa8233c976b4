use engine_library::analysis::normalize_beatgrid;
use engine_library::model::standard_pad_colors;
use engine_library::{
    create_temporary_database, BeatgridMarker, HotCue, Loop, MusicalKey, Schema,
    TrackSnapshot, WaveformEntry, ALL_SCHEMAS,
};

const SAMPLE_COUNT: u64 = 16_140_600;
const SAMPLE_RATE: f64 = 44100.0;

/// The reference track used across the round-trip scenarios.
fn reference_snapshot() -> TrackSnapshot {
    let mut snapshot = TrackSnapshot {
        album: Some("Some Album".to_string()),
        artist: Some("Some Artist".to_string()),
        comment: Some("Comment".to_string()),
        composer: Some("Composer".to_string()),
        genre: Some("Techno".to_string()),
        publisher: Some("Some Label".to_string()),
        title: Some("Some Track".to_string()),
        bitrate: Some(320),
        bpm: Some(120),
        track_number: Some(1),
        year: Some(2021),
        rating: Some(60),
        duration_ms: Some(366_000),
        file_bytes: Some(14_641_932),
        key: Some(MusicalKey::AMinor),
        relative_path: Some("../01 - Some Artist - Some Track.mp3".to_string()),
        sample_count: Some(SAMPLE_COUNT),
        sample_rate: Some(SAMPLE_RATE),
        average_loudness: Some(0.5),
        beatgrid: vec![
            BeatgridMarker {
                index: -4,
                sample_offset: -83316.78,
            },
            BeatgridMarker {
                index: 812,
                sample_offset: 17_470_734.439,
            },
        ],
        main_cue: Some(2_732_094.0),
        ..TrackSnapshot::default()
    };
    snapshot.hot_cues[0] = Some(HotCue {
        label: "Cue 1".to_string(),
        sample_offset: 1_377_924.5,
        color: standard_pad_colors::PAD_1,
    });
    snapshot.loops[0] = Some(Loop {
        label: "Loop 1".to_string(),
        start_sample_offset: 1144.012,
        end_sample_offset: 345_339.134,
        color: standard_pad_colors::PAD_1,
    });
    snapshot.waveform = (0..1024)
        .map(|i| WaveformEntry::opaque((i % 256) as u8, (i % 101) as u8, (i % 31) as u8))
        .collect();
    snapshot
}

/// What the snapshot should look like after a write/read cycle: identical
/// up to beat-grid normalization.
fn expected_snapshot() -> TrackSnapshot {
    let mut expected = reference_snapshot();
    expected.beatgrid =
        normalize_beatgrid(expected.beatgrid.clone(), SAMPLE_COUNT).unwrap();
    expected
}

#[test]
fn test_round_trip_latest_v2() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let track = db.create_track(&reference_snapshot()).unwrap();

    let read_back = track.snapshot().unwrap();
    assert_eq!(read_back, expected_snapshot());
}

#[test]
fn test_round_trip_every_schema() {
    for schema in ALL_SCHEMAS {
        let db = create_temporary_database(schema).unwrap();
        let track = db.create_track(&reference_snapshot()).unwrap();

        let read_back = track.snapshot().unwrap();
        assert_eq!(read_back, expected_snapshot(), "snapshot mismatch on {schema}");

        db.verify()
            .unwrap_or_else(|e| panic!("verify failed on {schema}: {e}"));
    }
}

#[test]
fn test_update_clears_missing_fields() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let track = db.create_track(&reference_snapshot()).unwrap();

    // Replay a sparse snapshot over the full one
    let sparse = TrackSnapshot {
        title: Some("Renamed".to_string()),
        relative_path: Some("renamed.mp3".to_string()),
        ..TrackSnapshot::default()
    };
    track.update(&sparse).unwrap();

    let read_back = track.snapshot().unwrap();
    assert_eq!(read_back.title.as_deref(), Some("Renamed"));
    assert_eq!(read_back.artist, None);
    assert_eq!(read_back.rating, None);
    assert_eq!(read_back.key, None);
    assert!(read_back.beatgrid.is_empty());
    assert!(read_back.hot_cues.iter().all(Option::is_none));
}

#[test]
fn test_snapshot_survives_cross_schema_replay() {
    // A snapshot taken from a v1 database is replayed into a v3 database
    let v1 = create_temporary_database(Schema::V1_18_0Os).unwrap();
    let source = v1.create_track(&reference_snapshot()).unwrap();
    let detached = source.snapshot().unwrap();

    let v3 = create_temporary_database(Schema::V3_0_0).unwrap();
    let replayed = v3.create_track(&detached).unwrap();
    assert_eq!(replayed.snapshot().unwrap(), expected_snapshot());
}

#[test]
fn test_track_lookup_by_relative_path() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let track = db.create_track(&reference_snapshot()).unwrap();

    let found = db
        .tracks_by_relative_path("../01 - Some Artist - Some Track.mp3")
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), track.id());
    assert!(db.tracks_by_relative_path("missing.mp3").unwrap().is_empty());
}

#[test]
fn test_removed_track_handle_is_invalid() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let track = db.create_track(&reference_snapshot()).unwrap();
    let stale = track.clone();

    db.remove_track(track).unwrap();
    assert!(!stale.is_valid().unwrap());
    assert!(matches!(
        stale.snapshot(),
        Err(engine_library::Error::TrackDeleted { .. })
    ));
}

#[test]
fn test_invalid_rating_is_rejected() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let mut snapshot = reference_snapshot();
    snapshot.rating = Some(250);
    assert!(matches!(
        db.create_track(&snapshot),
        Err(engine_library::Error::InvalidTrackSnapshot(_))
    ));
    // The failed insert must leave nothing behind
    assert!(db.tracks().unwrap().is_empty());
}

#[test]
fn test_beatgrid_with_single_marker_is_rejected() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let mut snapshot = reference_snapshot();
    snapshot.beatgrid = vec![BeatgridMarker {
        index: 0,
        sample_offset: 1000.0,
    }];
    assert!(matches!(
        db.create_track(&snapshot),
        Err(engine_library::Error::InvalidBeatgrid(_))
    ));
}
