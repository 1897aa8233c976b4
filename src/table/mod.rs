//! Schema-specific row layer
//!
//! Each schema family provides an implementation of [`TableLayer`]
//! translating between native rows and the unified model: the v1 layer
//! speaks the split m.db/p.db shape with its type-keyed metadata rows, the
//! v2 layer the single-database shape with flat columns (and, for v3, the
//! split-out `PerformanceData` table). Everything above this module is
//! schema-agnostic.

pub(crate) mod v1;
pub(crate) mod v2;

use std::rc::Rc;

use crate::analysis::{
    high_resolution_waveform_extents, normalize_beatgrid, overview_from_waveform,
    overview_waveform_extents,
};
use crate::codec::{
    BeatDataBlob, HighResWaveformBlob, LoopBlob, LoopsBlob, OverviewWaveformBlob,
    QuickCuesBlob, TrackDataBlob,
};
use crate::error::{Error, Result};
use crate::model::{Loop, MusicalKey, TrackSnapshot};
use crate::schema::Schema;
use crate::store::Storage;

/// The single row of the `Information` table.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationRow {
    /// Auto-generated id column.
    pub id: i64,

    /// UUID of the database.
    pub uuid: String,

    /// Major part of the schema version.
    pub schema_version_major: i64,

    /// Minor part of the schema version.
    pub schema_version_minor: i64,

    /// Patch part of the schema version.
    pub schema_version_patch: i64,

    /// Played indicator of the most recently played track.
    pub current_played_indicator: i64,

    /// Read counter of the last Rekordbox library import.
    pub last_rekord_box_library_import_read_counter: i64,
}

/// Row-level operations each schema family implements.
///
/// Mutating operations are expected to be wrapped in a save-point by the
/// caller; implementations may open nested save-points of their own.
pub(crate) trait TableLayer {
    /// Backing store.
    fn storage(&self) -> &Rc<Storage>;

    // -- Information ----------------------------------------------------

    /// Read the information row, insisting on exactly one.
    fn information(&self) -> Result<InformationRow>;

    /// Write the information row(s) of a freshly created database.
    fn write_information(&self, uuid: &str) -> Result<()>;

    /// Update the current played indicator.
    fn update_current_played_indicator(&self, played_indicator: i64) -> Result<()>;

    // -- Crates / playlists ---------------------------------------------

    /// Ids of all crates, id-ordered.
    fn list_crates(&self) -> Result<Vec<i64>>;

    /// Ids of crates with no parent, in stable sibling order.
    fn root_crates(&self) -> Result<Vec<i64>>;

    /// Whether the crate row still exists.
    fn crate_exists(&self, id: i64) -> Result<bool>;

    /// Ids of all crates with the given name.
    fn crates_by_name(&self, name: &str) -> Result<Vec<i64>>;

    /// Name of a crate.
    fn crate_name(&self, id: i64) -> Result<String>;

    /// Parent of a crate, or `None` at the root.
    fn crate_parent(&self, id: i64) -> Result<Option<i64>>;

    /// Immediate children of a crate, in stable sibling order.
    fn crate_children(&self, id: i64) -> Result<Vec<i64>>;

    /// Create a crate at the root level, appended to its siblings.
    fn create_root_crate(&self, name: &str) -> Result<i64>;

    /// Create a crate at the root level, ordered directly after the given
    /// sibling.
    fn create_root_crate_after(&self, name: &str, after: i64) -> Result<i64>;

    /// Create a crate under a parent, appended to its siblings.
    fn create_sub_crate(&self, parent: i64, name: &str) -> Result<i64>;

    /// Create a crate under a parent, ordered directly after the given
    /// sibling.
    fn create_sub_crate_after(&self, parent: i64, name: &str, after: i64) -> Result<i64>;

    /// Rename a crate, enforcing sibling-name uniqueness.
    fn set_crate_name(&self, id: i64, name: &str) -> Result<()>;

    /// Reparent a crate (`None` moves it to the root), enforcing
    /// acyclicity.
    fn set_crate_parent(&self, id: i64, parent: Option<i64>) -> Result<()>;

    /// Remove a crate and its sub-crates.
    fn remove_crate(&self, id: i64) -> Result<()>;

    /// Ids of the tracks in a crate, in crate order.
    fn crate_tracks(&self, id: i64) -> Result<Vec<i64>>;

    /// Add a track to a crate. Duplicate additions are silently ignored
    /// unless `throw_if_duplicate` is set.
    fn add_track_to_crate(
        &self,
        crate_id: i64,
        track_id: i64,
        throw_if_duplicate: bool,
    ) -> Result<()>;

    /// Remove a track from a crate.
    fn remove_track_from_crate(&self, crate_id: i64, track_id: i64) -> Result<()>;

    /// Remove every track from a crate.
    fn clear_crate_tracks(&self, id: i64) -> Result<()>;

    // -- Tracks ----------------------------------------------------------

    /// Ids of all tracks, id-ordered.
    fn list_tracks(&self) -> Result<Vec<i64>>;

    /// Whether the track row still exists.
    fn track_exists(&self, id: i64) -> Result<bool>;

    /// Ids of all tracks bound to the given relative path.
    fn tracks_by_relative_path(&self, relative_path: &str) -> Result<Vec<i64>>;

    /// Insert a track from a snapshot, returning the assigned id.
    fn create_track(&self, snapshot: &TrackSnapshot) -> Result<i64>;

    /// Materialise a snapshot of a track, decoding every BLOB.
    fn track_snapshot(&self, id: i64) -> Result<TrackSnapshot>;

    /// Replace a track row and all its BLOBs from a snapshot.
    fn update_track(&self, id: i64, snapshot: &TrackSnapshot) -> Result<()>;

    /// Remove a track, cascading to crate membership and performance
    /// rows.
    fn remove_track(&self, id: i64) -> Result<()>;
}

/// Build the table layer matching a schema.
pub(crate) fn make_table_layer(
    schema: Schema,
    storage: Rc<Storage>,
) -> Box<dyn TableLayer> {
    if schema.is_v2_like() {
        Box::new(v2::V2Layer::new(schema, storage))
    } else {
        Box::new(v1::V1Layer::new(schema, storage))
    }
}

/// The analysis BLOBs of one track, in encoded form.
pub(crate) struct EncodedPerformanceData {
    pub track_data: Vec<u8>,
    pub overview_waveform_data: Vec<u8>,
    /// Only persisted by v1 schemas.
    pub high_res_waveform_data: Option<Vec<u8>>,
    pub beat_data: Vec<u8>,
    pub quick_cues: Vec<u8>,
    pub loops: Vec<u8>,
}

/// Validate a snapshot and encode its analysis BLOBs.
///
/// The beat grid is normalized here, so what is persisted always carries
/// the conventional anchors at beat -4 and one beat past the end of the
/// track. Every BLOB is checked to survive a decode round-trip before it
/// is handed to the backend.
pub(crate) fn encode_performance_data(
    snapshot: &TrackSnapshot,
    schema: Schema,
) -> Result<EncodedPerformanceData> {
    if let Some(rating) = snapshot.rating {
        if !(0..=100).contains(&rating) {
            return Err(Error::InvalidTrackSnapshot(format!(
                "rating {rating} is outside 0..=100"
            )));
        }
    }
    if let Some(loudness) = snapshot.average_loudness {
        if !(loudness > 0.0 && loudness <= 1.0) {
            return Err(Error::InvalidTrackSnapshot(format!(
                "average loudness {loudness} is outside (0, 1]"
            )));
        }
    }
    if !snapshot.beatgrid.is_empty()
        && (snapshot.sample_count.is_none() || snapshot.sample_rate.is_none())
    {
        return Err(Error::InvalidTrackSnapshot(
            "a beat grid requires sample count and sample rate".into(),
        ));
    }

    let sample_rate = snapshot.sample_rate.unwrap_or(0.0);
    let sample_count = snapshot.sample_count.unwrap_or(0);

    let track_data = TrackDataBlob {
        sample_rate,
        sample_count: sample_count as i64,
        average_loudness: snapshot.average_loudness.unwrap_or(0.0),
        key: snapshot.key.map_or(0, MusicalKey::to_ordinal),
    };

    let grid = normalize_beatgrid(snapshot.beatgrid.clone(), sample_count)?;
    let beat_data = BeatDataBlob {
        sample_rate,
        sample_count: sample_count as f64,
        is_beatgrid_set: 1,
        default_grid: grid.clone(),
        adjusted_grid: grid,
    };

    let main_cue = snapshot.main_cue.unwrap_or(0.0);
    let quick_cues = QuickCuesBlob {
        hot_cues: snapshot.hot_cues.clone(),
        adjusted_main_cue: main_cue,
        is_main_cue_adjusted: false,
        default_main_cue: main_cue,
        extra_data: Vec::new(),
    };

    let mut loops = LoopsBlob::default();
    for (slot, source) in loops.loops.iter_mut().zip(&snapshot.loops) {
        if let Some(lp) = source {
            *slot = Some(LoopBlob {
                label: lp.label.clone(),
                start_sample_offset: lp.start_sample_offset,
                end_sample_offset: lp.end_sample_offset,
                is_start_set: true,
                is_end_set: true,
                color: lp.color,
            });
        }
    }

    let overview_extents = overview_waveform_extents(sample_count, sample_rate);
    let overview = OverviewWaveformBlob {
        samples_per_entry: overview_extents.samples_per_entry,
        waveform: if snapshot.waveform.is_empty() {
            Vec::new()
        } else {
            overview_from_waveform(&snapshot.waveform)
        },
    };

    let high_res = if schema.is_v2_like() {
        None
    } else {
        let extents = high_resolution_waveform_extents(sample_count, sample_rate);
        Some(HighResWaveformBlob {
            samples_per_entry: extents.samples_per_entry,
            waveform: snapshot.waveform.clone(),
        })
    };

    Ok(EncodedPerformanceData {
        track_data: crate::codec::encode_checked(&track_data, "trackData")?,
        overview_waveform_data: crate::codec::encode_checked(
            &overview,
            "overviewWaveFormData",
        )?,
        high_res_waveform_data: high_res
            .map(|blob| crate::codec::encode_checked(&blob, "highResolutionWaveFormData"))
            .transpose()?,
        beat_data: crate::codec::encode_checked(&beat_data, "beatData")?,
        quick_cues: crate::codec::encode_checked(&quick_cues, "quickCues")?,
        loops: crate::codec::encode_checked(&loops, "loops")?,
    })
}

/// Fold decoded analysis BLOBs back into a snapshot.
pub(crate) fn apply_performance_data(
    snapshot: &mut TrackSnapshot,
    track_data: &TrackDataBlob,
    beat_data: &BeatDataBlob,
    quick_cues: &QuickCuesBlob,
    loops: &LoopsBlob,
    waveform: Vec<crate::model::WaveformEntry>,
) {
    if track_data.sample_rate != 0.0 {
        snapshot.sample_rate = Some(track_data.sample_rate);
        snapshot.sample_count = Some(track_data.sample_count as u64);
    }
    if track_data.average_loudness != 0.0 {
        snapshot.average_loudness = Some(track_data.average_loudness);
    }
    if snapshot.key.is_none() {
        snapshot.key = MusicalKey::from_ordinal(track_data.key);
    }

    snapshot.beatgrid = if beat_data.adjusted_grid.is_empty() {
        beat_data.default_grid.clone()
    } else {
        beat_data.adjusted_grid.clone()
    };

    snapshot.hot_cues = quick_cues.hot_cues.clone();
    let main_cue = if quick_cues.is_main_cue_adjusted {
        quick_cues.adjusted_main_cue
    } else {
        quick_cues.default_main_cue
    };
    snapshot.main_cue = (main_cue != 0.0).then_some(main_cue);

    for (slot, source) in snapshot.loops.iter_mut().zip(&loops.loops) {
        *slot = source.as_ref().and_then(|lp| {
            (lp.is_start_set && lp.is_end_set).then(|| Loop {
                label: lp.label.clone(),
                start_sample_offset: lp.start_sample_offset,
                end_sample_offset: lp.end_sample_offset,
                color: lp.color,
            })
        });
    }

    snapshot.waveform = waveform;
}

/// Render a duration in the `M:SS` form used by the v1 metadata tables.
pub(crate) fn format_duration_mm_ss(duration_secs: i64) -> String {
    format!("{}:{:02}", duration_secs / 60, duration_secs % 60)
}

/// Read the single information row of an attachment, insisting on exactly
/// one.
pub(crate) fn read_information_row(
    storage: &Storage,
    attachment: &str,
) -> Result<InformationRow> {
    let mut rows = storage.query_rows(
        &format!(
            "SELECT id, uuid, schemaVersionMajor, schemaVersionMinor, \
             schemaVersionPatch, currentPlayedIndicator, \
             lastRekordBoxLibraryImportReadCounter FROM {attachment}.Information"
        ),
        [],
        |row| {
            Ok(InformationRow {
                id: row.get(0)?,
                uuid: row.get(1)?,
                schema_version_major: row.get(2)?,
                schema_version_minor: row.get(3)?,
                schema_version_patch: row.get(4)?,
                current_played_indicator: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                last_rekord_box_library_import_read_counter: row
                    .get::<_, Option<i64>>(6)?
                    .unwrap_or(0),
            })
        },
    )?;
    if rows.len() != 1 {
        return Err(Error::DatabaseInconsistency(format!(
            "Information table has {} rows, expected exactly 1",
            rows.len()
        )));
    }
    Ok(rows.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BeatgridMarker;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_mm_ss(0), "0:00");
        assert_eq!(format_duration_mm_ss(59), "0:59");
        assert_eq!(format_duration_mm_ss(125), "2:05");
        assert_eq!(format_duration_mm_ss(3661), "61:01");
    }

    #[test]
    fn test_rating_out_of_range_is_rejected() {
        let snapshot = TrackSnapshot {
            rating: Some(101),
            ..TrackSnapshot::default()
        };
        assert!(matches!(
            encode_performance_data(&snapshot, Schema::V2_21_2),
            Err(Error::InvalidTrackSnapshot(_))
        ));
    }

    #[test]
    fn test_loudness_out_of_range_is_rejected() {
        let snapshot = TrackSnapshot {
            average_loudness: Some(1.5),
            ..TrackSnapshot::default()
        };
        assert!(matches!(
            encode_performance_data(&snapshot, Schema::V2_21_2),
            Err(Error::InvalidTrackSnapshot(_))
        ));
    }

    #[test]
    fn test_beatgrid_without_sampling_is_rejected() {
        let snapshot = TrackSnapshot {
            beatgrid: vec![
                BeatgridMarker {
                    index: 0,
                    sample_offset: 0.0,
                },
                BeatgridMarker {
                    index: 4,
                    sample_offset: 88_200.0,
                },
            ],
            ..TrackSnapshot::default()
        };
        assert!(matches!(
            encode_performance_data(&snapshot, Schema::V2_21_2),
            Err(Error::InvalidTrackSnapshot(_))
        ));
    }

    #[test]
    fn test_v1_encodes_high_res_waveform() {
        let snapshot = TrackSnapshot {
            sample_rate: Some(44100.0),
            sample_count: Some(441_000),
            ..TrackSnapshot::default()
        };
        let v1 = encode_performance_data(&snapshot, Schema::V1_18_0Os).unwrap();
        assert!(v1.high_res_waveform_data.is_some());
        let v2 = encode_performance_data(&snapshot, Schema::V2_21_2).unwrap();
        assert!(v2.high_res_waveform_data.is_none());
    }
}
