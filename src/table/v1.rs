//! Row layer for the v1 (split m.db/p.db) schemas
//!
//! Track metadata is split across the `Track` table and two type-keyed
//! side tables (`MetaData` for strings, `MetaDataInteger` for integers);
//! the crate hierarchy is tracked in `CrateParentList` (every crate has a
//! row, a root crate is its own parent) plus the transitive closure in
//! `CrateHierarchy`, and the `Crate.path` column is derived from the chain
//! of titles. Analysis BLOBs live in the attached performance database,
//! one `PerformanceData` row per track.

use std::rc::Rc;

use chrono::{TimeZone, Utc};
use rusqlite::types::Value;

use super::{
    apply_performance_data, encode_performance_data, format_duration_mm_ss,
    InformationRow, TableLayer,
};
use crate::codec::{
    BeatDataBlob, Blob, HighResWaveformBlob, LoopsBlob, QuickCuesBlob, TrackDataBlob,
};
use crate::error::{Error, Result};
use crate::model::TrackSnapshot;
use crate::schema::Schema;
use crate::store::Storage;

/// Type keys of the string metadata rows.
#[derive(Debug, Clone, Copy)]
#[repr(i64)]
enum StringMeta {
    Title = 1,
    Artist = 2,
    Album = 3,
    Genre = 4,
    Comment = 5,
    Publisher = 6,
    Composer = 7,
    DurationMmSs = 10,
    EverPlayed = 12,
    FileExtension = 13,
}

/// Type keys of the integer metadata rows.
#[derive(Debug, Clone, Copy)]
#[repr(i64)]
enum IntMeta {
    LastPlayedTs = 1,
    LastModifiedTs = 2,
    LastAccessedTs = 3,
    MusicalKey = 4,
    Rating = 5,
    FileBytes = 6,
    Hash = 10,
}

pub(crate) struct V1Layer {
    schema: Schema,
    storage: Rc<Storage>,
}

impl V1Layer {
    pub fn new(schema: Schema, storage: Rc<Storage>) -> Self {
        Self { schema, storage }
    }

    fn get_meta_str(&self, id: i64, key: StringMeta) -> Result<Option<String>> {
        Ok(self
            .storage
            .query_unique_opt(
                "SELECT text FROM music.MetaData WHERE id = ?1 AND type = ?2",
                [id, key as i64],
                "MetaData entry",
                |row| row.get::<_, Option<String>>(0),
            )?
            .flatten())
    }

    fn set_meta_str(&self, id: i64, key: StringMeta, text: Option<&str>) -> Result<()> {
        self.storage.execute(
            "REPLACE INTO music.MetaData (id, type, text) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, key as i64, text],
        )?;
        Ok(())
    }

    fn get_meta_int(&self, id: i64, key: IntMeta) -> Result<Option<i64>> {
        Ok(self
            .storage
            .query_unique_opt(
                "SELECT value FROM music.MetaDataInteger WHERE id = ?1 AND type = ?2",
                [id, key as i64],
                "MetaDataInteger entry",
                |row| row.get::<_, Option<i64>>(0),
            )?
            .flatten())
    }

    fn set_meta_int(&self, id: i64, key: IntMeta, value: Option<i64>) -> Result<()> {
        self.storage.execute(
            "REPLACE INTO music.MetaDataInteger (id, type, value) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, key as i64, value],
        )?;
        Ok(())
    }

    fn assert_crate_exists(&self, id: i64) -> Result<()> {
        if self.crate_exists(id)? {
            Ok(())
        } else {
            Err(Error::CrateDeleted { id })
        }
    }

    fn assert_track_exists(&self, id: i64) -> Result<()> {
        if self.track_exists(id)? {
            Ok(())
        } else {
            Err(Error::TrackDeleted { id })
        }
    }

    /// Enforce that no sibling under `parent` (or at the root) uses the
    /// name, excluding `exclude` itself during renames.
    fn assert_sibling_name_free(
        &self,
        parent: Option<i64>,
        name: &str,
        exclude: Option<i64>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::CrateInvalidName("crate names must not be empty".into()));
        }
        let siblings = match parent {
            Some(parent) => self.crate_children(parent)?,
            None => self.root_crates()?,
        };
        for sibling in siblings {
            if Some(sibling) == exclude {
                continue;
            }
            if self.crate_name(sibling)? == name {
                return Err(Error::CrateInvalidName(format!(
                    "a sibling crate named '{name}' already exists"
                )));
            }
        }
        Ok(())
    }

    /// Path of a crate, e.g. `Grandparent;Parent;Self;`.
    fn crate_path(&self, id: i64) -> Result<String> {
        self.storage
            .query_unique_opt(
                "SELECT path FROM music.Crate WHERE id = ?1",
                [id],
                "Crate row",
                |row| row.get::<_, String>(0),
            )?
            .ok_or(Error::CrateDeleted { id })
    }

    /// Insert the `Crate`, `CrateParentList` and `CrateHierarchy` rows of
    /// a new crate.
    fn insert_crate(&self, name: &str, parent: Option<i64>) -> Result<i64> {
        let parent_path = match parent {
            Some(parent) => self.crate_path(parent)?,
            None => String::new(),
        };
        self.storage.execute(
            "INSERT INTO music.Crate (title, path) VALUES (?1, ?2)",
            rusqlite::params![name, format!("{parent_path}{name};")],
        )?;
        let id = self.storage.last_insert_rowid();

        self.storage.execute(
            "INSERT INTO music.CrateParentList (crateOriginId, crateParentId) \
             VALUES (?1, ?2)",
            [id, parent.unwrap_or(id)],
        )?;
        if let Some(parent) = parent {
            // Ancestors of the parent, plus the parent itself
            self.storage.execute(
                "INSERT INTO music.CrateHierarchy (crateId, crateIdChild) \
                 SELECT crateId, ?1 FROM music.CrateHierarchy WHERE crateIdChild = ?2 \
                 UNION ALL SELECT ?2, ?1",
                [id, parent],
            )?;
        }
        Ok(id)
    }

    /// Recompute the derived path and hierarchy closure of a crate and
    /// every crate below it.
    fn rebuild_derived_rows(&self, id: i64) -> Result<()> {
        let parent = self.crate_parent(id)?;
        let parent_path = match parent {
            Some(parent) => self.crate_path(parent)?,
            None => String::new(),
        };
        let name = self.crate_name(id)?;
        self.storage.execute(
            "UPDATE music.Crate SET path = ?1 WHERE id = ?2",
            rusqlite::params![format!("{parent_path}{name};"), id],
        )?;

        self.storage.execute(
            "DELETE FROM music.CrateHierarchy WHERE crateIdChild = ?1",
            [id],
        )?;
        if let Some(parent) = parent {
            self.storage.execute(
                "INSERT INTO music.CrateHierarchy (crateId, crateIdChild) \
                 SELECT crateId, ?1 FROM music.CrateHierarchy WHERE crateIdChild = ?2 \
                 UNION ALL SELECT ?2, ?1",
                [id, parent],
            )?;
        }

        for child in self.crate_children(id)? {
            self.rebuild_derived_rows(child)?;
        }
        Ok(())
    }

    /// Read a column set from the `Track` row, failing with
    /// `track-deleted` when the row is gone.
    fn track_row(&self, id: i64) -> Result<TrackRow> {
        self.storage
            .query_unique_opt(
                "SELECT playOrder, length, bpm, year, path, bitrate \
                 FROM music.Track WHERE id = ?1",
                [id],
                "Track row",
                |row| {
                    Ok(TrackRow {
                        play_order: row.get(0)?,
                        length: row.get(1)?,
                        bpm: row.get(2)?,
                        year: row.get(3)?,
                        path: row.get(4)?,
                        bitrate: row.get(5)?,
                    })
                },
            )?
            .ok_or(Error::TrackDeleted { id })
    }

    /// Write every metadata row derived from a snapshot. Missing optional
    /// fields clear the corresponding rows.
    fn write_metadata(&self, id: i64, snapshot: &TrackSnapshot) -> Result<()> {
        self.set_meta_str(id, StringMeta::Title, snapshot.title.as_deref())?;
        self.set_meta_str(id, StringMeta::Artist, snapshot.artist.as_deref())?;
        self.set_meta_str(id, StringMeta::Album, snapshot.album.as_deref())?;
        self.set_meta_str(id, StringMeta::Genre, snapshot.genre.as_deref())?;
        self.set_meta_str(id, StringMeta::Comment, snapshot.comment.as_deref())?;
        self.set_meta_str(id, StringMeta::Publisher, snapshot.publisher.as_deref())?;
        self.set_meta_str(id, StringMeta::Composer, snapshot.composer.as_deref())?;
        let duration = snapshot
            .duration_ms
            .map(|ms| format_duration_mm_ss(ms / 1000));
        self.set_meta_str(id, StringMeta::DurationMmSs, duration.as_deref())?;
        let ever_played = if snapshot.last_played_at.is_some() { "1" } else { "0" };
        self.set_meta_str(id, StringMeta::EverPlayed, Some(ever_played))?;
        self.set_meta_str(id, StringMeta::FileExtension, snapshot.file_extension())?;

        self.set_meta_int(
            id,
            IntMeta::LastPlayedTs,
            snapshot.last_played_at.map(|at| at.timestamp()),
        )?;
        self.set_meta_int(id, IntMeta::LastModifiedTs, None)?;
        self.set_meta_int(id, IntMeta::LastAccessedTs, None)?;
        self.set_meta_int(
            id,
            IntMeta::MusicalKey,
            snapshot.key.map(|key| key.to_ordinal() as i64),
        )?;
        self.set_meta_int(id, IntMeta::Rating, snapshot.rating)?;
        self.set_meta_int(
            id,
            IntMeta::FileBytes,
            snapshot.file_bytes.map(|bytes| bytes as i64),
        )?;
        self.set_meta_int(id, IntMeta::Hash, None)?;
        Ok(())
    }

    /// Write the performance row of a track, replacing any existing one.
    fn write_performance_row(&self, id: i64, snapshot: &TrackSnapshot) -> Result<()> {
        let encoded = encode_performance_data(snapshot, self.schema)?;
        let mut columns = vec![
            ("id", Value::Integer(id)),
            ("isAnalyzed", Value::Integer(1)),
            ("isRendered", Value::Integer(0)),
            ("trackData", Value::Blob(encoded.track_data)),
            (
                "highResolutionWaveFormData",
                Value::Blob(encoded.high_res_waveform_data.unwrap_or_default()),
            ),
            (
                "overviewWaveFormData",
                Value::Blob(encoded.overview_waveform_data),
            ),
            ("beatData", Value::Blob(encoded.beat_data)),
            ("quickCues", Value::Blob(encoded.quick_cues)),
            ("loops", Value::Blob(encoded.loops)),
            ("hasSeratoValues", Value::Integer(0)),
        ];
        if self.schema >= Schema::V1_7_1 {
            columns.push(("hasRekordboxValues", Value::Integer(0)));
        }

        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> =
            (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "REPLACE INTO perfdata.PerformanceData ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        );
        self.storage.execute(
            &sql,
            rusqlite::params_from_iter(columns.into_iter().map(|(_, value)| value)),
        )?;
        Ok(())
    }

    /// Decode the performance row of a track into an existing snapshot.
    fn read_performance_row(&self, id: i64, snapshot: &mut TrackSnapshot) -> Result<()> {
        let blobs = self.storage.query_unique_opt(
            "SELECT trackData, highResolutionWaveFormData, beatData, quickCues, loops \
             FROM perfdata.PerformanceData WHERE id = ?1",
            [id],
            "PerformanceData row",
            |row| {
                Ok((
                    row.get::<_, Option<Vec<u8>>>(0)?,
                    row.get::<_, Option<Vec<u8>>>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                    row.get::<_, Option<Vec<u8>>>(3)?,
                    row.get::<_, Option<Vec<u8>>>(4)?,
                ))
            },
        )?;
        let Some((track_data, high_res, beat_data, quick_cues, loops)) = blobs else {
            return Ok(());
        };

        let track_data = decode_or_default::<TrackDataBlob>(track_data)?;
        let high_res = decode_or_default::<HighResWaveformBlob>(high_res)?;
        let beat_data = decode_or_default::<BeatDataBlob>(beat_data)?;
        let quick_cues = decode_or_default::<QuickCuesBlob>(quick_cues)?;
        let loops = decode_or_default::<LoopsBlob>(loops)?;
        apply_performance_data(
            snapshot,
            &track_data,
            &beat_data,
            &quick_cues,
            &loops,
            high_res.waveform,
        );
        Ok(())
    }
}

/// Decode an optional BLOB column, treating NULL or empty as the default
/// value.
fn decode_or_default<T: Blob + Default>(blob: Option<Vec<u8>>) -> Result<T> {
    match blob {
        Some(bytes) if !bytes.is_empty() => T::from_blob(&bytes),
        _ => Ok(T::default()),
    }
}

struct TrackRow {
    play_order: Option<i64>,
    length: Option<i64>,
    bpm: Option<i64>,
    year: Option<i64>,
    path: Option<String>,
    bitrate: Option<i64>,
}

impl TableLayer for V1Layer {
    fn storage(&self) -> &Rc<Storage> {
        &self.storage
    }

    fn information(&self) -> Result<InformationRow> {
        super::read_information_row(&self.storage, "music")
    }

    fn write_information(&self, uuid: &str) -> Result<()> {
        let (major, minor, patch) = self.schema.version_tuple();
        for attachment in ["music", "perfdata"] {
            self.storage.execute(
                &format!(
                    "INSERT INTO {attachment}.Information (uuid, schemaVersionMajor, \
                     schemaVersionMinor, schemaVersionPatch, currentPlayedIndicator, \
                     lastRekordBoxLibraryImportReadCounter) \
                     VALUES (?1, ?2, ?3, ?4, 0, 0)"
                ),
                rusqlite::params![uuid, major, minor, patch],
            )?;
        }
        Ok(())
    }

    fn update_current_played_indicator(&self, played_indicator: i64) -> Result<()> {
        for attachment in ["music", "perfdata"] {
            self.storage.execute(
                &format!(
                    "UPDATE {attachment}.Information SET currentPlayedIndicator = ?1"
                ),
                [played_indicator],
            )?;
        }
        Ok(())
    }

    fn list_crates(&self) -> Result<Vec<i64>> {
        self.storage
            .query_rows("SELECT id FROM music.Crate ORDER BY id", [], |row| row.get(0))
    }

    fn root_crates(&self) -> Result<Vec<i64>> {
        self.storage.query_rows(
            "SELECT crateOriginId FROM music.CrateParentList \
             WHERE crateParentId = crateOriginId ORDER BY crateOriginId",
            [],
            |row| row.get(0),
        )
    }

    fn crate_exists(&self, id: i64) -> Result<bool> {
        let count: i64 = self
            .storage
            .query_value("SELECT COUNT(*) FROM music.Crate WHERE id = ?1", [id])?;
        if count > 1 {
            return Err(Error::DatabaseInconsistency(format!(
                "more than one crate with id {id}"
            )));
        }
        Ok(count == 1)
    }

    fn crates_by_name(&self, name: &str) -> Result<Vec<i64>> {
        self.storage.query_rows(
            "SELECT id FROM music.Crate WHERE title = ?1 ORDER BY id",
            [name],
            |row| row.get(0),
        )
    }

    fn crate_name(&self, id: i64) -> Result<String> {
        self.storage
            .query_unique_opt(
                "SELECT title FROM music.Crate WHERE id = ?1",
                [id],
                "Crate row",
                |row| row.get(0),
            )?
            .ok_or(Error::CrateDeleted { id })
    }

    fn crate_parent(&self, id: i64) -> Result<Option<i64>> {
        let parent = self
            .storage
            .query_unique_opt(
                "SELECT crateParentId FROM music.CrateParentList WHERE crateOriginId = ?1",
                [id],
                "CrateParentList row",
                |row| row.get::<_, i64>(0),
            )?
            .ok_or(Error::CrateDeleted { id })?;
        Ok((parent != id).then_some(parent))
    }

    fn crate_children(&self, id: i64) -> Result<Vec<i64>> {
        self.storage.query_rows(
            "SELECT crateOriginId FROM music.CrateParentList \
             WHERE crateParentId = ?1 AND crateOriginId <> ?1 ORDER BY crateOriginId",
            [id],
            |row| row.get(0),
        )
    }

    fn create_root_crate(&self, name: &str) -> Result<i64> {
        let sp = self.storage.savepoint()?;
        self.assert_sibling_name_free(None, name, None)?;
        let id = self.insert_crate(name, None)?;
        sp.release()?;
        Ok(id)
    }

    fn create_root_crate_after(&self, name: &str, after: i64) -> Result<i64> {
        // v1 sibling order is insertion order, so "after" cannot place the
        // new crate anywhere but the end; the reference sibling is still
        // validated.
        self.assert_crate_exists(after)?;
        if self.crate_parent(after)?.is_some() {
            return Err(Error::CrateInvalidParent(format!(
                "crate {after} is not a root crate"
            )));
        }
        self.create_root_crate(name)
    }

    fn create_sub_crate(&self, parent: i64, name: &str) -> Result<i64> {
        let sp = self.storage.savepoint()?;
        self.assert_crate_exists(parent)?;
        self.assert_sibling_name_free(Some(parent), name, None)?;
        let id = self.insert_crate(name, Some(parent))?;
        sp.release()?;
        Ok(id)
    }

    fn create_sub_crate_after(&self, parent: i64, name: &str, after: i64) -> Result<i64> {
        self.assert_crate_exists(after)?;
        if self.crate_parent(after)? != Some(parent) {
            return Err(Error::CrateInvalidParent(format!(
                "crate {after} resides under a different parent"
            )));
        }
        self.create_sub_crate(parent, name)
    }

    fn set_crate_name(&self, id: i64, name: &str) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_crate_exists(id)?;
        let parent = self.crate_parent(id)?;
        self.assert_sibling_name_free(parent, name, Some(id))?;
        self.storage.execute(
            "UPDATE music.Crate SET title = ?1 WHERE id = ?2",
            rusqlite::params![name, id],
        )?;
        self.rebuild_derived_rows(id)?;
        sp.release()?;
        Ok(())
    }

    fn set_crate_parent(&self, id: i64, parent: Option<i64>) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_crate_exists(id)?;
        if let Some(parent) = parent {
            self.assert_crate_exists(parent)?;
            if parent == id {
                return Err(Error::CrateInvalidParent(
                    "a crate cannot be its own parent".into(),
                ));
            }
            let descendants: Vec<i64> = self.storage.query_rows(
                "SELECT crateIdChild FROM music.CrateHierarchy WHERE crateId = ?1",
                [id],
                |row| row.get(0),
            )?;
            if descendants.contains(&parent) {
                return Err(Error::CrateInvalidParent(
                    "a crate cannot be parented to one of its descendants".into(),
                ));
            }
        }
        self.assert_sibling_name_free(parent, &self.crate_name(id)?, Some(id))?;

        self.storage.execute(
            "REPLACE INTO music.CrateParentList (crateOriginId, crateParentId) \
             VALUES (?1, ?2)",
            [id, parent.unwrap_or(id)],
        )?;
        self.rebuild_derived_rows(id)?;
        sp.release()?;
        Ok(())
    }

    fn remove_crate(&self, id: i64) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_crate_exists(id)?;
        for child in self.crate_children(id)? {
            self.remove_crate(child)?;
        }
        self.storage
            .execute("DELETE FROM music.Crate WHERE id = ?1", [id])?;
        self.storage.execute(
            "DELETE FROM music.CrateParentList WHERE crateOriginId = ?1",
            [id],
        )?;
        self.storage.execute(
            "DELETE FROM music.CrateHierarchy WHERE crateId = ?1 OR crateIdChild = ?1",
            [id],
        )?;
        self.storage
            .execute("DELETE FROM music.CrateTrackList WHERE crateId = ?1", [id])?;
        sp.release()?;
        Ok(())
    }

    fn crate_tracks(&self, id: i64) -> Result<Vec<i64>> {
        self.assert_crate_exists(id)?;
        self.storage.query_rows(
            "SELECT trackId FROM music.CrateTrackList WHERE crateId = ?1 ORDER BY rowid",
            [id],
            |row| row.get(0),
        )
    }

    fn add_track_to_crate(
        &self,
        crate_id: i64,
        track_id: i64,
        throw_if_duplicate: bool,
    ) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_crate_exists(crate_id)?;
        self.assert_track_exists(track_id)?;
        let existing: i64 = self.storage.query_value(
            "SELECT COUNT(*) FROM music.CrateTrackList WHERE crateId = ?1 AND trackId = ?2",
            [crate_id, track_id],
        )?;
        if existing > 0 {
            if throw_if_duplicate {
                return Err(Error::CrateAlreadyExists(format!(
                    "track {track_id} is already in crate {crate_id}"
                )));
            }
            sp.release()?;
            return Ok(());
        }
        self.storage.execute(
            "INSERT INTO music.CrateTrackList (crateId, trackId) VALUES (?1, ?2)",
            [crate_id, track_id],
        )?;
        sp.release()?;
        Ok(())
    }

    fn remove_track_from_crate(&self, crate_id: i64, track_id: i64) -> Result<()> {
        self.assert_crate_exists(crate_id)?;
        self.storage.execute(
            "DELETE FROM music.CrateTrackList WHERE crateId = ?1 AND trackId = ?2",
            [crate_id, track_id],
        )?;
        Ok(())
    }

    fn clear_crate_tracks(&self, id: i64) -> Result<()> {
        self.assert_crate_exists(id)?;
        self.storage
            .execute("DELETE FROM music.CrateTrackList WHERE crateId = ?1", [id])?;
        Ok(())
    }

    fn list_tracks(&self) -> Result<Vec<i64>> {
        self.storage
            .query_rows("SELECT id FROM music.Track ORDER BY id", [], |row| row.get(0))
    }

    fn track_exists(&self, id: i64) -> Result<bool> {
        let count: i64 = self
            .storage
            .query_value("SELECT COUNT(*) FROM music.Track WHERE id = ?1", [id])?;
        if count > 1 {
            return Err(Error::DatabaseInconsistency(format!(
                "more than one track with id {id}"
            )));
        }
        Ok(count == 1)
    }

    fn tracks_by_relative_path(&self, relative_path: &str) -> Result<Vec<i64>> {
        self.storage.query_rows(
            "SELECT id FROM music.Track WHERE path = ?1 ORDER BY id",
            [relative_path],
            |row| row.get(0),
        )
    }

    fn create_track(&self, snapshot: &TrackSnapshot) -> Result<i64> {
        let sp = self.storage.savepoint()?;

        let mut columns = track_column_values(snapshot);
        if self.schema >= Schema::V1_7_1 {
            columns.push(("pdbImportKey", Value::Integer(0)));
        }
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> =
            (1..=columns.len()).map(|i| format!("?{i}")).collect();
        self.storage.execute(
            &format!(
                "INSERT INTO music.Track ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(columns.into_iter().map(|(_, value)| value)),
        )?;
        let id = self.storage.last_insert_rowid();

        self.write_metadata(id, snapshot)?;
        self.write_performance_row(id, snapshot)?;
        sp.release()?;
        log::debug!("created v1 track {id}");
        Ok(id)
    }

    fn track_snapshot(&self, id: i64) -> Result<TrackSnapshot> {
        let row = self.track_row(id)?;
        let mut snapshot = TrackSnapshot {
            track_number: row.play_order,
            duration_ms: row.length.map(|secs| secs * 1000),
            bpm: row.bpm,
            year: row.year,
            relative_path: row.path,
            bitrate: row.bitrate,
            ..TrackSnapshot::default()
        };

        snapshot.title = self.get_meta_str(id, StringMeta::Title)?;
        snapshot.artist = self.get_meta_str(id, StringMeta::Artist)?;
        snapshot.album = self.get_meta_str(id, StringMeta::Album)?;
        snapshot.genre = self.get_meta_str(id, StringMeta::Genre)?;
        snapshot.comment = self.get_meta_str(id, StringMeta::Comment)?;
        snapshot.publisher = self.get_meta_str(id, StringMeta::Publisher)?;
        snapshot.composer = self.get_meta_str(id, StringMeta::Composer)?;

        snapshot.rating = self.get_meta_int(id, IntMeta::Rating)?;
        snapshot.file_bytes = self
            .get_meta_int(id, IntMeta::FileBytes)?
            .map(|bytes| bytes as u64);
        snapshot.key = self
            .get_meta_int(id, IntMeta::MusicalKey)?
            .and_then(|ordinal| crate::model::MusicalKey::from_ordinal(ordinal as i32));
        snapshot.last_played_at = self
            .get_meta_int(id, IntMeta::LastPlayedTs)?
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        self.read_performance_row(id, &mut snapshot)?;
        Ok(snapshot)
    }

    fn update_track(&self, id: i64, snapshot: &TrackSnapshot) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_track_exists(id)?;

        let columns = track_column_values(snapshot);
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
            .collect();
        let id_placeholder = columns.len() + 1;
        let mut values: Vec<Value> =
            columns.into_iter().map(|(_, value)| value).collect();
        values.push(Value::Integer(id));
        self.storage.execute(
            &format!(
                "UPDATE music.Track SET {} WHERE id = ?{id_placeholder}",
                assignments.join(", ")
            ),
            rusqlite::params_from_iter(values),
        )?;

        self.write_metadata(id, snapshot)?;
        self.write_performance_row(id, snapshot)?;
        sp.release()?;
        Ok(())
    }

    fn remove_track(&self, id: i64) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_track_exists(id)?;
        self.storage
            .execute("DELETE FROM music.Track WHERE id = ?1", [id])?;
        self.storage
            .execute("DELETE FROM music.MetaData WHERE id = ?1", [id])?;
        self.storage
            .execute("DELETE FROM music.MetaDataInteger WHERE id = ?1", [id])?;
        self.storage
            .execute("DELETE FROM music.CrateTrackList WHERE trackId = ?1", [id])?;
        self.storage
            .execute("DELETE FROM perfdata.PerformanceData WHERE id = ?1", [id])?;
        sp.release()?;
        Ok(())
    }
}

/// The `Track` column values derived from a snapshot, shared by insert
/// and update.
fn track_column_values(snapshot: &TrackSnapshot) -> Vec<(&'static str, Value)> {
    let length_secs = snapshot.duration_ms.map(|ms| ms / 1000);
    vec![
        ("playOrder", opt_int(snapshot.track_number)),
        ("length", opt_int(length_secs)),
        ("lengthCalculated", opt_int(length_secs)),
        ("bpm", opt_int(snapshot.bpm)),
        ("year", opt_int(snapshot.year)),
        ("path", opt_text(snapshot.relative_path.as_deref())),
        ("filename", opt_text(snapshot.filename())),
        ("bitrate", opt_int(snapshot.bitrate)),
        (
            "bpmAnalyzed",
            snapshot
                .bpm
                .map_or(Value::Null, |bpm| Value::Real(bpm as f64)),
        ),
        ("trackType", Value::Integer(1)),
        ("isExternalTrack", Value::Integer(0)),
        ("uuidOfExternalDatabase", Value::Null),
        ("idTrackInExternalDatabase", Value::Null),
        ("idAlbumArt", Value::Integer(0)),
    ]
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_owned()))
}
