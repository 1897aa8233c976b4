//! Row layer for the v2/v3 (single-database) schemas
//!
//! Track metadata is carried in flat columns on `Track`. Crates map onto
//! the `Playlist` and `PlaylistEntity` tables: sibling order and entity
//! order are singly-linked lists over `nextListId` / `nextEntityId`, whose
//! pointers are rewritten by the schema's triggers on insert and delete.
//! Analysis BLOBs sit in columns on `Track` for v2 and in the
//! trigger-maintained `PerformanceData` table for v3.

use std::rc::Rc;

use chrono::{TimeZone, Utc};
use rusqlite::types::Value;

use super::{
    apply_performance_data, encode_performance_data, read_information_row,
    EncodedPerformanceData, InformationRow, TableLayer,
};
use crate::codec::{BeatDataBlob, Blob, LoopsBlob, OverviewWaveformBlob, QuickCuesBlob, TrackDataBlob};
use crate::error::{Error, Result};
use crate::model::{MusicalKey, TrackSnapshot};
use crate::schema::Schema;
use crate::store::Storage;

/// Sentinel for "no next element" in the linked-list columns.
const NO_NEXT: i64 = 0;

/// Sentinel for "no parent" in `parentListId`.
const NO_PARENT: i64 = 0;

pub(crate) struct V2Layer {
    schema: Schema,
    storage: Rc<Storage>,
}

/// Arrange `(id, next)` pairs into chain order.
///
/// The head is the one row nothing points at; the chain must visit every
/// row exactly once and end at the zero sentinel.
fn order_chain(rows: Vec<(i64, i64)>, what: &str) -> Result<Vec<i64>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let pointed: std::collections::HashSet<i64> =
        rows.iter().map(|(_, next)| *next).collect();
    let mut heads = rows.iter().filter(|(id, _)| !pointed.contains(id));
    let head = match (heads.next(), heads.next()) {
        (Some((head, _)), None) => *head,
        _ => {
            return Err(Error::DatabaseInconsistency(format!(
                "{what} chain does not have exactly one head"
            )))
        }
    };

    let next_of: std::collections::HashMap<i64, i64> = rows.iter().copied().collect();
    let mut ordered = Vec::with_capacity(rows.len());
    let mut current = head;
    loop {
        ordered.push(current);
        if ordered.len() > rows.len() {
            return Err(Error::DatabaseInconsistency(format!("{what} chain has a cycle")));
        }
        match next_of.get(&current) {
            Some(&NO_NEXT) => break,
            Some(&next) => current = next,
            None => {
                return Err(Error::DatabaseInconsistency(format!(
                    "{what} chain points at a missing row"
                )))
            }
        }
    }
    if ordered.len() != rows.len() {
        return Err(Error::DatabaseInconsistency(format!(
            "{what} chain does not reach every row"
        )));
    }
    Ok(ordered)
}

impl V2Layer {
    pub fn new(schema: Schema, storage: Rc<Storage>) -> Self {
        Self { schema, storage }
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

    fn assert_sibling_name_free(
        &self,
        parent: i64,
        name: &str,
        exclude: Option<i64>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::CrateInvalidName("crate names must not be empty".into()));
        }
        let clash: Option<i64> = self.storage.query_value_opt(
            "SELECT id FROM Playlist WHERE parentListId = ?1 AND title = ?2 \
             AND id <> ?3 LIMIT 1",
            rusqlite::params![parent, name, exclude.unwrap_or(0)],
        )?;
        if clash.is_some() {
            return Err(Error::CrateInvalidName(format!(
                "a sibling crate named '{name}' already exists"
            )));
        }
        Ok(())
    }

    /// Children of a sibling group, in linked-list order.
    fn sibling_chain(&self, parent: i64) -> Result<Vec<i64>> {
        let rows = self.storage.query_rows(
            "SELECT id, nextListId FROM Playlist WHERE parentListId = ?1",
            [parent],
            |row| Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(NO_NEXT))),
        )?;
        order_chain(rows, "playlist sibling")
    }

    /// Insert a playlist row; the insert trigger links the siblings.
    fn insert_playlist(&self, name: &str, parent: i64, next_list_id: i64) -> Result<i64> {
        self.storage.execute(
            "INSERT INTO Playlist (title, parentListId, isPersisted, nextListId, \
             lastEditTime, isExplicitlyExported) VALUES (?1, ?2, 1, ?3, ?4, 1)",
            rusqlite::params![name, parent, next_list_id, Utc::now().timestamp()],
        )?;
        Ok(self.storage.last_insert_rowid())
    }

    /// Validate that `after` is a member of the sibling group and return
    /// its next pointer.
    fn next_of_sibling(&self, parent: i64, after: i64) -> Result<i64> {
        self.assert_crate_exists(after)?;
        let row: Option<(i64, i64)> = self.storage.query_unique_opt(
            "SELECT parentListId, nextListId FROM Playlist WHERE id = ?1",
            [after],
            "Playlist row",
            |row| Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(NO_NEXT))),
        )?;
        match row {
            Some((after_parent, next)) if after_parent == parent => Ok(next),
            _ => Err(Error::CrateInvalidParent(format!(
                "crate {after} resides under a different parent"
            ))),
        }
    }

    fn create_crate_in(&self, parent: i64, name: &str, next: i64) -> Result<i64> {
        let sp = self.storage.savepoint()?;
        if parent != NO_PARENT {
            self.assert_crate_exists(parent)?;
        }
        self.assert_sibling_name_free(parent, name, None)?;
        let id = self.insert_playlist(name, parent, next)?;
        sp.release()?;
        Ok(id)
    }

    /// The database UUID, needed for entity rows and track origin
    /// binding.
    fn database_uuid(&self) -> Result<String> {
        Ok(self.information()?.uuid)
    }

    /// Apply the encoded BLOBs of a track to their schema-specific home.
    fn write_performance_blobs(
        &self,
        id: i64,
        encoded: &EncodedPerformanceData,
    ) -> Result<()> {
        if self.schema.is_v3() {
            // The placeholder row was created by trigger on track insert
            self.storage.execute(
                "UPDATE PerformanceData SET trackData = ?1, overviewWaveFormData = ?2, \
                 beatData = ?3, quickCues = ?4, loops = ?5 WHERE trackId = ?6",
                rusqlite::params![
                    encoded.track_data,
                    encoded.overview_waveform_data,
                    encoded.beat_data,
                    encoded.quick_cues,
                    encoded.loops,
                    id
                ],
            )?;
        } else {
            self.storage.execute(
                "UPDATE Track SET trackData = ?1, overviewWaveFormData = ?2, \
                 beatData = ?3, quickCues = ?4, loops = ?5 WHERE id = ?6",
                rusqlite::params![
                    encoded.track_data,
                    encoded.overview_waveform_data,
                    encoded.beat_data,
                    encoded.quick_cues,
                    encoded.loops,
                    id
                ],
            )?;
        }
        Ok(())
    }

    /// Read the encoded BLOBs of a track from their schema-specific home.
    fn read_performance_blobs(&self, id: i64) -> Result<Option<BlobColumns>> {
        let sql = if self.schema.is_v3() {
            "SELECT trackData, overviewWaveFormData, beatData, quickCues, loops \
             FROM PerformanceData WHERE trackId = ?1"
        } else {
            "SELECT trackData, overviewWaveFormData, beatData, quickCues, loops \
             FROM Track WHERE id = ?1"
        };
        self.storage
            .query_unique_opt(sql, [id], "performance data row", |row| {
                Ok(BlobColumns {
                    track_data: row.get(0)?,
                    overview_waveform_data: row.get(1)?,
                    beat_data: row.get(2)?,
                    quick_cues: row.get(3)?,
                    loops: row.get(4)?,
                })
            })
    }

    /// The `Track` column values derived from a snapshot.
    fn track_column_values(
        &self,
        snapshot: &TrackSnapshot,
        origin_uuid: &str,
    ) -> Vec<(&'static str, Value)> {
        let mut columns = vec![
            ("playOrder", opt_int(snapshot.track_number)),
            ("length", opt_int(snapshot.duration_ms.map(|ms| ms / 1000))),
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
            ("albumArtId", Value::Integer(0)),
            (
                "fileBytes",
                opt_int(snapshot.file_bytes.map(|bytes| bytes as i64)),
            ),
            ("title", opt_text(snapshot.title.as_deref())),
            ("artist", opt_text(snapshot.artist.as_deref())),
            ("album", opt_text(snapshot.album.as_deref())),
            ("genre", opt_text(snapshot.genre.as_deref())),
            ("comment", opt_text(snapshot.comment.as_deref())),
            ("label", opt_text(snapshot.publisher.as_deref())),
            ("composer", opt_text(snapshot.composer.as_deref())),
            ("remixer", Value::Null),
            (
                "key",
                Value::Integer(snapshot.key.map_or(0, |key| key.to_ordinal() as i64)),
            ),
            ("rating", Value::Integer(snapshot.rating.unwrap_or(0))),
            ("albumArt", Value::Null),
            (
                "timeLastPlayed",
                opt_int(snapshot.last_played_at.map(|at| at.timestamp())),
            ),
            (
                "isPlayed",
                Value::Integer(snapshot.last_played_at.is_some() as i64),
            ),
            (
                "fileType",
                Value::Text(snapshot.file_extension().unwrap_or("").to_owned()),
            ),
            ("isAnalyzed", Value::Integer(1)),
            ("dateCreated", Value::Null),
            ("dateAdded", Value::Integer(Utc::now().timestamp())),
            ("isAvailable", Value::Integer(1)),
            ("isMetadataOfPackedTrackChanged", Value::Integer(0)),
            ("isPerfomanceDataOfPackedTrackChanged", Value::Integer(0)),
            ("playedIndicator", Value::Null),
            ("isMetadataImported", Value::Integer(0)),
            ("pdbImportKey", Value::Integer(0)),
            ("streamingSource", Value::Null),
            ("uri", Value::Null),
            ("isBeatGridLocked", Value::Integer(0)),
            ("originDatabaseUuid", Value::Text(origin_uuid.to_owned())),
            ("thirdPartySourceId", Value::Null),
            ("streamingFlags", Value::Integer(0)),
            ("explicitLyrics", Value::Integer(0)),
        ];
        if !self.schema.is_v3() && self.schema >= Schema::V2_20_3 {
            columns.push(("activeOnLoadLoops", Value::Null));
        }
        if self.schema >= Schema::V2_21_0 {
            columns.push(("lastEditTime", Value::Integer(Utc::now().timestamp())));
        }
        columns
    }
}

struct BlobColumns {
    track_data: Option<Vec<u8>>,
    overview_waveform_data: Option<Vec<u8>>,
    beat_data: Option<Vec<u8>>,
    quick_cues: Option<Vec<u8>>,
    loops: Option<Vec<u8>>,
}

fn decode_or_default<T: Blob + Default>(blob: Option<Vec<u8>>) -> Result<T> {
    match blob {
        Some(bytes) if !bytes.is_empty() => T::from_blob(&bytes),
        _ => Ok(T::default()),
    }
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_owned()))
}

impl TableLayer for V2Layer {
    fn storage(&self) -> &Rc<Storage> {
        &self.storage
    }

    fn information(&self) -> Result<InformationRow> {
        read_information_row(&self.storage, "main")
    }

    fn write_information(&self, uuid: &str) -> Result<()> {
        let (major, minor, patch) = self.schema.version_tuple();
        self.storage.execute(
            "INSERT INTO Information (uuid, schemaVersionMajor, schemaVersionMinor, \
             schemaVersionPatch, currentPlayedIndicator, \
             lastRekordBoxLibraryImportReadCounter) VALUES (?1, ?2, ?3, ?4, 0, 0)",
            rusqlite::params![uuid, major, minor, patch],
        )?;
        Ok(())
    }

    fn update_current_played_indicator(&self, played_indicator: i64) -> Result<()> {
        self.storage.execute(
            "UPDATE Information SET currentPlayedIndicator = ?1",
            [played_indicator],
        )?;
        Ok(())
    }

    fn list_crates(&self) -> Result<Vec<i64>> {
        self.storage
            .query_rows("SELECT id FROM Playlist ORDER BY id", [], |row| row.get(0))
    }

    fn root_crates(&self) -> Result<Vec<i64>> {
        self.sibling_chain(NO_PARENT)
    }

    fn crate_exists(&self, id: i64) -> Result<bool> {
        let count: i64 = self
            .storage
            .query_value("SELECT COUNT(*) FROM Playlist WHERE id = ?1", [id])?;
        if count > 1 {
            return Err(Error::DatabaseInconsistency(format!(
                "more than one playlist with id {id}"
            )));
        }
        Ok(count == 1)
    }

    fn crates_by_name(&self, name: &str) -> Result<Vec<i64>> {
        self.storage.query_rows(
            "SELECT id FROM Playlist WHERE title = ?1 ORDER BY id",
            [name],
            |row| row.get(0),
        )
    }

    fn crate_name(&self, id: i64) -> Result<String> {
        self.storage
            .query_unique_opt(
                "SELECT title FROM Playlist WHERE id = ?1",
                [id],
                "Playlist row",
                |row| row.get(0),
            )?
            .ok_or(Error::CrateDeleted { id })
    }

    fn crate_parent(&self, id: i64) -> Result<Option<i64>> {
        let parent = self
            .storage
            .query_unique_opt(
                "SELECT parentListId FROM Playlist WHERE id = ?1",
                [id],
                "Playlist row",
                |row| row.get::<_, Option<i64>>(0),
            )?
            .ok_or(Error::CrateDeleted { id })?
            .unwrap_or(NO_PARENT);
        Ok((parent != NO_PARENT).then_some(parent))
    }

    fn crate_children(&self, id: i64) -> Result<Vec<i64>> {
        self.assert_crate_exists(id)?;
        self.sibling_chain(id)
    }

    fn create_root_crate(&self, name: &str) -> Result<i64> {
        self.create_crate_in(NO_PARENT, name, NO_NEXT)
    }

    fn create_root_crate_after(&self, name: &str, after: i64) -> Result<i64> {
        let next = self.next_of_sibling(NO_PARENT, after)?;
        self.create_crate_in(NO_PARENT, name, next)
    }

    fn create_sub_crate(&self, parent: i64, name: &str) -> Result<i64> {
        self.create_crate_in(parent, name, NO_NEXT)
    }

    fn create_sub_crate_after(&self, parent: i64, name: &str, after: i64) -> Result<i64> {
        let next = self.next_of_sibling(parent, after)?;
        self.create_crate_in(parent, name, next)
    }

    fn set_crate_name(&self, id: i64, name: &str) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_crate_exists(id)?;
        let parent = self.crate_parent(id)?.unwrap_or(NO_PARENT);
        self.assert_sibling_name_free(parent, name, Some(id))?;
        self.storage.execute(
            "UPDATE Playlist SET title = ?1, lastEditTime = ?2 WHERE id = ?3",
            rusqlite::params![name, Utc::now().timestamp(), id],
        )?;
        sp.release()?;
        Ok(())
    }

    fn set_crate_parent(&self, id: i64, parent: Option<i64>) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_crate_exists(id)?;
        let new_parent = parent.unwrap_or(NO_PARENT);
        if let Some(parent) = parent {
            self.assert_crate_exists(parent)?;
            // Walk up from the new parent; hitting the crate itself would
            // close a cycle
            let mut ancestor = Some(parent);
            while let Some(current) = ancestor {
                if current == id {
                    return Err(Error::CrateInvalidParent(
                        "a crate cannot be parented to itself or one of its \
                         descendants"
                            .into(),
                    ));
                }
                ancestor = self.crate_parent(current)?;
            }
        }
        self.assert_sibling_name_free(new_parent, &self.crate_name(id)?, Some(id))?;

        let old_parent = self.crate_parent(id)?.unwrap_or(NO_PARENT);

        // Bridge the old sibling chain around the crate
        self.storage.execute(
            "UPDATE Playlist SET nextListId = \
             (SELECT nextListId FROM Playlist WHERE id = ?1) \
             WHERE parentListId = ?2 AND nextListId = ?1",
            [id, old_parent],
        )?;
        // Move it, then append it to the tail of the new group
        self.storage.execute(
            "UPDATE Playlist SET parentListId = ?1, nextListId = 0, lastEditTime = ?2 \
             WHERE id = ?3",
            rusqlite::params![new_parent, Utc::now().timestamp(), id],
        )?;
        self.storage.execute(
            "UPDATE Playlist SET nextListId = ?1 \
             WHERE parentListId = ?2 AND id <> ?1 AND nextListId = 0",
            [id, new_parent],
        )?;
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
            .execute("DELETE FROM PlaylistEntity WHERE listId = ?1", [id])?;
        // Delete trigger bridges the sibling chain
        self.storage
            .execute("DELETE FROM Playlist WHERE id = ?1", [id])?;
        sp.release()?;
        Ok(())
    }

    fn crate_tracks(&self, id: i64) -> Result<Vec<i64>> {
        self.assert_crate_exists(id)?;
        let rows = self.storage.query_rows(
            "SELECT id, nextEntityId, trackId FROM PlaylistEntity WHERE listId = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?.unwrap_or(NO_NEXT),
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        let chain = order_chain(
            rows.iter().map(|(id, next, _)| (*id, *next)).collect(),
            "playlist entity",
        )?;
        let track_of: std::collections::HashMap<i64, i64> = rows
            .into_iter()
            .map(|(entity, _, track)| (entity, track))
            .collect();
        Ok(chain.into_iter().map(|entity| track_of[&entity]).collect())
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
            "SELECT COUNT(*) FROM PlaylistEntity WHERE listId = ?1 AND trackId = ?2",
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
        // Appended at the end; the insert trigger redirects the old tail
        self.storage.execute(
            "INSERT INTO PlaylistEntity (listId, trackId, databaseUuid, nextEntityId, \
             membershipReference) VALUES (?1, ?2, ?3, 0, 0)",
            rusqlite::params![crate_id, track_id, self.database_uuid()?],
        )?;
        sp.release()?;
        Ok(())
    }

    fn remove_track_from_crate(&self, crate_id: i64, track_id: i64) -> Result<()> {
        self.assert_crate_exists(crate_id)?;
        self.storage.execute(
            "DELETE FROM PlaylistEntity WHERE listId = ?1 AND trackId = ?2",
            [crate_id, track_id],
        )?;
        Ok(())
    }

    fn clear_crate_tracks(&self, id: i64) -> Result<()> {
        self.assert_crate_exists(id)?;
        self.storage
            .execute("DELETE FROM PlaylistEntity WHERE listId = ?1", [id])?;
        Ok(())
    }

    fn list_tracks(&self) -> Result<Vec<i64>> {
        self.storage
            .query_rows("SELECT id FROM Track ORDER BY id", [], |row| row.get(0))
    }

    fn track_exists(&self, id: i64) -> Result<bool> {
        let count: i64 = self
            .storage
            .query_value("SELECT COUNT(*) FROM Track WHERE id = ?1", [id])?;
        if count > 1 {
            return Err(Error::DatabaseInconsistency(format!(
                "more than one track with id {id}"
            )));
        }
        Ok(count == 1)
    }

    fn tracks_by_relative_path(&self, relative_path: &str) -> Result<Vec<i64>> {
        self.storage.query_rows(
            "SELECT id FROM Track WHERE path = ?1 ORDER BY id",
            [relative_path],
            |row| row.get(0),
        )
    }

    fn create_track(&self, snapshot: &TrackSnapshot) -> Result<i64> {
        let sp = self.storage.savepoint()?;
        let uuid = self.database_uuid()?;
        let encoded = encode_performance_data(snapshot, self.schema)?;

        let columns = self.track_column_values(snapshot, &uuid);
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> =
            (1..=columns.len()).map(|i| format!("?{i}")).collect();
        self.storage.execute(
            &format!(
                "INSERT INTO Track ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(columns.into_iter().map(|(_, value)| value)),
        )?;
        let id = self.storage.last_insert_rowid();

        // A track not imported from elsewhere references itself
        self.storage.execute(
            "UPDATE Track SET originTrackId = ?1 WHERE id = ?1",
            [id],
        )?;
        self.write_performance_blobs(id, &encoded)?;
        sp.release()?;
        log::debug!("created v2 track {id}");
        Ok(id)
    }

    fn track_snapshot(&self, id: i64) -> Result<TrackSnapshot> {
        let mut snapshot = self
            .storage
            .query_unique_opt(
                "SELECT playOrder, length, bpm, year, path, bitrate, fileBytes, title, \
                 artist, album, genre, comment, label, composer, key, rating, \
                 timeLastPlayed FROM Track WHERE id = ?1",
                [id],
                "Track row",
                |row| {
                    Ok(TrackSnapshot {
                        track_number: row.get(0)?,
                        duration_ms: row.get::<_, Option<i64>>(1)?.map(|secs| secs * 1000),
                        bpm: row.get(2)?,
                        year: row.get(3)?,
                        relative_path: row.get(4)?,
                        bitrate: row.get(5)?,
                        file_bytes: row.get::<_, Option<i64>>(6)?.map(|bytes| bytes as u64),
                        title: row.get(7)?,
                        artist: row.get(8)?,
                        album: row.get(9)?,
                        genre: row.get(10)?,
                        comment: row.get(11)?,
                        publisher: row.get(12)?,
                        composer: row.get(13)?,
                        key: row
                            .get::<_, Option<i64>>(14)?
                            .and_then(|ordinal| MusicalKey::from_ordinal(ordinal as i32)),
                        rating: row.get::<_, Option<i64>>(15)?.filter(|rating| *rating != 0),
                        last_played_at: row
                            .get::<_, Option<i64>>(16)?
                            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
                        ..TrackSnapshot::default()
                    })
                },
            )?
            .ok_or(Error::TrackDeleted { id })?;

        if let Some(blobs) = self.read_performance_blobs(id)? {
            let track_data = decode_or_default::<TrackDataBlob>(blobs.track_data)?;
            let overview =
                decode_or_default::<OverviewWaveformBlob>(blobs.overview_waveform_data)?;
            let beat_data = decode_or_default::<BeatDataBlob>(blobs.beat_data)?;
            let quick_cues = decode_or_default::<QuickCuesBlob>(blobs.quick_cues)?;
            let loops = decode_or_default::<LoopsBlob>(blobs.loops)?;
            apply_performance_data(
                &mut snapshot,
                &track_data,
                &beat_data,
                &quick_cues,
                &loops,
                overview.waveform,
            );
        }
        Ok(snapshot)
    }

    fn update_track(&self, id: i64, snapshot: &TrackSnapshot) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_track_exists(id)?;
        let uuid = self.database_uuid()?;
        let encoded = encode_performance_data(snapshot, self.schema)?;

        // Origin binding and creation stamps are set once, at insert time
        let columns: Vec<(&'static str, Value)> = self
            .track_column_values(snapshot, &uuid)
            .into_iter()
            .filter(|(name, _)| {
                !matches!(*name, "originDatabaseUuid" | "dateAdded" | "dateCreated")
            })
            .collect();
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
                "UPDATE Track SET {} WHERE id = ?{id_placeholder}",
                assignments.join(", ")
            ),
            rusqlite::params_from_iter(values),
        )?;

        self.write_performance_blobs(id, &encoded)?;
        sp.release()?;
        Ok(())
    }

    fn remove_track(&self, id: i64) -> Result<()> {
        let sp = self.storage.savepoint()?;
        self.assert_track_exists(id)?;
        // Entity removal runs as its own statement so the chain-bridging
        // trigger is guaranteed to fire for each membership
        self.storage
            .execute("DELETE FROM PlaylistEntity WHERE trackId = ?1", [id])?;
        // Delete triggers handle the change log and (v3) the performance
        // row
        self.storage.execute("DELETE FROM Track WHERE id = ?1", [id])?;
        sp.release()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_chain_follows_pointers() {
        // 5 -> 2 -> 9 -> end
        let rows = vec![(2, 9), (9, 0), (5, 2)];
        assert_eq!(order_chain(rows, "test").unwrap(), vec![5, 2, 9]);
    }

    #[test]
    fn test_order_chain_empty() {
        assert_eq!(order_chain(Vec::new(), "test").unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn test_order_chain_detects_cycle() {
        let rows = vec![(1, 2), (2, 1)];
        assert!(matches!(
            order_chain(rows, "test"),
            Err(Error::DatabaseInconsistency(_))
        ));
    }

    #[test]
    fn test_order_chain_detects_two_heads() {
        let rows = vec![(1, 0), (2, 0)];
        assert!(matches!(
            order_chain(rows, "test"),
            Err(Error::DatabaseInconsistency(_))
        ));
    }
}
