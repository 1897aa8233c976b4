//! DDL and structural verification for the v2/v3 (single-database)
//! schemas
//!
//! One database file under `Database2/` carries everything. Playlist
//! sibling order and playlist-entity order are singly-linked lists whose
//! pointers are rewritten by triggers on insert and delete; the trigger
//! set is part of the schema and is checked by verification.
//!
//! v3 moves the analysis BLOB columns from `Track` out into a
//! `PerformanceData` table (see [`super::v3`]), with a trigger inserting a
//! placeholder row for every new track.

use super::{create_structure, v3, verify_structure, Schema, TableDef};
use crate::error::Result;
use crate::store::Storage;

fn information_def() -> TableDef {
    TableDef {
        qualified_name: "Information",
        columns: vec![
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("uuid", "TEXT"),
            ("schemaVersionMajor", "INTEGER"),
            ("schemaVersionMinor", "INTEGER"),
            ("schemaVersionPatch", "INTEGER"),
            ("currentPlayedIndicator", "INTEGER"),
            ("lastRekordBoxLibraryImportReadCounter", "INTEGER"),
        ],
        tail: "",
    }
}

fn track_def(schema: Schema) -> TableDef {
    let mut columns = vec![
        ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        ("playOrder", "INTEGER"),
        ("length", "INTEGER"),
        ("bpm", "INTEGER"),
        ("year", "INTEGER"),
        ("path", "TEXT"),
        ("filename", "TEXT"),
        ("bitrate", "INTEGER"),
        ("bpmAnalyzed", "REAL"),
        ("albumArtId", "INTEGER"),
        ("fileBytes", "INTEGER"),
        ("title", "TEXT"),
        ("artist", "TEXT"),
        ("album", "TEXT"),
        ("genre", "TEXT"),
        ("comment", "TEXT"),
        ("label", "TEXT"),
        ("composer", "TEXT"),
        ("remixer", "TEXT"),
        ("key", "INTEGER"),
        ("rating", "INTEGER"),
        ("albumArt", "TEXT"),
        ("timeLastPlayed", "INTEGER"),
        ("isPlayed", "NUMERIC"),
        ("fileType", "TEXT"),
        ("isAnalyzed", "NUMERIC"),
        ("dateCreated", "INTEGER"),
        ("dateAdded", "INTEGER"),
        ("isAvailable", "NUMERIC"),
        ("isMetadataOfPackedTrackChanged", "NUMERIC"),
        // Column name carries the reference application's spelling
        ("isPerfomanceDataOfPackedTrackChanged", "NUMERIC"),
        ("playedIndicator", "INTEGER"),
        ("isMetadataImported", "NUMERIC"),
        ("pdbImportKey", "INTEGER"),
        ("streamingSource", "TEXT"),
        ("uri", "TEXT"),
        ("isBeatGridLocked", "NUMERIC"),
        ("originDatabaseUuid", "TEXT"),
        ("originTrackId", "INTEGER"),
    ];
    if !schema.is_v3() {
        columns.extend([
            ("trackData", "BLOB"),
            ("overviewWaveFormData", "BLOB"),
            ("beatData", "BLOB"),
            ("quickCues", "BLOB"),
            ("loops", "BLOB"),
        ]);
    }
    columns.extend([
        ("thirdPartySourceId", "INTEGER"),
        ("streamingFlags", "INTEGER"),
        ("explicitLyrics", "NUMERIC"),
    ]);
    if !schema.is_v3() && schema >= Schema::V2_20_3 {
        columns.push(("activeOnLoadLoops", "INTEGER"));
    }
    if schema >= Schema::V2_21_0 {
        columns.push(("lastEditTime", "DATETIME"));
    }
    TableDef {
        qualified_name: "Track",
        columns,
        tail: "",
    }
}

fn playlist_def() -> TableDef {
    TableDef {
        qualified_name: "Playlist",
        columns: vec![
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("title", "TEXT"),
            ("parentListId", "INTEGER"),
            ("isPersisted", "NUMERIC"),
            ("nextListId", "INTEGER"),
            ("lastEditTime", "DATETIME"),
            ("isExplicitlyExported", "NUMERIC"),
        ],
        tail: "",
    }
}

fn playlist_entity_def() -> TableDef {
    TableDef {
        qualified_name: "PlaylistEntity",
        columns: vec![
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("listId", "INTEGER"),
            ("trackId", "INTEGER"),
            ("databaseUuid", "TEXT"),
            ("nextEntityId", "INTEGER"),
            ("membershipReference", "INTEGER"),
        ],
        tail: "",
    }
}

fn change_log_def() -> TableDef {
    TableDef {
        qualified_name: "ChangeLog",
        columns: vec![
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("trackId", "INTEGER"),
        ],
        tail: "",
    }
}

pub(super) fn table_defs(schema: Schema) -> Vec<TableDef> {
    let mut defs = vec![
        information_def(),
        track_def(schema),
        playlist_def(),
        playlist_entity_def(),
        change_log_def(),
    ];
    if schema.is_v3() {
        defs.push(v3::performance_data_def());
    }
    defs
}

/// Names of the required triggers. Sibling and entity order both follow
/// the singly-linked-list discipline: an insert redirects whichever
/// neighbour pointed at the new row's successor, a delete bridges the
/// hole.
fn trigger_statements(schema: Schema) -> Vec<String> {
    let mut statements = vec![
        "CREATE TRIGGER trigger_after_insert_Playlist \
         AFTER INSERT ON Playlist \
         BEGIN \
           UPDATE Playlist SET nextListId = NEW.id \
            WHERE id <> NEW.id \
              AND parentListId = NEW.parentListId \
              AND nextListId = NEW.nextListId; \
         END"
            .to_string(),
        "CREATE TRIGGER trigger_after_delete_Playlist \
         AFTER DELETE ON Playlist \
         BEGIN \
           UPDATE Playlist SET nextListId = OLD.nextListId \
            WHERE parentListId = OLD.parentListId \
              AND nextListId = OLD.id; \
           DELETE FROM PlaylistEntity WHERE listId = OLD.id; \
         END"
            .to_string(),
        "CREATE TRIGGER trigger_after_insert_PlaylistEntity \
         AFTER INSERT ON PlaylistEntity \
         BEGIN \
           UPDATE PlaylistEntity SET nextEntityId = NEW.id \
            WHERE id <> NEW.id \
              AND listId = NEW.listId \
              AND nextEntityId = NEW.nextEntityId; \
         END"
            .to_string(),
        "CREATE TRIGGER trigger_after_delete_PlaylistEntity \
         AFTER DELETE ON PlaylistEntity \
         BEGIN \
           UPDATE PlaylistEntity SET nextEntityId = OLD.nextEntityId \
            WHERE listId = OLD.listId \
              AND nextEntityId = OLD.id; \
         END"
            .to_string(),
        "CREATE TRIGGER trigger_after_delete_Track \
         AFTER DELETE ON Track \
         BEGIN \
           INSERT INTO ChangeLog (trackId) VALUES (OLD.id); \
           DELETE FROM PlaylistEntity WHERE trackId = OLD.id; \
         END"
            .to_string(),
    ];
    if schema.is_v3() {
        statements.extend(v3::trigger_statements());
    }
    statements
}

fn trigger_names(schema: Schema) -> Vec<&'static str> {
    let mut names = vec![
        "trigger_after_insert_Playlist",
        "trigger_after_delete_Playlist",
        "trigger_after_insert_PlaylistEntity",
        "trigger_after_delete_PlaylistEntity",
        "trigger_after_delete_Track",
    ];
    if schema.is_v3() {
        names.extend(v3::trigger_names());
    }
    names
}

fn index_statements() -> Vec<String> {
    [
        "CREATE INDEX index_Track_path ON Track (path)",
        "CREATE INDEX index_Track_filename ON Track (filename)",
        "CREATE INDEX index_Playlist_parentListId ON Playlist (parentListId)",
        "CREATE INDEX index_PlaylistEntity_listId ON PlaylistEntity (listId)",
        "CREATE INDEX index_PlaylistEntity_trackId ON PlaylistEntity (trackId)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Populate an empty database with the v2/v3 layout.
pub fn create(storage: &Storage, schema: Schema) -> Result<()> {
    log::debug!("creating v2-like schema {schema}");
    let mut statements = trigger_statements(schema);
    statements.extend(index_statements());
    create_structure(storage, &table_defs(schema), &statements)
}

/// Check the database against the v2/v3 layout, including the trigger
/// set.
pub fn verify(storage: &Storage, schema: Schema) -> Result<()> {
    verify_structure(storage, &table_defs(schema), &trigger_names(schema))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_verify_v2() {
        let storage = Storage::open_v2_in_memory().unwrap();
        create(&storage, Schema::V2_21_2).unwrap();
        verify(&storage, Schema::V2_21_2).unwrap();
    }

    #[test]
    fn test_create_then_verify_earliest_v2() {
        let storage = Storage::open_v2_in_memory().unwrap();
        create(&storage, Schema::V2_18_0).unwrap();
        verify(&storage, Schema::V2_18_0).unwrap();

        let columns = storage.table_columns("main", "Track").unwrap();
        assert!(!columns.contains(&"activeOnLoadLoops".to_string()));
        assert!(!columns.contains(&"lastEditTime".to_string()));
    }

    #[test]
    fn test_verify_detects_version_drift() {
        let storage = Storage::open_v2_in_memory().unwrap();
        create(&storage, Schema::V2_18_0).unwrap();
        assert!(verify(&storage, Schema::V2_21_2).is_err());
    }

    #[test]
    fn test_verify_detects_missing_trigger() {
        let storage = Storage::open_v2_in_memory().unwrap();
        create(&storage, Schema::V2_21_2).unwrap();
        storage
            .execute_batch("DROP TRIGGER trigger_after_insert_Playlist")
            .unwrap();
        assert!(verify(&storage, Schema::V2_21_2).is_err());
    }

    #[test]
    fn test_playlist_insert_trigger_links_siblings() {
        let storage = Storage::open_v2_in_memory().unwrap();
        create(&storage, Schema::V2_21_2).unwrap();

        storage
            .execute(
                "INSERT INTO Playlist (title, parentListId, isPersisted, nextListId, \
                 lastEditTime, isExplicitlyExported) VALUES ('A', 0, 1, 0, 0, 1)",
                [],
            )
            .unwrap();
        let a = storage.last_insert_rowid();
        storage
            .execute(
                "INSERT INTO Playlist (title, parentListId, isPersisted, nextListId, \
                 lastEditTime, isExplicitlyExported) VALUES ('B', 0, 1, 0, 0, 1)",
                [],
            )
            .unwrap();
        let b = storage.last_insert_rowid();

        // A pointed at 0; inserting B (also pointing at 0) redirects A to B
        let next_of_a: i64 = storage
            .query_value("SELECT nextListId FROM Playlist WHERE id = ?1", [a])
            .unwrap();
        assert_eq!(next_of_a, b);

        // Deleting B bridges A back to the end of the chain
        storage
            .execute("DELETE FROM Playlist WHERE id = ?1", [b])
            .unwrap();
        let next_of_a: i64 = storage
            .query_value("SELECT nextListId FROM Playlist WHERE id = ?1", [a])
            .unwrap();
        assert_eq!(next_of_a, 0);
    }
}
