//! DDL and structural verification for the v1 (split m.db/p.db) schemas
//!
//! The music database carries track metadata and the crate hierarchy; the
//! performance database carries the analysis BLOBs, one row per track.
//! Schemas from 1.7.1 onward add the `pdbImportKey` column to `Track` and
//! the `hasRekordboxValues` column to `PerformanceData`.

use super::{create_structure, verify_structure, Schema, TableDef};
use crate::error::Result;
use crate::store::Storage;

fn information_columns() -> Vec<(&'static str, &'static str)> {
    vec![
        ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        ("uuid", "TEXT"),
        ("schemaVersionMajor", "INTEGER"),
        ("schemaVersionMinor", "INTEGER"),
        ("schemaVersionPatch", "INTEGER"),
        ("currentPlayedIndicator", "INTEGER"),
        ("lastRekordBoxLibraryImportReadCounter", "INTEGER"),
    ]
}

/// Table definitions of the music database.
fn music_tables(schema: Schema) -> Vec<TableDef> {
    let mut track_columns = vec![
        ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        ("playOrder", "INTEGER"),
        ("length", "INTEGER"),
        ("lengthCalculated", "INTEGER"),
        ("bpm", "INTEGER"),
        ("year", "INTEGER"),
        ("path", "TEXT"),
        ("filename", "TEXT"),
        ("bitrate", "INTEGER"),
        ("bpmAnalyzed", "REAL"),
        ("trackType", "INTEGER"),
        ("isExternalTrack", "NUMERIC"),
        ("uuidOfExternalDatabase", "TEXT"),
        ("idTrackInExternalDatabase", "INTEGER"),
        ("idAlbumArt", "INTEGER"),
    ];
    if schema >= Schema::V1_7_1 {
        track_columns.push(("pdbImportKey", "INTEGER"));
    }

    vec![
        TableDef {
            qualified_name: "music.Information",
            columns: information_columns(),
            tail: "",
        },
        TableDef {
            qualified_name: "music.AlbumArt",
            columns: vec![
                ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                ("hash", "TEXT"),
                ("albumArt", "BLOB"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.Track",
            columns: track_columns,
            tail: "",
        },
        TableDef {
            qualified_name: "music.MetaData",
            columns: vec![("id", "INTEGER"), ("type", "INTEGER"), ("text", "TEXT")],
            tail: "PRIMARY KEY (id, type)",
        },
        TableDef {
            qualified_name: "music.MetaDataInteger",
            columns: vec![("id", "INTEGER"), ("type", "INTEGER"), ("value", "INTEGER")],
            tail: "PRIMARY KEY (id, type)",
        },
        TableDef {
            qualified_name: "music.Crate",
            columns: vec![
                ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                ("title", "TEXT"),
                ("path", "TEXT"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.CrateParentList",
            columns: vec![("crateOriginId", "INTEGER"), ("crateParentId", "INTEGER")],
            tail: "PRIMARY KEY (crateOriginId)",
        },
        TableDef {
            qualified_name: "music.CrateHierarchy",
            columns: vec![("crateId", "INTEGER"), ("crateIdChild", "INTEGER")],
            tail: "",
        },
        TableDef {
            qualified_name: "music.CrateTrackList",
            columns: vec![("crateId", "INTEGER"), ("trackId", "INTEGER")],
            tail: "",
        },
        TableDef {
            qualified_name: "music.Playlist",
            columns: vec![
                ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                ("title", "TEXT"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.PlaylistTrackList",
            columns: vec![
                ("playlistId", "INTEGER"),
                ("trackId", "INTEGER"),
                ("trackIdInOriginDatabase", "INTEGER"),
                ("databaseUuid", "TEXT"),
                ("trackNumber", "INTEGER"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.Historylist",
            columns: vec![
                ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                ("title", "TEXT"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.HistorylistTrackList",
            columns: vec![
                ("historylistId", "INTEGER"),
                ("trackId", "INTEGER"),
                ("trackIdInOriginDatabase", "INTEGER"),
                ("databaseUuid", "TEXT"),
                ("date", "INTEGER"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.Preparelist",
            columns: vec![
                ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                ("title", "TEXT"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.PreparelistTrackList",
            columns: vec![
                ("preparelistId", "INTEGER"),
                ("trackId", "INTEGER"),
                ("trackIdInOriginDatabase", "INTEGER"),
                ("databaseUuid", "TEXT"),
            ],
            tail: "",
        },
        TableDef {
            qualified_name: "music.CopiedTrack",
            columns: vec![
                ("trackId", "INTEGER PRIMARY KEY"),
                ("uuidOfSourceDatabase", "TEXT"),
                ("idOfTrackInSourceDatabase", "INTEGER"),
            ],
            tail: "",
        },
    ]
}

/// Table definitions of the performance database.
fn performance_tables(schema: Schema) -> Vec<TableDef> {
    let mut performance_columns = vec![
        ("id", "INTEGER PRIMARY KEY"),
        ("isAnalyzed", "NUMERIC"),
        ("isRendered", "NUMERIC"),
        ("trackData", "BLOB"),
        ("highResolutionWaveFormData", "BLOB"),
        ("overviewWaveFormData", "BLOB"),
        ("beatData", "BLOB"),
        ("quickCues", "BLOB"),
        ("loops", "BLOB"),
        ("hasSeratoValues", "NUMERIC"),
    ];
    if schema >= Schema::V1_7_1 {
        performance_columns.push(("hasRekordboxValues", "NUMERIC"));
    }

    vec![
        TableDef {
            qualified_name: "perfdata.Information",
            columns: information_columns(),
            tail: "",
        },
        TableDef {
            qualified_name: "perfdata.PerformanceData",
            columns: performance_columns,
            tail: "",
        },
    ]
}

fn index_statements() -> Vec<String> {
    [
        "CREATE INDEX music.index_Track_path ON Track (path)",
        "CREATE INDEX music.index_Track_filename ON Track (filename)",
        "CREATE INDEX music.index_Crate_title ON Crate (title)",
        "CREATE INDEX music.index_CrateTrackList_crateId ON CrateTrackList (crateId)",
        "CREATE INDEX music.index_CrateTrackList_trackId ON CrateTrackList (trackId)",
        "CREATE INDEX music.index_CrateHierarchy_crateId ON CrateHierarchy (crateId)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Populate an empty pair of attached databases with the v1 layout.
pub fn create(storage: &Storage, schema: Schema) -> Result<()> {
    log::debug!("creating v1 schema {schema}");
    create_structure(storage, &music_tables(schema), &index_statements())?;
    create_structure(storage, &performance_tables(schema), &[])?;
    Ok(())
}

/// Check both attached databases against the v1 layout.
pub fn verify(storage: &Storage, schema: Schema) -> Result<()> {
    verify_structure(storage, &music_tables(schema), &[])?;
    verify_structure(storage, &performance_tables(schema), &[])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_verify() {
        let storage = Storage::open_v1_in_memory().unwrap();
        create(&storage, Schema::V1_18_0Os).unwrap();
        verify(&storage, Schema::V1_18_0Os).unwrap();
    }

    #[test]
    fn test_oldest_schema_has_no_pdb_import_key() {
        let storage = Storage::open_v1_in_memory().unwrap();
        create(&storage, Schema::V1_6_0).unwrap();
        verify(&storage, Schema::V1_6_0).unwrap();

        let columns = storage.table_columns("music", "Track").unwrap();
        assert!(!columns.contains(&"pdbImportKey".to_string()));
        let columns = storage.table_columns("perfdata", "PerformanceData").unwrap();
        assert!(!columns.contains(&"hasRekordboxValues".to_string()));
    }

    #[test]
    fn test_verify_detects_version_drift() {
        let storage = Storage::open_v1_in_memory().unwrap();
        create(&storage, Schema::V1_6_0).unwrap();
        // 1.7.1 expects the pdbImportKey column that 1.6.0 lacks
        assert!(verify(&storage, Schema::V1_7_1).is_err());
    }

    #[test]
    fn test_verify_detects_missing_table() {
        let storage = Storage::open_v1_in_memory().unwrap();
        create(&storage, Schema::V1_13_2).unwrap();
        storage.execute_batch("DROP TABLE music.CrateHierarchy").unwrap();
        assert!(verify(&storage, Schema::V1_13_2).is_err());
    }
}
