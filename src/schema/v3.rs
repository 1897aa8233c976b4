//! v3-specific schema pieces
//!
//! v3 keeps the v2 single-database layout but splits the analysis BLOBs
//! back out of `Track` into a `PerformanceData` table with one row per
//! track. The row is created by a trigger whenever a track is inserted, so
//! writers never insert into `PerformanceData` directly.

use super::TableDef;

pub(super) fn performance_data_def() -> TableDef {
    TableDef {
        qualified_name: "PerformanceData",
        columns: vec![
            ("trackId", "INTEGER PRIMARY KEY"),
            ("trackData", "BLOB"),
            ("overviewWaveFormData", "BLOB"),
            ("beatData", "BLOB"),
            ("quickCues", "BLOB"),
            ("loops", "BLOB"),
            ("thirdPartySourceId", "INTEGER"),
            ("activeOnLoadLoops", "INTEGER"),
        ],
        tail: "",
    }
}

pub(super) fn trigger_statements() -> Vec<String> {
    vec![
        "CREATE TRIGGER trigger_after_insert_Track_add_PerformanceData \
         AFTER INSERT ON Track \
         BEGIN \
           INSERT INTO PerformanceData (trackId) VALUES (NEW.id); \
         END"
            .to_string(),
        "CREATE TRIGGER trigger_after_delete_Track_delete_PerformanceData \
         AFTER DELETE ON Track \
         BEGIN \
           DELETE FROM PerformanceData WHERE trackId = OLD.id; \
         END"
            .to_string(),
    ]
}

pub(super) fn trigger_names() -> Vec<&'static str> {
    vec![
        "trigger_after_insert_Track_add_PerformanceData",
        "trigger_after_delete_Track_delete_PerformanceData",
    ]
}

#[cfg(test)]
mod tests {
    use crate::schema::{v2, Schema};
    use crate::store::Storage;

    #[test]
    fn test_create_then_verify_v3() {
        let storage = Storage::open_v2_in_memory().unwrap();
        v2::create(&storage, Schema::V3_0_0).unwrap();
        v2::verify(&storage, Schema::V3_0_0).unwrap();

        // The blob columns live on PerformanceData, not Track
        let track_columns = storage.table_columns("main", "Track").unwrap();
        assert!(!track_columns.contains(&"beatData".to_string()));
        let perf_columns = storage.table_columns("main", "PerformanceData").unwrap();
        assert!(perf_columns.contains(&"beatData".to_string()));
    }

    #[test]
    fn test_performance_data_row_follows_track_lifetime() {
        let storage = Storage::open_v2_in_memory().unwrap();
        v2::create(&storage, Schema::V3_0_0).unwrap();

        storage
            .execute("INSERT INTO Track (path, filename) VALUES ('a.mp3', 'a.mp3')", [])
            .unwrap();
        let track_id = storage.last_insert_rowid();
        let count: i64 = storage
            .query_value(
                "SELECT COUNT(*) FROM PerformanceData WHERE trackId = ?1",
                [track_id],
            )
            .unwrap();
        assert_eq!(count, 1, "trigger must auto-insert the placeholder row");

        storage
            .execute("DELETE FROM Track WHERE id = ?1", [track_id])
            .unwrap();
        let count: i64 = storage
            .query_value(
                "SELECT COUNT(*) FROM PerformanceData WHERE trackId = ?1",
                [track_id],
            )
            .unwrap();
        assert_eq!(count, 0);
    }
}
