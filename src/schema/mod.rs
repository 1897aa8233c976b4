//! Schema registry: the closed set of supported on-disk layouts
//!
//! Every Engine database declares its layout as a `(major, minor, patch)`
//! tuple in the `Information` table. This module enumerates the supported
//! layouts, defines their total ordering, and routes generic operations to
//! the matching per-schema DDL and verification routines. The registry is
//! pure: it holds no connection.

pub mod v1;
pub mod v2;
pub mod v3;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::Storage;

/// A supported on-disk database layout.
///
/// "V1" schemas use the split m.db/p.db layout; "V2" and "V3" a single
/// database under `Database2/`. The declaration order is the version
/// order, so the derived `Ord` is the schema ordering.
// Variant names carry version numbers verbatim
#[allow(non_camel_case_types)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Schema {
    V1_6_0,
    V1_7_1,
    V1_9_1,
    V1_11_1,
    V1_13_0,
    V1_13_1,
    V1_13_2,
    V1_15_0,
    V1_17_0,
    V1_18_0Desktop,
    V1_18_0Os,
    V2_18_0,
    V2_20_1,
    V2_20_2,
    V2_20_3,
    V2_21_0,
    V2_21_1,
    V2_21_2,
    V3_0_0,
}

/// All supported schemas, in version order.
pub const ALL_SCHEMAS: [Schema; 19] = [
    Schema::V1_6_0,
    Schema::V1_7_1,
    Schema::V1_9_1,
    Schema::V1_11_1,
    Schema::V1_13_0,
    Schema::V1_13_1,
    Schema::V1_13_2,
    Schema::V1_15_0,
    Schema::V1_17_0,
    Schema::V1_18_0Desktop,
    Schema::V1_18_0Os,
    Schema::V2_18_0,
    Schema::V2_20_1,
    Schema::V2_20_2,
    Schema::V2_20_3,
    Schema::V2_21_0,
    Schema::V2_21_1,
    Schema::V2_21_2,
    Schema::V3_0_0,
];

/// The most recent schema version supported by the library.
pub const LATEST_SCHEMA: Schema = Schema::V3_0_0;

/// The most recent 1.x schema version supported by the library.
pub const LATEST_V1_SCHEMA: Schema = Schema::V1_18_0Os;

/// The most recent 2.x schema version supported by the library.
pub const LATEST_V2_SCHEMA: Schema = Schema::V2_21_2;

/// The most recent 3.x schema version supported by the library.
pub const LATEST_V3_SCHEMA: Schema = Schema::V3_0_0;

impl Schema {
    /// The `(major, minor, patch)` tuple written to the `Information`
    /// table.
    pub fn version_tuple(self) -> (i64, i64, i64) {
        match self {
            Schema::V1_6_0 => (1, 6, 0),
            Schema::V1_7_1 => (1, 7, 1),
            Schema::V1_9_1 => (1, 9, 1),
            Schema::V1_11_1 => (1, 11, 1),
            Schema::V1_13_0 => (1, 13, 0),
            Schema::V1_13_1 => (1, 13, 1),
            Schema::V1_13_2 => (1, 13, 2),
            Schema::V1_15_0 => (1, 15, 0),
            Schema::V1_17_0 => (1, 17, 0),
            Schema::V1_18_0Desktop | Schema::V1_18_0Os => (1, 18, 0),
            Schema::V2_18_0 => (2, 18, 0),
            Schema::V2_20_1 => (2, 20, 1),
            Schema::V2_20_2 => (2, 20, 2),
            Schema::V2_20_3 => (2, 20, 3),
            Schema::V2_21_0 => (2, 21, 0),
            Schema::V2_21_1 => (2, 21, 1),
            Schema::V2_21_2 => (2, 21, 2),
            Schema::V3_0_0 => (3, 0, 0),
        }
    }

    /// Find the schema matching an `Information` version tuple.
    ///
    /// The two 1.18.0 variants share a version tuple and cannot be told
    /// apart from `Information` alone; the OS variant is reported.
    pub fn from_version_tuple(major: i64, minor: i64, patch: i64) -> Option<Self> {
        ALL_SCHEMAS
            .iter()
            .rev()
            .copied()
            .find(|s| s.version_tuple() == (major, minor, patch))
    }

    /// True for v2 and v3 schemas, i.e. the single-database layout.
    pub fn is_v2_like(self) -> bool {
        self >= Schema::V2_18_0
    }

    /// True for v1 schemas, i.e. the split m.db/p.db layout.
    pub fn is_v1(self) -> bool {
        !self.is_v2_like()
    }

    /// True for v3 schemas, which split performance data back out into a
    /// `PerformanceData` table.
    pub fn is_v3(self) -> bool {
        self >= Schema::V3_0_0
    }

    /// Human-readable version of the application range this schema is used
    /// by, e.g. "Engine DJ Desktop/OS 3.1.0 to 3.4.0". Informational only.
    pub fn to_application_version_string(self) -> &'static str {
        match self {
            Schema::V1_6_0 => "Engine DJ OS 1.0.0",
            Schema::V1_7_1 => "Engine DJ OS 1.0.3",
            Schema::V1_9_1 => "Engine Prime 1.1.1",
            Schema::V1_11_1 => "Engine DJ OS 1.2.0",
            Schema::V1_13_0 => "Engine DJ OS 1.2.2",
            Schema::V1_13_1 => "Engine Prime 1.2.2",
            Schema::V1_13_2 => "Engine DJ OS 1.3.1",
            Schema::V1_15_0 => "Engine DJ OS 1.4.0",
            Schema::V1_17_0 => "Engine DJ OS 1.5.1/1.5.2",
            Schema::V1_18_0Desktop => "Engine Prime 1.5.1/1.6.0/1.6.1",
            Schema::V1_18_0Os => "Engine DJ OS 1.6.0/1.6.1/1.6.2",
            Schema::V2_18_0 => "Engine DJ Desktop/OS 2.0.x to 2.1.x",
            Schema::V2_20_1 => "Engine DJ Desktop/OS 2.2.x to 2.3.x",
            Schema::V2_20_2 => "Engine DJ Desktop/OS 2.4.0",
            Schema::V2_20_3 => "Engine DJ Desktop/OS 3.0.0 to 3.0.1",
            Schema::V2_21_0 => "Engine DJ Desktop/OS 3.1.0 to 3.4.0",
            Schema::V2_21_1 => "Engine DJ Desktop/OS 4.0.0",
            Schema::V2_21_2 => "Engine DJ Desktop/OS 4.0.1",
            Schema::V3_0_0 => "Engine DJ Desktop/OS 4.1.0 to 4.2.1",
        }
    }

    /// Run the DDL to populate an empty backend with every table, trigger
    /// and index this schema requires.
    pub fn create(self, storage: &Storage) -> Result<()> {
        if self.is_v2_like() {
            v2::create(storage, self)
        } else {
            v1::create(storage, self)
        }
    }

    /// Structurally verify a backend against this schema: table set,
    /// column names, and required triggers.
    pub fn verify(self, storage: &Storage) -> Result<()> {
        if self.is_v2_like() {
            v2::verify(storage, self)
        } else {
            v1::verify(storage, self)
        }
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.version_tuple();
        match self {
            Schema::V1_18_0Desktop => write!(f, "{major}.{minor}.{patch} (Desktop)"),
            Schema::V1_18_0Os => write!(f, "{major}.{minor}.{patch} (OS)"),
            _ => write!(f, "{major}.{minor}.{patch}"),
        }
    }
}

/// Structural description of one table, shared by the create and verify
/// routines so that the two can never drift apart.
pub(crate) struct TableDef {
    /// Attachment-qualified table name, e.g. `music.Track`.
    pub qualified_name: &'static str,

    /// Column name and declaration pairs, in declaration order.
    pub columns: Vec<(&'static str, &'static str)>,

    /// Table-level constraint clause, e.g. a composite primary key.
    /// Empty when there is none.
    pub tail: &'static str,
}

impl TableDef {
    /// Database attachment part of the qualified name (`main` when
    /// unqualified).
    pub fn attachment(&self) -> &'static str {
        match self.qualified_name.split_once('.') {
            Some((attachment, _)) => attachment,
            None => "main",
        }
    }

    /// Bare table name without the attachment qualifier.
    pub fn bare_name(&self) -> &'static str {
        match self.qualified_name.split_once('.') {
            Some((_, name)) => name,
            None => self.qualified_name,
        }
    }

    /// Render the `CREATE TABLE` statement for this definition.
    pub fn create_sql(&self) -> String {
        let mut columns: Vec<String> = self
            .columns
            .iter()
            .map(|(name, decl)| format!("{name} {decl}"))
            .collect();
        if !self.tail.is_empty() {
            columns.push(self.tail.to_owned());
        }
        format!(
            "CREATE TABLE {} ({})",
            self.qualified_name,
            columns.join(", ")
        )
    }
}

/// Run the `CREATE TABLE` statements for every definition, then the given
/// trigger and index statements.
pub(crate) fn create_structure(
    storage: &Storage,
    tables: &[TableDef],
    statements: &[String],
) -> Result<()> {
    for table in tables {
        storage.execute_batch(&table.create_sql())?;
    }
    for statement in statements {
        storage.execute_batch(statement)?;
    }
    Ok(())
}

/// Check that every listed table exists with exactly the listed columns,
/// and that every listed trigger exists.
pub(crate) fn verify_structure(
    storage: &Storage,
    tables: &[TableDef],
    triggers: &[&str],
) -> Result<()> {
    use crate::error::Error;

    for table in tables {
        let count: i64 = storage.query_value(
            &format!(
                "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
                table.attachment()
            ),
            [table.bare_name()],
        )?;
        if count != 1 {
            return Err(Error::DatabaseInconsistency(format!(
                "missing table {}",
                table.qualified_name
            )));
        }

        let actual = storage.table_columns(table.attachment(), table.bare_name())?;
        let expected: Vec<&str> = table.columns.iter().map(|(name, _)| *name).collect();
        if actual != expected {
            return Err(Error::DatabaseInconsistency(format!(
                "table {} has columns {:?}, expected {:?}",
                table.qualified_name, actual, expected
            )));
        }
    }

    for trigger in triggers {
        let (attachment, name) = match trigger.split_once('.') {
            Some((attachment, name)) => (attachment, name),
            None => ("main", *trigger),
        };
        let count: i64 = storage.query_value(
            &format!(
                "SELECT COUNT(*) FROM {attachment}.sqlite_master \
                 WHERE type = 'trigger' AND name = ?1"
            ),
            [name],
        )?;
        if count != 1 {
            return Err(Error::DatabaseInconsistency(format!(
                "missing trigger {trigger}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_total_and_antisymmetric() {
        for a in ALL_SCHEMAS {
            for b in ALL_SCHEMAS {
                assert!(a <= b || b <= a);
                if a < b {
                    assert!(!(b < a));
                }
            }
        }
    }

    #[test]
    fn test_declaration_order_matches_version_order() {
        for pair in ALL_SCHEMAS.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].version_tuple() <= pair[1].version_tuple());
        }
    }

    #[test]
    fn test_latest_constants() {
        assert_eq!(LATEST_SCHEMA, Schema::V3_0_0);
        assert!(LATEST_V1_SCHEMA.is_v1());
        assert!(LATEST_V2_SCHEMA.is_v2_like() && !LATEST_V2_SCHEMA.is_v3());
        assert!(LATEST_V3_SCHEMA.is_v3());
        assert_eq!(
            ALL_SCHEMAS.iter().copied().max().unwrap(),
            LATEST_SCHEMA
        );
    }

    #[test]
    fn test_family_predicates() {
        assert!(Schema::V1_6_0.is_v1());
        assert!(!Schema::V1_18_0Os.is_v2_like());
        assert!(Schema::V2_18_0.is_v2_like());
        assert!(!Schema::V2_21_2.is_v3());
        assert!(Schema::V3_0_0.is_v2_like());
        assert!(Schema::V3_0_0.is_v3());
    }

    #[test]
    fn test_version_tuple_round_trip() {
        for schema in ALL_SCHEMAS {
            let (major, minor, patch) = schema.version_tuple();
            let resolved = Schema::from_version_tuple(major, minor, patch).unwrap();
            if schema == Schema::V1_18_0Desktop {
                // Shares a tuple with the OS variant; resolution prefers OS
                assert_eq!(resolved, Schema::V1_18_0Os);
            } else {
                assert_eq!(resolved, schema);
            }
        }
        assert_eq!(Schema::from_version_tuple(9, 9, 9), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Schema::V1_6_0.to_string(), "1.6.0");
        assert_eq!(Schema::V1_18_0Desktop.to_string(), "1.18.0 (Desktop)");
        assert_eq!(Schema::V1_18_0Os.to_string(), "1.18.0 (OS)");
        assert_eq!(Schema::V2_21_2.to_string(), "2.21.2");
    }
}
