//! Relational-store adapter over SQLite
//!
//! Everything the codec and table layers need from the SQL backend lives
//! behind [`Storage`]: attachment of one or two database files to a single
//! connection, prepared statements with positional binding, row iteration,
//! last-insert-id retrieval, and nested transactions via save-points.
//!
//! A `Storage` is thread-confined: it wraps a single SQLite connection
//! which must be driven by at most one thread at a time. Concurrency
//! across separate `Storage` instances (separate connections) is fine.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::types::FromSql;
use rusqlite::{Connection, OpenFlags, Params, Row};

use crate::error::{Error, Result};

/// Process-wide monotonic counter naming save-points, so that nested
/// invocations compose without clashing.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A single SQLite connection with the attachment layout of one Engine
/// database.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open the split v1 layout: one in-memory primary with `<dir>/m.db`
    /// attached as `music` and `<dir>/p.db` attached as `perfdata`.
    ///
    /// The files are created if absent.
    pub fn open_v1(directory: &Path) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let music = directory.join("m.db");
        let perfdata = directory.join("p.db");
        conn.execute(
            "ATTACH DATABASE ?1 AS music",
            [music.to_string_lossy().as_ref()],
        )?;
        conn.execute(
            "ATTACH DATABASE ?1 AS perfdata",
            [perfdata.to_string_lossy().as_ref()],
        )?;
        Ok(Self { conn })
    }

    /// Open the v1 layout entirely in memory, with no disk persistence.
    pub fn open_v1_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("ATTACH DATABASE ':memory:' AS music", [])?;
        conn.execute("ATTACH DATABASE ':memory:' AS perfdata", [])?;
        Ok(Self { conn })
    }

    /// Open the single-file v2/v3 layout at the given database file path.
    ///
    /// The file is created if absent.
    pub fn open_v2(db_file: &Path) -> Result<Self> {
        let conn = Connection::open(db_file)?;
        Ok(Self { conn })
    }

    /// Open the single-file v2/v3 layout read/write only, failing if the
    /// file does not exist.
    pub fn open_v2_existing(db_file: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_file,
            OpenFlags::SQLITE_OPEN_READ_WRITE,
        )?;
        Ok(Self { conn })
    }

    /// Open the v2/v3 layout entirely in memory, with no disk persistence.
    pub fn open_v2_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Execute a statement, returning the number of affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Execute a batch of statements separated by semicolons.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    /// Run a single-row, single-column query. Exactly one row must come
    /// back.
    pub fn query_value<T: FromSql, P: Params>(&self, sql: &str, params: P) -> Result<T> {
        Ok(self.conn.query_row(sql, params, |row| row.get(0))?)
    }

    /// Run a single-row, single-column query returning `None` when no row
    /// matches.
    pub fn query_value_opt<T: FromSql, P: Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Option<T>> {
        match self.conn.query_row(sql, params, |row| row.get(0)) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Run a query, mapping every row through `f` in result order.
    pub fn query_rows<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut statement = self.conn.prepare(sql)?;
        let rows = statement.query_map(params, f)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Run a query expected to match at most one row, mapping it through
    /// `f`. More than one matching row is a database inconsistency
    /// (duplicate primary key).
    pub fn query_unique_opt<T, P, F>(
        &self,
        sql: &str,
        params: P,
        context: &str,
        f: F,
    ) -> Result<Option<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut rows = self.query_rows(sql, params, f)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(Error::DatabaseInconsistency(format!(
                "{context}: expected at most one row, found {n}"
            ))),
        }
    }

    /// Id assigned by the most recent successful insert on this
    /// connection.
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Column names of a table, in declaration order.
    pub fn table_columns(&self, attachment: &str, table: &str) -> Result<Vec<String>> {
        self.query_rows(
            &format!("PRAGMA {attachment}.table_info({table})"),
            [],
            |row| row.get::<_, String>(1),
        )
    }

    /// Count the tables present across every attachment of this
    /// connection.
    pub fn total_table_count(&self) -> Result<i64> {
        let mut total = 0i64;
        let attachments: Vec<String> =
            self.query_rows("PRAGMA database_list", [], |row| row.get(1))?;
        for attachment in attachments {
            total += self.query_value::<i64, _>(
                &format!(
                    "SELECT COUNT(*) FROM {attachment}.sqlite_master WHERE type = 'table'"
                ),
                [],
            )?;
        }
        Ok(total)
    }

    /// Begin a nested transaction. The save-point is rolled back on drop
    /// unless [`Savepoint::release`] is called.
    pub fn savepoint(&self) -> Result<Savepoint<'_>> {
        let name = format!("sp_{}", SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed));
        self.execute_batch(&format!("SAVEPOINT {name}"))?;
        Ok(Savepoint {
            storage: self,
            name,
            released: false,
        })
    }
}

/// A named, nestable sub-transaction.
///
/// Nested save-points compose: releasing an inner save-point folds its
/// work into the outer one, and only the outermost release commits to
/// disk.
pub struct Savepoint<'a> {
    storage: &'a Storage,
    name: String,
    released: bool,
}

impl Savepoint<'_> {
    /// Release the save-point, folding its work into the enclosing
    /// transaction (or committing, if outermost).
    pub fn release(mut self) -> Result<()> {
        self.storage
            .execute_batch(&format!("RELEASE {}", self.name))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if !self.released {
            // Failure here leaves the save-point open; the connection
            // rolls it back when it closes.
            let _ = self.storage.execute_batch(&format!(
                "ROLLBACK TO {name}; RELEASE {name}",
                name = self.name
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> Storage {
        let storage = Storage::open_v2_in_memory().unwrap();
        storage
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        storage
    }

    #[test]
    fn test_savepoint_release_commits() {
        let storage = scratch();
        {
            let sp = storage.savepoint().unwrap();
            storage
                .execute("INSERT INTO t (v) VALUES (?1)", ["kept"])
                .unwrap();
            sp.release().unwrap();
        }
        let count: i64 = storage.query_value("SELECT COUNT(*) FROM t", []).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_savepoint_drop_rolls_back() {
        let storage = scratch();
        {
            let _sp = storage.savepoint().unwrap();
            storage
                .execute("INSERT INTO t (v) VALUES (?1)", ["discarded"])
                .unwrap();
        }
        let count: i64 = storage.query_value("SELECT COUNT(*) FROM t", []).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_nested_savepoints_compose() {
        let storage = scratch();
        let outer = storage.savepoint().unwrap();
        storage
            .execute("INSERT INTO t (v) VALUES (?1)", ["outer"])
            .unwrap();
        {
            let _inner = storage.savepoint().unwrap();
            storage
                .execute("INSERT INTO t (v) VALUES (?1)", ["inner"])
                .unwrap();
            // Inner dropped without release: only its work is undone
        }
        outer.release().unwrap();

        let values: Vec<String> = storage
            .query_rows("SELECT v FROM t ORDER BY id", [], |row| row.get(0))
            .unwrap();
        assert_eq!(values, ["outer"]);
    }

    #[test]
    fn test_v1_attachments_are_separate() {
        let storage = Storage::open_v1_in_memory().unwrap();
        storage
            .execute_batch("CREATE TABLE music.a (x INTEGER); CREATE TABLE perfdata.b (y INTEGER)")
            .unwrap();
        assert_eq!(storage.total_table_count().unwrap(), 2);
        let music_tables: i64 = storage
            .query_value(
                "SELECT COUNT(*) FROM music.sqlite_master WHERE type = 'table'",
                [],
            )
            .unwrap();
        assert_eq!(music_tables, 1);
    }

    #[test]
    fn test_query_unique_detects_duplicates() {
        let storage = scratch();
        storage
            .execute_batch("INSERT INTO t (v) VALUES ('a'); INSERT INTO t (v) VALUES ('a')")
            .unwrap();
        let result = storage.query_unique_opt(
            "SELECT id FROM t WHERE v = 'a'",
            [],
            "test",
            |row| row.get::<_, i64>(0),
        );
        assert!(matches!(
            result,
            Err(crate::error::Error::DatabaseInconsistency(_))
        ));
    }
}
