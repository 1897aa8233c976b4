//! Engine library façade: databases, crates, and tracks
//!
//! The public surface of the crate. A [`Database`] owns the backend
//! connection; [`Crate`](crates::Crate) and [`Track`](track::Track) are
//! thin handles holding a shared reference into the same database, so
//! their lifetime never outlives the connection. All schema differences
//! are resolved behind the table layer chosen at open time.

mod crates;
mod database;
mod track;

pub use crates::Crate;
pub use database::Database;
pub use track::Track;

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::store::Storage;
use crate::table::{make_table_layer, TableLayer};

/// Shared state behind every handle of one open database.
pub(crate) struct LibraryContext {
    pub directory: PathBuf,
    pub schema: Schema,
    pub layer: Box<dyn TableLayer>,
}

impl LibraryContext {
    fn into_database(self) -> Database {
        Database::new(Rc::new(self))
    }
}

fn open_storage(directory: &Path, schema: Schema) -> Result<Storage> {
    if schema.is_v2_like() {
        let db2 = directory.join("Database2");
        fs::create_dir_all(&db2)?;
        Storage::open_v2(&db2.join("m.db"))
    } else {
        Storage::open_v1(directory)
    }
}

/// Create a new, empty database in a directory using the schema
/// provided.
///
/// Fails if a database already exists in the target directory.
pub fn create_database(directory: impl AsRef<Path>, schema: Schema) -> Result<Database> {
    let directory = directory.as_ref();
    if database_exists(directory)? {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("an Engine database already exists in {directory:?}"),
        )));
    }
    fs::create_dir_all(directory)?;

    log::info!("creating {schema} database in {directory:?}");
    let storage = open_storage(directory, schema)?;
    let layer = make_table_layer(schema, Rc::new(storage));

    let sp = layer.storage().savepoint()?;
    schema.create(layer.storage())?;
    layer.write_information(&uuid::Uuid::new_v4().to_string())?;
    schema.verify(layer.storage())?;
    sp.release()?;

    Ok(LibraryContext {
        directory: directory.to_owned(),
        schema,
        layer,
    }
    .into_database())
}

/// Create a new temporary database.
///
/// Nothing is persisted to disk; all state is lost when the returned
/// database is dropped.
pub fn create_temporary_database(schema: Schema) -> Result<Database> {
    let storage = if schema.is_v2_like() {
        Storage::open_v2_in_memory()?
    } else {
        Storage::open_v1_in_memory()?
    };
    let layer = make_table_layer(schema, Rc::new(storage));

    let sp = layer.storage().savepoint()?;
    schema.create(layer.storage())?;
    layer.write_information(&uuid::Uuid::new_v4().to_string())?;
    sp.release()?;

    Ok(LibraryContext {
        directory: PathBuf::new(),
        schema,
        layer,
    }
    .into_database())
}

/// Whether an Engine database already exists in a directory.
///
/// For the v1 layout both `m.db` and `p.db` must be present and each must
/// contain at least one table; for v2/v3, `Database2/m.db` must be
/// present with at least one table. A half-created file pair with no
/// tables does not count as existing.
pub fn database_exists(directory: impl AsRef<Path>) -> Result<bool> {
    let directory = directory.as_ref();

    let v2_file = directory.join("Database2").join("m.db");
    if v2_file.is_file() {
        let storage = Storage::open_v2_existing(&v2_file)?;
        return Ok(storage.total_table_count()? > 0);
    }

    if !directory.join("m.db").is_file() || !directory.join("p.db").is_file() {
        return Ok(false);
    }
    let storage = Storage::open_v1(directory)?;
    let music_tables: i64 = storage.query_value(
        "SELECT COUNT(*) FROM music.sqlite_master WHERE type = 'table'",
        [],
    )?;
    let perfdata_tables: i64 = storage.query_value(
        "SELECT COUNT(*) FROM perfdata.sqlite_master WHERE type = 'table'",
        [],
    )?;
    Ok(music_tables > 0 && perfdata_tables > 0)
}

/// Load an existing Engine database from a directory.
///
/// The schema is read from the `Information` table and matched against
/// the registry; an unrecognised version tuple fails with
/// `unsupported-database`.
pub fn load_database(directory: impl AsRef<Path>) -> Result<Database> {
    let directory = directory.as_ref();
    if !database_exists(directory)? {
        return Err(Error::DatabaseNotFound {
            directory: directory.to_owned(),
        });
    }

    let v2_file = directory.join("Database2").join("m.db");
    let (storage, information_table) = if v2_file.is_file() {
        (Storage::open_v2_existing(&v2_file)?, "Information")
    } else {
        (Storage::open_v1(directory)?, "music.Information")
    };

    let (major, minor, patch) = storage
        .query_unique_opt(
            &format!(
                "SELECT schemaVersionMajor, schemaVersionMinor, schemaVersionPatch \
                 FROM {information_table}"
            ),
            [],
            "Information row",
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?
        .ok_or_else(|| {
            Error::DatabaseInconsistency("Information table is empty".into())
        })?;
    let schema = Schema::from_version_tuple(major, minor, patch).ok_or(
        Error::UnsupportedDatabase {
            major,
            minor,
            patch,
        },
    )?;

    log::info!("loaded {schema} database from {directory:?}");
    Ok(LibraryContext {
        directory: directory.to_owned(),
        schema,
        layer: make_table_layer(schema, Rc::new(storage)),
    }
    .into_database())
}

/// Load the database in a directory, creating it first when none exists.
///
/// Returns the database and a flag telling whether it was created by this
/// call.
pub fn create_or_load_database(
    directory: impl AsRef<Path>,
    schema: Schema,
) -> Result<(Database, bool)> {
    let directory = directory.as_ref();
    if database_exists(directory)? {
        Ok((load_database(directory)?, false))
    } else {
        Ok((create_database(directory, schema)?, true))
    }
}

/// Hydrate a database from a directory of SQL scripts, then load it.
///
/// Each file named `<stem>.db.sql` is executed against a database file
/// named `<stem>.db`. The presence of a `p.db.sql` script selects the
/// split v1 file layout; otherwise the files are placed under
/// `Database2/`.
pub fn create_database_from_scripts(
    db_directory: impl AsRef<Path>,
    script_directory: impl AsRef<Path>,
) -> Result<Database> {
    let db_directory = db_directory.as_ref();
    let script_directory = script_directory.as_ref();

    let mut scripts: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(script_directory)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(stem) = name.strip_suffix(".db.sql") {
            scripts.push((stem.to_owned(), path));
        }
    }
    if scripts.is_empty() {
        return Err(Error::DatabaseNotFound {
            directory: script_directory.to_owned(),
        });
    }
    scripts.sort();

    let split_layout = scripts.iter().any(|(stem, _)| stem == "p");
    let target_directory = if split_layout {
        db_directory.to_owned()
    } else {
        db_directory.join("Database2")
    };
    fs::create_dir_all(&target_directory)?;

    for (stem, script_path) in &scripts {
        let sql = fs::read_to_string(script_path)?;
        let target = target_directory.join(format!("{stem}.db"));
        log::debug!("hydrating {target:?} from {script_path:?}");
        let storage = Storage::open_v2(&target)?;
        storage.execute_batch(&sql)?;
    }

    load_database(db_directory)
}
