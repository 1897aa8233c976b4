//! Error taxonomy for the Engine library crate
//!
//! Every public operation returns [`Result`]. The variants of [`Error`]
//! form a closed set: callers can match exhaustively on the failure class
//! without inspecting message strings.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure classes surfaced by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// The expected database file(s) were absent at load time.
    #[error("no Engine database found in {directory:?}")]
    DatabaseNotFound {
        /// Directory that was searched.
        directory: PathBuf,
    },

    /// The `Information` schema tuple does not match any registered schema.
    #[error("unsupported database schema version {major}.{minor}.{patch}")]
    UnsupportedDatabase {
        /// Major part of the on-disk schema version.
        major: i64,
        /// Minor part of the on-disk schema version.
        minor: i64,
        /// Patch part of the on-disk schema version.
        patch: i64,
    },

    /// Structural verification failure, duplicate primary keys, missing
    /// triggers, or an `Information` table without exactly one row.
    #[error("database inconsistency: {0}")]
    DatabaseInconsistency(String),

    /// A BLOB failed one of the structural decode checks.
    #[error("malformed blob: {0}")]
    BlobMalformed(String),

    /// A crate handle was used after the underlying row was removed.
    #[error("crate {id} has been deleted")]
    CrateDeleted {
        /// Id the handle was bound to.
        id: i64,
    },

    /// A track handle was used after the underlying row was removed.
    #[error("track {id} has been deleted")]
    TrackDeleted {
        /// Id the handle was bound to.
        id: i64,
    },

    /// An attempt to parent a crate to itself or one of its descendants.
    #[error("invalid crate parent: {0}")]
    CrateInvalidParent(String),

    /// An empty crate name, or a name already taken by a sibling.
    #[error("invalid crate name: {0}")]
    CrateInvalidName(String),

    /// A crate (or crate membership) that already exists.
    #[error("crate already exists: {0}")]
    CrateAlreadyExists(String),

    /// A track snapshot that contradicts itself.
    #[error("invalid track snapshot: {0}")]
    InvalidTrackSnapshot(String),

    /// A beat grid with fewer than two markers after trimming.
    #[error("invalid beatgrid: {0}")]
    InvalidBeatgrid(String),

    /// The SQL backend surfaced an unexpected I/O or query failure, or a
    /// BLOB about to be written would not survive a decode round-trip.
    #[error("backend error: {0}")]
    Backend(String),

    /// Filesystem-level failure while locating or creating database files.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Backend(e.to_string())
    }
}
