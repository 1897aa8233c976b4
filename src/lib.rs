//! Engine Library - reader and writer for Engine DJ databases
//!
//! This library reads and writes the on-disk format used by the Engine
//! family of DJ performance applications and hardware players, across
//! every supported schema generation: the split m.db/p.db layout of the
//! 1.x era, and the single-database layout of 2.x and 3.x. Performance
//! data (beat grids, cue points, loops, waveforms, key and loudness
//! analysis) is encoded into the same binary BLOB formats the reference
//! applications produce, bit-exact up to zlib compression level.

pub mod analysis;
pub mod codec;
pub mod error;
pub mod library;
pub mod model;
pub mod schema;
pub mod store;
pub mod table;

pub use error::{Error, Result};
pub use library::{
    create_database, create_database_from_scripts, create_or_load_database,
    create_temporary_database, database_exists, load_database, Crate, Database, Track,
};
pub use model::{
    standard_pad_colors, BeatgridMarker, HotCue, Loop, MusicalKey, PadColor,
    TrackSnapshot, WaveformEntry, WaveformPoint,
};
pub use schema::{
    Schema, ALL_SCHEMAS, LATEST_SCHEMA, LATEST_V1_SCHEMA, LATEST_V2_SCHEMA,
    LATEST_V3_SCHEMA,
};
pub use table::InformationRow;
