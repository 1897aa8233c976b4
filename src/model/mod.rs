//! Unified data model for Engine libraries
//!
//! This module defines the value types shared by every supported on-disk
//! schema. They are detached from any database: a [`TrackSnapshot`] taken
//! from one library can be replayed into another, regardless of schema
//! generation.

mod color;
mod key;
mod track;

pub use color::{standard_pad_colors, PadColor};
pub use key::MusicalKey;
pub use track::{
    BeatgridMarker, HotCue, Loop, TrackSnapshot, WaveformEntry, WaveformPoint,
};
