//! Binary BLOB codecs for Engine analysis data
//!
//! Performance data (beat grids, cue points, loops, waveforms, key and
//! loudness analysis) is stored in opaque binary BLOBs inside the
//! relational tables. This module defines the wire format of each BLOB
//! type, independent of any particular database schema.
//!
//! Each BLOB type implements [`Blob`], so that encode/decode behaviour is
//! uniform across types and the round-trip law (`from_blob(to_blob(v)) ==
//! v` for every legal value) can be property-tested in one place. All
//! BLOBs except loops are wrapped in the zlib envelope of [`envelope`].

pub mod beat_data;
pub mod bytes;
pub mod envelope;
pub mod loops;
pub mod quick_cues;
pub mod track_data;
pub mod waveform_data;

pub use beat_data::BeatDataBlob;
pub use loops::{LoopBlob, LoopsBlob};
pub use quick_cues::QuickCuesBlob;
pub use track_data::TrackDataBlob;
pub use waveform_data::{HighResWaveformBlob, OverviewWaveformBlob};

use crate::error::{Error, Result};

/// Common capability of every analysis BLOB type.
pub trait Blob: Sized + PartialEq + std::fmt::Debug {
    /// Encode this value into its on-disk byte form.
    fn to_blob(&self) -> Result<Vec<u8>>;

    /// Decode a value from its on-disk byte form.
    fn from_blob(blob: &[u8]) -> Result<Self>;
}

/// Encode a BLOB and verify that a subsequent decode reproduces the input.
///
/// Writing a value that does not survive the round trip would corrupt the
/// library invisibly, so it is treated as fatal rather than as a malformed
/// blob.
pub(crate) fn encode_checked<T: Blob>(value: &T, column: &str) -> Result<Vec<u8>> {
    let encoded = value.to_blob()?;
    let decoded = T::from_blob(&encoded)?;
    if decoded != *value {
        return Err(Error::Backend(format!(
            "data for column {column} is not invariant under encoding and \
             subsequent decoding"
        )));
    }
    Ok(encoded)
}
