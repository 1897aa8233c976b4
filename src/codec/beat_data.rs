//! Beat-data BLOB: default and adjusted beat grids
//!
//! Layout once uncompressed (minimum 33 bytes):
//! - sample_rate (double BE)
//! - sample_count (double BE)
//! - is_beatgrid_set (uint8)
//! - default grid section, then adjusted grid section
//!
//! Each grid section is a count (int64 BE) followed by 24-byte markers:
//! sample_offset (double LE), beat index (int64 LE), beats until the next
//! marker (int32 LE), and a reserved 32-bit field written as zero.

use log::warn;

use super::bytes::{Reader, Writer};
use super::{envelope, Blob};
use crate::error::{Error, Result};
use crate::model::BeatgridMarker;

const MIN_LEN: usize = 33;
const MARKER_LEN: usize = 24;

/// Refuse grids whose length prefix implies an absurd allocation.
const MAX_MARKERS: i64 = 32_768;

/// Decoded form of the beat-data BLOB.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeatDataBlob {
    /// Sample rate, in hertz. Zero when unknown.
    pub sample_rate: f64,

    /// Number of samples in the track, as a double on the wire.
    pub sample_count: f64,

    /// Flag indicating whether the beat grid is set. Writers emit 1.
    pub is_beatgrid_set: u8,

    /// Markers making up the default beat grid.
    pub default_grid: Vec<BeatgridMarker>,

    /// Markers making up the adjusted beat grid.
    pub adjusted_grid: Vec<BeatgridMarker>,
}

/// How a grid section failed to decode.
enum GridError {
    /// The section is structurally invalid but correctly framed; decoding
    /// can continue at the following section.
    Invalid(String),

    /// The byte stream itself cannot be framed any further.
    Framing(String),
}

fn encode_grid(w: &mut Writer, grid: &[BeatgridMarker]) {
    w.put_i64_be(grid.len() as i64);
    for (i, marker) in grid.iter().enumerate() {
        w.put_f64_le(marker.sample_offset);
        w.put_i64_le(marker.index);
        let beats_until_next = match grid.get(i + 1) {
            Some(next) => (next.index - marker.index) as i32,
            None => 0,
        };
        w.put_i32_le(beats_until_next);
        w.put_i32_le(0); // reserved
    }
}

fn decode_grid(r: &mut Reader) -> std::result::Result<Vec<BeatgridMarker>, GridError> {
    let count = r
        .read_i64_be()
        .map_err(|e| GridError::Framing(e.to_string()))?;
    if count == 0 {
        return Ok(Vec::new());
    }
    if count < 2 {
        return Err(GridError::Invalid(
            "beat grid has an invalid number of markers".into(),
        ));
    }
    if count > MAX_MARKERS {
        return Err(GridError::Framing(format!(
            "beat grid claims unsupportedly many markers ({count})"
        )));
    }
    if r.remaining() < MARKER_LEN * count as usize {
        return Err(GridError::Framing("beat grid is missing data".into()));
    }

    let framing = |e: Error| GridError::Framing(e.to_string());
    let mut grid = Vec::with_capacity(count as usize);
    let mut violation: Option<String> = None;
    let mut beats_until_next = 0i32;
    for i in 0..count as usize {
        let sample_offset = r.read_f64_le().map_err(framing)?;
        let index = r.read_i64_le().map_err(framing)?;
        let marker = BeatgridMarker {
            index,
            sample_offset,
        };
        if violation.is_none() {
            if let Some(prev) = grid.last() {
                let prev: &BeatgridMarker = prev;
                if marker.index <= prev.index {
                    violation = Some("beat grid has unsorted indices".into());
                } else if marker.sample_offset <= prev.sample_offset {
                    violation = Some("beat grid has unsorted sample offsets".into());
                } else if (marker.index - prev.index) as i32 != beats_until_next {
                    violation = Some("beat grid has conflicting markers".into());
                }
            }
        }
        beats_until_next = r.read_i32_le().map_err(framing)?;
        r.read_i32_le().map_err(framing)?; // reserved
        grid.push(marker);
        if i + 1 == count as usize && beats_until_next != 0 && violation.is_none() {
            violation = Some("beat grid promises a non-existent marker".into());
        }
    }

    match violation {
        Some(msg) => Err(GridError::Invalid(msg)),
        None => Ok(grid),
    }
}

impl Blob for BeatDataBlob {
    fn to_blob(&self) -> Result<Vec<u8>> {
        let len =
            MIN_LEN + MARKER_LEN * (self.default_grid.len() + self.adjusted_grid.len());
        let mut w = Writer::with_capacity(len);
        w.put_f64_be(self.sample_rate);
        w.put_f64_be(self.sample_count);
        w.put_u8(self.is_beatgrid_set);
        encode_grid(&mut w, &self.default_grid);
        encode_grid(&mut w, &self.adjusted_grid);
        envelope::compress(&w.into_bytes())
    }

    /// Decode a beat-data BLOB.
    ///
    /// A structurally invalid grid section is replaced by the empty grid
    /// with a logged diagnostic; the other section survives iff it is
    /// independently valid. If the stream cannot be framed at all, every
    /// following section decodes empty as well.
    fn from_blob(blob: &[u8]) -> Result<Self> {
        let raw = envelope::decompress(blob)?;
        if raw.len() < MIN_LEN {
            return Err(Error::BlobMalformed(format!(
                "beat data has less than the minimum length of {MIN_LEN} bytes"
            )));
        }

        let mut r = Reader::new(&raw);
        let mut result = Self {
            sample_rate: r.read_f64_be()?,
            sample_count: r.read_f64_be()?,
            is_beatgrid_set: r.read_u8()?,
            ..Self::default()
        };
        if result.is_beatgrid_set != 1 {
            warn!(
                "beat data flag 'is beatgrid set' is {} rather than 1",
                result.is_beatgrid_set
            );
        }

        match decode_grid(&mut r) {
            Ok(grid) => result.default_grid = grid,
            Err(GridError::Invalid(msg)) => {
                warn!("discarding default beat grid: {msg}");
            }
            Err(GridError::Framing(msg)) => {
                warn!("discarding default and adjusted beat grids: {msg}");
                return Ok(result);
            }
        }
        match decode_grid(&mut r) {
            Ok(grid) => result.adjusted_grid = grid,
            Err(GridError::Invalid(msg)) => {
                warn!("discarding adjusted beat grid: {msg}");
            }
            Err(GridError::Framing(msg)) => {
                warn!("discarding adjusted beat grid: {msg}");
                return Ok(result);
            }
        }

        if !r.is_empty() {
            return Err(Error::BlobMalformed("beat data has too much data".into()));
        }
        Ok(result)
    }
}
