//! Loops BLOB: the eight loop slots
//!
//! The only BLOB stored without the zlib envelope. Layout (minimum 192
//! bytes): slot count (int64 **little-endian**, always 8), then 8 slots.
//! An empty slot is a zero label length followed by a 22-byte placeholder
//! (two doubles of -1 and six zero bytes). A set slot is the label, start
//! and end sample offsets (double LE), the two set flags, and an ARGB
//! colour.

use super::bytes::{Reader, Writer};
use super::Blob;
use crate::error::{Error, Result};
use crate::model::PadColor;

const SLOT_COUNT: usize = 8;
const MIN_LEN: usize = 192;

/// A single set loop slot inside the loops BLOB.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBlob {
    /// Label shown on the pad. Never empty for a set loop.
    pub label: String,

    /// Sample offset of the start of the loop.
    pub start_sample_offset: f64,

    /// Sample offset of the end of the loop.
    pub end_sample_offset: f64,

    /// Whether the start of the loop is set.
    pub is_start_set: bool,

    /// Whether the end of the loop is set.
    pub is_end_set: bool,

    /// Pad colour.
    pub color: PadColor,
}

/// Decoded form of the loops BLOB.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoopsBlob {
    /// Loop slots.
    pub loops: [Option<LoopBlob>; SLOT_COUNT],
}

impl Blob for LoopsBlob {
    fn to_blob(&self) -> Result<Vec<u8>> {
        let label_bytes: usize = self
            .loops
            .iter()
            .flatten()
            .map(|lp| lp.label.len())
            .sum();
        let mut w = Writer::with_capacity(MIN_LEN + label_bytes);

        w.put_i64_le(SLOT_COUNT as i64);
        for slot in &self.loops {
            match slot {
                Some(lp) => {
                    if lp.label.is_empty() {
                        return Err(Error::BlobMalformed(
                            "loop labels must not be empty".into(),
                        ));
                    }
                    if lp.label.len() > u8::MAX as usize {
                        return Err(Error::BlobMalformed(
                            "loop label exceeds 255 bytes".into(),
                        ));
                    }
                    w.put_u8(lp.label.len() as u8);
                    w.put_bytes(lp.label.as_bytes());
                    w.put_f64_le(lp.start_sample_offset);
                    w.put_f64_le(lp.end_sample_offset);
                    w.put_u8(lp.is_start_set as u8);
                    w.put_u8(lp.is_end_set as u8);
                    w.put_u8(lp.color.a);
                    w.put_u8(lp.color.r);
                    w.put_u8(lp.color.g);
                    w.put_u8(lp.color.b);
                }
                None => {
                    w.put_u8(0);
                    w.put_f64_le(-1.0);
                    w.put_f64_le(-1.0);
                    w.put_bytes(&[0; 6]);
                }
            }
        }

        // The loops blob is stored uncompressed
        Ok(w.into_bytes())
    }

    fn from_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() < MIN_LEN {
            return Err(Error::BlobMalformed(format!(
                "loops data has less than the minimum length of {MIN_LEN} bytes"
            )));
        }

        let mut r = Reader::new(blob);
        let slot_count = r.read_i64_le()?;
        if slot_count != SLOT_COUNT as i64 {
            return Err(Error::BlobMalformed(format!(
                "loops data has an unsupported number of loops ({slot_count})"
            )));
        }

        let mut result = Self::default();
        for slot in result.loops.iter_mut() {
            let label_length = r.read_u8()? as usize;
            if r.remaining() < 22 + label_length {
                return Err(Error::BlobMalformed(
                    "loops data has a loop with missing data".into(),
                ));
            }
            if label_length == 0 {
                r.read_bytes(22)?;
                continue;
            }
            let label = String::from_utf8(r.read_bytes(label_length)?.to_vec())
                .map_err(|_| {
                    Error::BlobMalformed("loop label is not valid UTF-8".into())
                })?;
            let start_sample_offset = r.read_f64_le()?;
            let end_sample_offset = r.read_f64_le()?;
            let is_start_set = r.read_u8()? != 0;
            let is_end_set = r.read_u8()? != 0;
            let a = r.read_u8()?;
            let red = r.read_u8()?;
            let g = r.read_u8()?;
            let b = r.read_u8()?;
            *slot = Some(LoopBlob {
                label,
                start_sample_offset,
                end_sample_offset,
                is_start_set,
                is_end_set,
                color: PadColor::new(red, g, b, a),
            });
        }

        if !r.is_empty() {
            return Err(Error::BlobMalformed("loops data has too much data".into()));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::standard_pad_colors;

    fn sample_loops() -> LoopsBlob {
        let mut loops = LoopsBlob::default();
        loops.loops[0] = Some(LoopBlob {
            label: "Loop 1".into(),
            start_sample_offset: 1144.012,
            end_sample_offset: 345_339.134,
            is_start_set: true,
            is_end_set: true,
            color: standard_pad_colors::PAD_1,
        });
        loops.loops[3] = Some(LoopBlob {
            label: "Outro".into(),
            start_sample_offset: 15_000_000.0,
            end_sample_offset: 15_100_000.0,
            is_start_set: true,
            is_end_set: false,
            color: standard_pad_colors::PAD_4,
        });
        loops
    }

    #[test]
    fn test_round_trip() {
        let loops = sample_loops();
        let blob = loops.to_blob().unwrap();
        assert_eq!(LoopsBlob::from_blob(&blob).unwrap(), loops);
    }

    #[test]
    fn test_empty_blob_is_192_bytes_uncompressed() {
        let loops = LoopsBlob::default();
        let blob = loops.to_blob().unwrap();
        assert_eq!(blob.len(), MIN_LEN);
        // Count field is little-endian
        assert_eq!(&blob[0..8], &[8, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(LoopsBlob::from_blob(&blob).unwrap(), loops);
    }

    #[test]
    fn test_empty_slot_placeholder() {
        let blob = LoopsBlob::default().to_blob().unwrap();
        // First slot starts right after the count: label length 0, then two
        // little-endian -1.0 doubles, then six zero bytes
        assert_eq!(blob[8], 0);
        let minus_one = (-1.0f64).to_le_bytes();
        assert_eq!(&blob[9..17], &minus_one);
        assert_eq!(&blob[17..25], &minus_one);
        assert_eq!(&blob[25..31], &[0; 6]);
    }

    #[test]
    fn test_empty_label_rejected_on_encode() {
        let mut loops = LoopsBlob::default();
        loops.loops[0] = Some(LoopBlob {
            label: String::new(),
            start_sample_offset: 0.0,
            end_sample_offset: 1.0,
            is_start_set: true,
            is_end_set: true,
            color: PadColor::default(),
        });
        assert!(matches!(
            loops.to_blob(),
            Err(Error::BlobMalformed(_))
        ));
    }

    #[test]
    fn test_truncated_slot_fails() {
        let mut blob = sample_loops().to_blob().unwrap();
        blob.truncate(blob.len() - 1);
        // Still above the minimum length, so the slot-level check trips
        assert!(blob.len() >= MIN_LEN);
        assert!(matches!(
            LoopsBlob::from_blob(&blob),
            Err(Error::BlobMalformed(_))
        ));
    }

    #[test]
    fn test_wrong_count_fails() {
        let mut blob = LoopsBlob::default().to_blob().unwrap();
        blob[0] = 9;
        assert!(matches!(
            LoopsBlob::from_blob(&blob),
            Err(Error::BlobMalformed(_))
        ));
    }
}
