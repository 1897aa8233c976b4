//! Quick-cues BLOB: hot cue slots and main cue positions
//!
//! Layout once uncompressed (minimum 129 bytes):
//! - slot count (int64 BE), always 8
//! - 8 hot-cue records: label length (uint8), then either a 12-byte
//!   zero-filled placeholder (empty slot) or label bytes, sample offset
//!   (double BE) and an ARGB colour
//! - adjusted main cue (double BE), adjusted flag (uint8), default main
//!   cue (double BE)
//! - any trailing bytes appended by newer firmwares, preserved verbatim

use super::bytes::{Reader, Writer};
use super::{envelope, Blob};
use crate::error::{Error, Result};
use crate::model::{HotCue, PadColor};

const SLOT_COUNT: usize = 8;
const MIN_LEN: usize = 129;

/// Decoded form of the quick-cues BLOB.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuickCuesBlob {
    /// Hot cue slots.
    pub hot_cues: [Option<HotCue>; SLOT_COUNT],

    /// Adjusted main cue point.
    pub adjusted_main_cue: f64,

    /// Whether the main cue point has been adjusted from the default.
    /// When unset, the adjusted and default cues are equal.
    pub is_main_cue_adjusted: bool,

    /// Default main cue point.
    pub default_main_cue: f64,

    /// Unrecognised trailing bytes from a decoded blob, re-emitted on
    /// encode so that data written by newer firmwares survives a round
    /// trip through this library.
    pub extra_data: Vec<u8>,
}

impl Blob for QuickCuesBlob {
    fn to_blob(&self) -> Result<Vec<u8>> {
        let label_bytes: usize = self
            .hot_cues
            .iter()
            .flatten()
            .map(|cue| cue.label.len())
            .sum();
        let mut w = Writer::with_capacity(MIN_LEN + label_bytes + self.extra_data.len());

        w.put_i64_be(SLOT_COUNT as i64);
        for cue in &self.hot_cues {
            match cue {
                Some(cue) => {
                    if cue.label.is_empty() {
                        return Err(Error::BlobMalformed(
                            "hot cue labels must not be empty".into(),
                        ));
                    }
                    if cue.label.len() > u8::MAX as usize {
                        return Err(Error::BlobMalformed(
                            "hot cue label exceeds 255 bytes".into(),
                        ));
                    }
                    w.put_u8(cue.label.len() as u8);
                    w.put_bytes(cue.label.as_bytes());
                    w.put_f64_be(cue.sample_offset);
                    w.put_u8(cue.color.a);
                    w.put_u8(cue.color.r);
                    w.put_u8(cue.color.g);
                    w.put_u8(cue.color.b);
                }
                None => {
                    w.put_u8(0);
                    w.put_bytes(&[0; 12]);
                }
            }
        }
        w.put_f64_be(self.adjusted_main_cue);
        w.put_u8(self.is_main_cue_adjusted as u8);
        w.put_f64_be(self.default_main_cue);
        w.put_bytes(&self.extra_data);

        envelope::compress(&w.into_bytes())
    }

    fn from_blob(blob: &[u8]) -> Result<Self> {
        let raw = envelope::decompress(blob)?;
        if raw.len() < MIN_LEN {
            return Err(Error::BlobMalformed(format!(
                "quick cues data has less than the minimum length of {MIN_LEN} bytes"
            )));
        }

        let mut r = Reader::new(&raw);
        let slot_count = r.read_i64_be()?;
        if slot_count != SLOT_COUNT as i64 {
            return Err(Error::BlobMalformed(format!(
                "quick cues data has an unsupported number of hot cues ({slot_count})"
            )));
        }

        let mut result = Self::default();
        for slot in result.hot_cues.iter_mut() {
            let label_length = r.read_u8()? as usize;
            if label_length == 0 {
                r.read_bytes(12)?;
                continue;
            }
            let label = String::from_utf8(r.read_bytes(label_length)?.to_vec())
                .map_err(|_| {
                    Error::BlobMalformed("hot cue label is not valid UTF-8".into())
                })?;
            let sample_offset = r.read_f64_be()?;
            let a = r.read_u8()?;
            let red = r.read_u8()?;
            let g = r.read_u8()?;
            let b = r.read_u8()?;
            *slot = Some(HotCue {
                label,
                sample_offset,
                color: PadColor::new(red, g, b, a),
            });
        }

        result.adjusted_main_cue = r.read_f64_be()?;
        let is_adjusted = r.read_u8()?;
        result.default_main_cue = r.read_f64_be()?;
        if is_adjusted > 1
            || (is_adjusted == 0 && result.adjusted_main_cue != result.default_main_cue)
        {
            return Err(Error::BlobMalformed(
                "quick cues data has invalid main cue data".into(),
            ));
        }
        result.is_main_cue_adjusted = is_adjusted == 1;
        result.extra_data = r.read_rest().to_vec();

        Ok(result)
    }
}
