//! Track-data BLOB: sampling, loudness, and key analysis
//!
//! Fixed 28 bytes once uncompressed:
//! - sample_rate (double BE), 0 = unknown
//! - sample_count (int64 BE)
//! - average_loudness (double BE), 0 = absent
//! - key ordinal (int32 BE), 0 = absent

use super::bytes::{Reader, Writer};
use super::{envelope, Blob};
use crate::error::{Error, Result};

const UNCOMPRESSED_LEN: usize = 28;

/// Decoded form of the track-data BLOB.
///
/// Fields hold raw wire values; the `0` sentinels for "unknown sampling",
/// "absent loudness" and "absent key" are preserved as-is.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackDataBlob {
    /// Sample rate, in hertz. Zero when unknown.
    pub sample_rate: f64,

    /// Number of samples in the track.
    pub sample_count: i64,

    /// Average loudness in (0, 1]. Zero when absent.
    pub average_loudness: f64,

    /// Musical key wire ordinal (1..=24). Zero when absent.
    pub key: i32,
}

impl Blob for TrackDataBlob {
    fn to_blob(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(UNCOMPRESSED_LEN);
        w.put_f64_be(self.sample_rate);
        w.put_i64_be(self.sample_count);
        w.put_f64_be(self.average_loudness);
        w.put_i32_be(self.key);
        envelope::compress(&w.into_bytes())
    }

    fn from_blob(blob: &[u8]) -> Result<Self> {
        let raw = envelope::decompress(blob)?;
        if raw.len() != UNCOMPRESSED_LEN {
            return Err(Error::BlobMalformed(format!(
                "track data does not have expected length of {UNCOMPRESSED_LEN} bytes \
                 (got {})",
                raw.len()
            )));
        }

        let mut r = Reader::new(&raw);
        Ok(Self {
            sample_rate: r.read_f64_be()?,
            sample_count: r.read_i64_be()?,
            average_loudness: r.read_f64_be()?,
            key: r.read_i32_be()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let data = TrackDataBlob {
            sample_rate: 44100.0,
            sample_count: 16_140_600,
            average_loudness: 0.5,
            key: 1,
        };
        let blob = data.to_blob().unwrap();
        assert_eq!(TrackDataBlob::from_blob(&blob).unwrap(), data);
    }

    #[test]
    fn test_round_trip_sentinels() {
        let data = TrackDataBlob::default();
        let blob = data.to_blob().unwrap();
        assert_eq!(TrackDataBlob::from_blob(&blob).unwrap(), data);
    }

    #[test]
    fn test_wrong_length_fails() {
        let blob = envelope::compress(&[0u8; 27]).unwrap();
        assert!(matches!(
            TrackDataBlob::from_blob(&blob),
            Err(Error::BlobMalformed(_))
        ));
    }
}
