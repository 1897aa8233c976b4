//! Overview and high-resolution waveform BLOBs
//!
//! Both formats share the same envelope: the entry count written twice
//! (int64 BE, the two copies must agree), samples-per-entry (double BE),
//! the entry bytes, then one trailer entry holding the per-band maxima
//! across the whole waveform.
//!
//! Overview entries are three bytes (low/mid/high band values, no
//! opacity); high-resolution entries are six bytes (three values followed
//! by three opacities). The high-resolution format is only persisted by v1
//! schemas; later generations re-derive it from the audio.

use super::bytes::{Reader, Writer};
use super::{envelope, Blob};
use crate::error::{Error, Result};
use crate::model::{WaveformEntry, WaveformPoint};

const OVERVIEW_MIN_LEN: usize = 27;
const HIGH_RES_MIN_LEN: usize = 30;

/// Decoded form of the overview-waveform BLOB.
///
/// Overview waveforms have no opacity channel on disk; decoding
/// synthesizes full opacity on every band.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverviewWaveformBlob {
    /// Number of samples covered by each entry.
    pub samples_per_entry: f64,

    /// Waveform entries. Conventionally 1024 of them.
    pub waveform: Vec<WaveformEntry>,
}

/// Decoded form of the high-resolution waveform BLOB (v1 only).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HighResWaveformBlob {
    /// Number of samples covered by each entry.
    pub samples_per_entry: f64,

    /// Waveform entries, one per quantisation stride.
    pub waveform: Vec<WaveformEntry>,
}

/// Read the shared count/count/samples-per-entry header and validate the
/// body length against `entry_len`.
fn decode_header(r: &mut Reader, entry_len: usize, what: &str) -> Result<(usize, f64)> {
    let count_1 = r.read_i64_be()?;
    let count_2 = r.read_i64_be()?;
    let samples_per_entry = r.read_f64_be()?;
    if count_1 != count_2 {
        return Err(Error::BlobMalformed(format!(
            "{what} waveform data has conflicting length fields"
        )));
    }
    if count_1 < 0 {
        return Err(Error::BlobMalformed(format!(
            "{what} waveform data has negative length"
        )));
    }
    // Body plus one trailer entry of maxima
    if r.remaining() != entry_len * (count_1 as usize + 1) {
        return Err(Error::BlobMalformed(format!(
            "{what} waveform data has incorrect length"
        )));
    }
    Ok((count_1 as usize, samples_per_entry))
}

impl Blob for OverviewWaveformBlob {
    fn to_blob(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(OVERVIEW_MIN_LEN + 3 * self.waveform.len());
        w.put_i64_be(self.waveform.len() as i64);
        w.put_i64_be(self.waveform.len() as i64);
        w.put_f64_be(self.samples_per_entry);

        let mut max = [0u8; 3];
        for entry in &self.waveform {
            max[0] = max[0].max(entry.low.value);
            max[1] = max[1].max(entry.mid.value);
            max[2] = max[2].max(entry.high.value);
            w.put_u8(entry.low.value);
            w.put_u8(entry.mid.value);
            w.put_u8(entry.high.value);
        }
        for band_max in max {
            w.put_u8(band_max);
        }
        envelope::compress(&w.into_bytes())
    }

    fn from_blob(blob: &[u8]) -> Result<Self> {
        let raw = envelope::decompress(blob)?;
        if raw.len() < OVERVIEW_MIN_LEN {
            return Err(Error::BlobMalformed(format!(
                "overview waveform data has less than the minimum length of \
                 {OVERVIEW_MIN_LEN} bytes"
            )));
        }

        let mut r = Reader::new(&raw);
        let (count, samples_per_entry) = decode_header(&mut r, 3, "overview")?;
        let mut waveform = Vec::with_capacity(count);
        for _ in 0..count {
            let low = r.read_u8()?;
            let mid = r.read_u8()?;
            let high = r.read_u8()?;
            waveform.push(WaveformEntry::opaque(low, mid, high));
        }
        // The trailer maxima are recomputed on encode
        r.read_bytes(3)?;

        Ok(Self {
            samples_per_entry,
            waveform,
        })
    }
}

impl Blob for HighResWaveformBlob {
    fn to_blob(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(HIGH_RES_MIN_LEN + 6 * self.waveform.len());
        w.put_i64_be(self.waveform.len() as i64);
        w.put_i64_be(self.waveform.len() as i64);
        w.put_f64_be(self.samples_per_entry);

        let mut max = [0u8; 6];
        for entry in &self.waveform {
            let bytes = [
                entry.low.value,
                entry.mid.value,
                entry.high.value,
                entry.low.opacity,
                entry.mid.opacity,
                entry.high.opacity,
            ];
            for (band_max, byte) in max.iter_mut().zip(bytes) {
                *band_max = (*band_max).max(byte);
            }
            w.put_bytes(&bytes);
        }
        for band_max in max {
            w.put_u8(band_max);
        }
        envelope::compress(&w.into_bytes())
    }

    fn from_blob(blob: &[u8]) -> Result<Self> {
        let raw = envelope::decompress(blob)?;
        if raw.len() < HIGH_RES_MIN_LEN {
            return Err(Error::BlobMalformed(format!(
                "high-resolution waveform data has less than the minimum length of \
                 {HIGH_RES_MIN_LEN} bytes"
            )));
        }

        let mut r = Reader::new(&raw);
        let (count, samples_per_entry) = decode_header(&mut r, 6, "high-resolution")?;
        let mut waveform = Vec::with_capacity(count);
        for _ in 0..count {
            let b = r.read_bytes(6)?;
            waveform.push(WaveformEntry {
                low: WaveformPoint {
                    value: b[0],
                    opacity: b[3],
                },
                mid: WaveformPoint {
                    value: b[1],
                    opacity: b[4],
                },
                high: WaveformPoint {
                    value: b[2],
                    opacity: b[5],
                },
            });
        }
        r.read_bytes(6)?;

        Ok(Self {
            samples_per_entry,
            waveform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<WaveformEntry> {
        (0..len)
            .map(|i| WaveformEntry::opaque(i as u8, (i / 2) as u8, (i / 3) as u8))
            .collect()
    }

    #[test]
    fn test_overview_round_trip() {
        let data = OverviewWaveformBlob {
            samples_per_entry: 15_735.0,
            waveform: ramp(1024),
        };
        let blob = data.to_blob().unwrap();
        assert_eq!(OverviewWaveformBlob::from_blob(&blob).unwrap(), data);
    }

    #[test]
    fn test_overview_uncompressed_layout() {
        let data = OverviewWaveformBlob {
            samples_per_entry: 420.0,
            waveform: vec![WaveformEntry::opaque(1, 2, 3), WaveformEntry::opaque(9, 8, 7)],
        };
        let raw = envelope::decompress(&data.to_blob().unwrap()).unwrap();
        assert_eq!(raw.len(), 27 + 3 * 2);
        // Body then trailer of per-band maxima
        assert_eq!(&raw[24..], &[1, 2, 3, 9, 8, 7, 9, 8, 7]);
    }

    #[test]
    fn test_high_res_round_trip() {
        let waveform: Vec<WaveformEntry> = (0..2100u32)
            .map(|i| WaveformEntry {
                low: WaveformPoint {
                    value: (i % 256) as u8,
                    opacity: 127,
                },
                mid: WaveformPoint {
                    value: (i % 101) as u8,
                    opacity: 255,
                },
                high: WaveformPoint {
                    value: (i % 3) as u8,
                    opacity: 0,
                },
            })
            .collect();
        let data = HighResWaveformBlob {
            samples_per_entry: 420.0,
            waveform,
        };
        let blob = data.to_blob().unwrap();
        assert_eq!(HighResWaveformBlob::from_blob(&blob).unwrap(), data);
    }

    #[test]
    fn test_empty_waveform_round_trip() {
        let data = OverviewWaveformBlob::default();
        let blob = data.to_blob().unwrap();
        assert_eq!(OverviewWaveformBlob::from_blob(&blob).unwrap(), data);
    }

    #[test]
    fn test_conflicting_counts_fail() {
        let mut w = Writer::new();
        w.put_i64_be(2);
        w.put_i64_be(3);
        w.put_f64_be(420.0);
        w.put_bytes(&[0; 9]);
        let blob = envelope::compress(&w.into_bytes()).unwrap();
        assert!(matches!(
            OverviewWaveformBlob::from_blob(&blob),
            Err(Error::BlobMalformed(_))
        ));
    }

    #[test]
    fn test_incorrect_body_length_fails() {
        let mut w = Writer::new();
        w.put_i64_be(2);
        w.put_i64_be(2);
        w.put_f64_be(420.0);
        w.put_bytes(&[0; 8]); // should be 3 * (2 + 1) = 9
        let blob = envelope::compress(&w.into_bytes()).unwrap();
        assert!(matches!(
            OverviewWaveformBlob::from_blob(&blob),
            Err(Error::BlobMalformed(_))
        ));
    }
}
