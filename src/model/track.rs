use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MusicalKey, PadColor};

/// Number of hot cue slots per track.
pub const HOT_CUE_COUNT: usize = 8;

/// Number of loop slots per track.
pub const LOOP_COUNT: usize = 8;

/// A marker within a beat grid
///
/// Two or more markers form a beat grid, identifying the position of beats
/// within a track, with the assumption that beats between each pair of
/// markers occur at a constant tempo. By convention the first marker sits
/// at beat -4 (before the start of the track) and the last at the first
/// beat past the usable end of the track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatgridMarker {
    /// Number of this beat. May be negative.
    pub index: i64,

    /// Sample offset within the track. May lie outside the audible range.
    pub sample_offset: f64,
}

/// A named, coloured position marker within a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotCue {
    /// Label shown on the pad.
    pub label: String,

    /// Sample offset of the cue within the track.
    pub sample_offset: f64,

    /// Pad colour.
    pub color: PadColor,
}

/// A named, coloured start/end sample-offset pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    /// Label shown on the pad.
    pub label: String,

    /// Sample offset of the start of the loop.
    pub start_sample_offset: f64,

    /// Sample offset of the end of the loop.
    pub end_sample_offset: f64,

    /// Pad colour.
    pub color: PadColor,
}

/// A single frequency band of a waveform entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaveformPoint {
    /// Band amplitude.
    pub value: u8,

    /// Band opacity. Overview waveforms carry no opacity on disk; decoders
    /// synthesize full opacity.
    pub opacity: u8,
}

/// One entry of a waveform, covering a fixed number of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaveformEntry {
    /// Low-frequency band.
    pub low: WaveformPoint,

    /// Mid-frequency band.
    pub mid: WaveformPoint,

    /// High-frequency band.
    pub high: WaveformPoint,
}

impl WaveformEntry {
    /// Construct an entry from three band values at full opacity.
    pub fn opaque(low: u8, mid: u8, high: u8) -> Self {
        Self {
            low: WaveformPoint {
                value: low,
                opacity: 255,
            },
            mid: WaveformPoint {
                value: mid,
                opacity: 255,
            },
            high: WaveformPoint {
                value: high,
                opacity: 255,
            },
        }
    }
}

/// Detached, value-typed aggregate of every per-track attribute the
/// library models
///
/// A snapshot may outlive the database it was read from and can be
/// replayed into a different database, of any supported schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackSnapshot {
    /// Album name.
    pub album: Option<String>,

    /// Artist name.
    pub artist: Option<String>,

    /// Comment.
    pub comment: Option<String>,

    /// Composer.
    pub composer: Option<String>,

    /// Genre.
    pub genre: Option<String>,

    /// Publisher / label.
    pub publisher: Option<String>,

    /// Track title.
    pub title: Option<String>,

    /// Bitrate, in kilobits per second.
    pub bitrate: Option<i64>,

    /// Beats per minute.
    pub bpm: Option<i64>,

    /// Track number in album.
    pub track_number: Option<i64>,

    /// Release year.
    pub year: Option<i64>,

    /// Rating, from 0 to 100.
    pub rating: Option<i64>,

    /// Track duration, in milliseconds.
    pub duration_ms: Option<i64>,

    /// Size of the underlying file, in bytes.
    pub file_bytes: Option<u64>,

    /// Musical key.
    pub key: Option<MusicalKey>,

    /// Path to the music file, relative to the directory of the library.
    pub relative_path: Option<String>,

    /// Number of samples in the track.
    pub sample_count: Option<u64>,

    /// Sample rate, in hertz. Typically 44100 or 48000.
    pub sample_rate: Option<f64>,

    /// Average loudness, in the range (0, 1].
    pub average_loudness: Option<f64>,

    /// Beat grid markers, in ascending beat order.
    pub beatgrid: Vec<BeatgridMarker>,

    /// Sample offset of the main cue, if set.
    pub main_cue: Option<f64>,

    /// Hot cue slots.
    pub hot_cues: [Option<HotCue>; HOT_CUE_COUNT],

    /// Loop slots.
    pub loops: [Option<Loop>; LOOP_COUNT],

    /// Waveform entries. For v1 schemas this is the high-resolution
    /// waveform; for v2/v3 it is the 1024-entry overview.
    pub waveform: Vec<WaveformEntry>,

    /// Time at which the track was last played.
    pub last_played_at: Option<DateTime<Utc>>,
}

impl TrackSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the file underlying the track, derived from
    /// [`relative_path`](Self::relative_path).
    pub fn filename(&self) -> Option<&str> {
        let path = self.relative_path.as_deref()?;
        Some(match path.rfind('/') {
            Some(pos) => &path[pos + 1..],
            None => path,
        })
    }

    /// Extension of the file underlying the track, without the leading
    /// dot, derived from [`relative_path`](Self::relative_path).
    pub fn file_extension(&self) -> Option<&str> {
        let filename = self.filename()?;
        match filename.rfind('.') {
            Some(pos) if pos + 1 < filename.len() => Some(&filename[pos + 1..]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_derivation() {
        let mut snapshot = TrackSnapshot::new();
        assert_eq!(snapshot.filename(), None);

        snapshot.relative_path = Some("../01 - Some Artist - Some Track.mp3".into());
        assert_eq!(
            snapshot.filename(),
            Some("01 - Some Artist - Some Track.mp3")
        );
        assert_eq!(snapshot.file_extension(), Some("mp3"));
    }

    #[test]
    fn test_filename_without_directory() {
        let mut snapshot = TrackSnapshot::new();
        snapshot.relative_path = Some("track.flac".into());
        assert_eq!(snapshot.filename(), Some("track.flac"));
        assert_eq!(snapshot.file_extension(), Some("flac"));
    }

    #[test]
    fn test_extension_missing() {
        let mut snapshot = TrackSnapshot::new();
        snapshot.relative_path = Some("dir/no_extension".into());
        assert_eq!(snapshot.filename(), Some("no_extension"));
        assert_eq!(snapshot.file_extension(), None);

        snapshot.relative_path = Some("dir/trailing.".into());
        assert_eq!(snapshot.file_extension(), None);
    }
}
