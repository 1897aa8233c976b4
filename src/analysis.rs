//! Analysis helpers: beat-grid normalization and waveform extents
//!
//! Engine analyses tracks so that the first beat-grid marker sits at index
//! -4 (before the start of the track) and the last marker at the first
//! beat past the usable end. Waveforms are scaled by a shared
//! "quantisation number" derived from the sample rate.

use crate::error::{Error, Result};
use crate::model::{BeatgridMarker, WaveformEntry};

/// Number of entries in an overview waveform.
pub const OVERVIEW_WAVEFORM_SIZE: u64 = 1024;

/// Recommended size and scale of a waveform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformExtents {
    /// Number of waveform entries.
    pub size: u64,

    /// Number of samples covered by each entry.
    pub samples_per_entry: f64,
}

/// Calculate the quantisation number for waveforms, given a sample rate.
///
/// A few numbers written to the waveform performance data are rounded to
/// multiples of this number, equal to the sample rate divided by 105 and
/// rounded down to the nearest multiple of two.
pub fn waveform_quantisation_number(sample_rate: f64) -> i64 {
    (sample_rate as i64 / 210) * 2
}

/// Calculate the recommended extents for an overview waveform.
///
/// The overview waveform always has 1024 entries; the per-entry sample
/// stride is the track length, quantised, split over those entries.
pub fn overview_waveform_extents(sample_count: u64, sample_rate: f64) -> WaveformExtents {
    let qn = waveform_quantisation_number(sample_rate);
    if qn == 0 {
        return WaveformExtents {
            size: OVERVIEW_WAVEFORM_SIZE,
            samples_per_entry: 0.0,
        };
    }
    let quantised = (sample_count as i64 / qn) * qn;
    WaveformExtents {
        size: OVERVIEW_WAVEFORM_SIZE,
        samples_per_entry: (quantised / OVERVIEW_WAVEFORM_SIZE as i64) as f64,
    }
}

/// Calculate the recommended extents for a high-resolution waveform.
///
/// In high-resolution waveforms the samples-per-entry is the quantisation
/// number itself. Only v1 schemas persist this waveform; later generations
/// derive it from the audio on the fly.
pub fn high_resolution_waveform_extents(
    sample_count: u64,
    sample_rate: f64,
) -> WaveformExtents {
    let qn = waveform_quantisation_number(sample_rate);
    if qn == 0 {
        return WaveformExtents {
            size: 0,
            samples_per_entry: 0.0,
        };
    }
    WaveformExtents {
        size: sample_count / qn as u64,
        samples_per_entry: qn as f64,
    }
}

/// Subsample a waveform down to the 1024-entry overview size.
///
/// Used when writing to schemas that only persist the overview waveform.
/// Entry `i` of the result is taken at stride `len * (2i + 1) / 2048`,
/// i.e. from the middle of the i-th of 1024 equal windows. An input
/// already of overview size is returned unchanged.
pub fn overview_from_waveform(waveform: &[WaveformEntry]) -> Vec<WaveformEntry> {
    let len = waveform.len() as u64;
    if len == 0 || len == OVERVIEW_WAVEFORM_SIZE {
        return waveform.to_vec();
    }
    (0..OVERVIEW_WAVEFORM_SIZE)
        .map(|i| waveform[(len as usize * (2 * i as usize + 1)) / 2048])
        .collect()
}

/// Normalize a beat grid so that beat indexes are in the form expected by
/// Engine players.
///
/// Markers beyond the end of the track are dropped except the first such
/// marker; markers at or before sample zero are dropped except the last
/// such marker. The first surviving marker is then extrapolated back to
/// beat -4 and the last forward to the first beat at or past
/// `sample_count`, each using the local tempo of its adjacent marker pair.
///
/// An empty grid is returned unchanged. A grid with fewer than two markers
/// after trimming fails with `invalid-beatgrid`.
pub fn normalize_beatgrid(
    mut beatgrid: Vec<BeatgridMarker>,
    sample_count: u64,
) -> Result<Vec<BeatgridMarker>> {
    if beatgrid.is_empty() {
        return Ok(beatgrid);
    }

    // Keep at most one marker beyond the end of the track
    if let Some(pos) = beatgrid
        .iter()
        .position(|m| m.sample_offset > sample_count as f64)
    {
        beatgrid.truncate(pos + 1);
    }

    // Keep at most one marker at or before the start of the track
    if let Some(pos) = beatgrid.iter().position(|m| m.sample_offset > 0.0) {
        if pos > 1 {
            beatgrid.drain(..pos - 1);
        }
    } else {
        // Every marker sits at or before sample zero
        let len = beatgrid.len();
        beatgrid.drain(..len - 1);
    }

    if beatgrid.len() < 2 {
        return Err(Error::InvalidBeatgrid(
            "fewer than two markers remain after trimming".into(),
        ));
    }

    {
        let samples_per_beat = (beatgrid[1].sample_offset - beatgrid[0].sample_offset)
            / (beatgrid[1].index - beatgrid[0].index) as f64;
        let first = &mut beatgrid[0];
        first.sample_offset -= (4 + first.index) as f64 * samples_per_beat;
        first.index = -4;
    }

    {
        let last = beatgrid.len() - 1;
        let samples_per_beat = (beatgrid[last].sample_offset
            - beatgrid[last - 1].sample_offset)
            / (beatgrid[last].index - beatgrid[last - 1].index) as f64;
        let index_adjustment = ((sample_count as f64 - beatgrid[last].sample_offset)
            / samples_per_beat)
            .ceil() as i64;
        let last = &mut beatgrid[last];
        last.sample_offset += index_adjustment as f64 * samples_per_beat;
        last.index += index_adjustment;
    }

    Ok(beatgrid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(index: i64, sample_offset: f64) -> BeatgridMarker {
        BeatgridMarker {
            index,
            sample_offset,
        }
    }

    #[test]
    fn test_quantisation_number() {
        assert_eq!(waveform_quantisation_number(44100.0), 420);
        assert_eq!(waveform_quantisation_number(48000.0), 456);
    }

    #[test]
    fn test_overview_extents_law() {
        // The reference figures from the seed-data scenarios
        let extents = overview_waveform_extents(16_140_600, 44100.0);
        assert_eq!(extents.size, 1024);
        let spe = extents.samples_per_entry as u64;
        assert!(spe * 1024 <= 16_140_600);
        assert!(16_140_600 < (spe + 1) * 1024);
    }

    #[test]
    fn test_high_res_extents() {
        let extents = high_resolution_waveform_extents(16_140_600, 44100.0);
        assert_eq!(extents.samples_per_entry, 420.0);
        assert_eq!(extents.size, 16_140_600 / 420);
    }

    #[test]
    fn test_zero_sample_rate_extents() {
        let extents = overview_waveform_extents(1000, 0.0);
        assert_eq!(extents.size, 1024);
        assert_eq!(extents.samples_per_entry, 0.0);
    }

    #[test]
    fn test_normalize_extrapolates_both_ends() {
        // Two markers well inside the track
        let grid = vec![marker(0, 22050.0), marker(4, 110_250.0)];
        let normalized = normalize_beatgrid(grid, 441_000).unwrap();

        let first = normalized.first().unwrap();
        let last = normalized.last().unwrap();
        assert_eq!(first.index, -4);
        // 22050 samples per beat, so beat -4 sits at -66150
        assert_eq!(first.sample_offset, -66150.0);
        assert!(last.sample_offset >= 441_000.0);
        assert!(
            (last.sample_offset - 22050.0) < 441_000.0,
            "last marker must be the first beat past the end"
        );
    }

    #[test]
    fn test_normalize_empty_grid_is_unchanged() {
        assert_eq!(normalize_beatgrid(Vec::new(), 441_000).unwrap(), Vec::new());
    }

    #[test]
    fn test_normalize_trims_out_of_range_markers() {
        let grid = vec![
            marker(-8, -200.0),
            marker(-4, -100.0),
            marker(0, 10.0),
            marker(4, 500.0),
            marker(8, 1200.0),
            marker(12, 2400.0),
        ];
        let normalized = normalize_beatgrid(grid, 1000).unwrap();
        // Markers -8 and 12 are dropped; -4 survives as the leading anchor
        // and 8 as the terminal anchor
        assert_eq!(normalized.first().unwrap().index, -4);
        assert!(normalized.last().unwrap().sample_offset >= 1000.0);
    }

    #[test]
    fn test_normalize_single_marker_fails() {
        let grid = vec![marker(0, 100.0)];
        assert!(matches!(
            normalize_beatgrid(grid, 1000),
            Err(Error::InvalidBeatgrid(_))
        ));
    }

    #[test]
    fn test_normalize_already_normalized_is_stable() {
        let grid = vec![marker(-4, -83316.78), marker(812, 17_470_734.439)];
        let normalized = normalize_beatgrid(grid.clone(), 16_140_600).unwrap();
        let again = normalize_beatgrid(normalized.clone(), 16_140_600).unwrap();
        assert_eq!(normalized, again);
        assert_eq!(normalized.first().unwrap().index, -4);
        assert!(normalized.last().unwrap().sample_offset >= 16_140_600.0);
    }

    #[test]
    fn test_overview_subsample() {
        let waveform: Vec<WaveformEntry> = (0..4096)
            .map(|i| WaveformEntry::opaque((i % 256) as u8, 0, 0))
            .collect();
        let overview = overview_from_waveform(&waveform);
        assert_eq!(overview.len(), 1024);
        // Entry 0 samples index 4096 * 1 / 2048 = 2
        assert_eq!(overview[0], waveform[2]);
        // Entry 1023 samples index 4096 * 2047 / 2048 = 4094
        assert_eq!(overview[1023], waveform[4094]);
    }

    #[test]
    fn test_overview_subsample_identity_at_1024() {
        let waveform: Vec<WaveformEntry> = (0..1024)
            .map(|i| WaveformEntry::opaque((i % 256) as u8, 1, 2))
            .collect();
        assert_eq!(overview_from_waveform(&waveform), waveform);
    }
}
