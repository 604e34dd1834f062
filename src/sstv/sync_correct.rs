//! Sync-pulse Hough correction: estimates an effective sample rate and a line-start offset
//! from a demodulated sync map, so a single clock-drift reading corrects every scanline rather
//! than just the first.

use std::f64::consts::PI;

use crate::sstv::mode_table::ModeSpec;

const MAX_RETRIES: u32 = 3;
const ANGLE_STEPS: usize = 180;
const ANGLE_RANGE_DEG: f64 = 2.0;
const HIST_BINS: usize = 700;
const EDGE_FILTER: [f64; 8] = [1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedTiming {
    pub effective_sample_rate: f64,
    pub line_start_skip: f64,
}

/// Rasterize the boolean sync map into an (x, y) point cloud in (sample-within-line, line-index)
/// space, using the mode's nominal line period to fold samples into rows.
fn draw_points(sync_map: &[bool], mode: &ModeSpec, sample_rate: u32) -> Vec<(f64, f64)> {
    let samples_per_line = mode.line_time * sample_rate as f64;
    let mut points = Vec::new();
    for (i, &is_sync) in sync_map.iter().enumerate() {
        if !is_sync {
            continue;
        }
        // Each sync-map entry represents 13 raw samples (the demodulator's sync-detection cadence).
        let sample_n = i as f64 * 13.0;
        let line = (sample_n / samples_per_line).floor();
        let x = sample_n - line * samples_per_line;
        points.push((x, line));
    }
    points
}

/// A single rate-adjustment attempt: with no clock drift, the sync column sits at a roughly
/// constant sample offset on every line, which is a *vertical* line in (x = phase-in-line,
/// y = line index) space. In the `d = -x·sinθ + y·cosθ` parameterization that line maximizes its
/// Hough vote at θ = 90°, so the accumulator is swept over a small range around there rather than
/// around 0°. Drift shows up as a small deviation of the winning angle away from 90°.
fn hough_best_angle(points: &[(f64, f64)]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let mut best_angle = PI / 2.0;
    let mut best_votes = 0usize;

    for step in 0..ANGLE_STEPS {
        let deg = 90.0 - ANGLE_RANGE_DEG + 2.0 * ANGLE_RANGE_DEG * step as f64 / (ANGLE_STEPS - 1) as f64;
        let theta = deg.to_radians();
        let mut buckets = std::collections::HashMap::new();
        for &(x, y) in points {
            let d = (-x * theta.sin() + y * theta.cos()).round() as i64;
            *buckets.entry(d).or_insert(0usize) += 1;
        }
        if let Some(&votes) = buckets.values().max() {
            if votes > best_votes {
                best_votes = votes;
                best_angle = theta;
            }
        }
    }

    // Deviation of the winning angle from the no-drift case (θ = 90°) is, for small angles, the
    // per-line sample drift directly (see module docs on the (x, y) parameterization).
    Some(PI / 2.0 - best_angle)
}

/// Iteratively adjusts the sample rate to align detected sync pulses onto a straight vertical
/// line, up to `MAX_RETRIES` attempts, reverting to the nominal rate if it never converges.
pub fn correct_rate(sync_map: &[bool], mode: &ModeSpec, nominal_sample_rate: u32) -> f64 {
    let samples_per_line = mode.line_time * nominal_sample_rate as f64;
    let mut rate = nominal_sample_rate as f64;

    for _ in 0..MAX_RETRIES {
        let points = draw_points(sync_map, mode, rate.round() as u32);
        let Some(drift_per_line) = hough_best_angle(&points) else {
            break;
        };
        let delta = drift_per_line * rate / samples_per_line;
        if delta.abs() < 0.01 {
            return rate;
        }
        rate -= delta;
        if !rate.is_finite() || rate <= 0.0 {
            return nominal_sample_rate as f64;
        }
    }

    rate
}

/// Locates the sample offset of the first line's sync pulse using a 700-bin histogram of sync
/// activity convolved with an 8-tap edge filter, picking the strongest falling edge (high sync
/// activity in the leading taps, low in the trailing ones).
pub fn find_line_start_offset(sync_map: &[bool], mode: &ModeSpec, sample_rate: u32) -> f64 {
    let samples_per_line = mode.line_time * sample_rate as f64;
    let bin_width = samples_per_line / HIST_BINS as f64;
    let mut histogram = vec![0u32; HIST_BINS];

    for (i, &is_sync) in sync_map.iter().enumerate() {
        if !is_sync {
            continue;
        }
        let sample_n = i as f64 * 13.0;
        let phase = sample_n % samples_per_line;
        let bin = ((phase / bin_width) as usize).min(HIST_BINS - 1);
        histogram[bin] += 1;
    }

    let mut best_bin = 0usize;
    let mut best_response = f64::MIN;
    for center in 4..HIST_BINS - 4 {
        let mut response = 0.0;
        for (k, &tap) in EDGE_FILTER.iter().enumerate() {
            let idx = center + k - 4;
            response += tap * histogram[idx] as f64;
        }
        if response > best_response {
            best_response = response;
            best_bin = center;
        }
    }

    best_bin as f64 * bin_width
}

/// Runs the full correction pipeline, including the Scottie-family porch/pixel-time nudge that
/// compensates for those modes' asymmetric sync placement.
pub fn correct(sync_map: &[bool], mode: &ModeSpec, nominal_sample_rate: u32) -> CorrectedTiming {
    let rate = correct_rate(sync_map, mode, nominal_sample_rate);
    let mut skip = find_line_start_offset(sync_map, mode, rate.round() as u32);

    if mode.short_name.starts_with('S') && mode.short_name != "unknown" {
        skip += (mode.porch_time + mode.separator_time) * rate * 0.5;
    }

    CorrectedTiming {
        effective_sample_rate: rate,
        line_start_skip: skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sstv::mode_table::MODES;

    fn synth_sync_map(mode: &ModeSpec, sample_rate: u32, lines: usize) -> Vec<bool> {
        let samples_per_line = mode.line_time * sample_rate as f64;
        let total_samples = (samples_per_line * lines as f64) as usize;
        let mut map = vec![false; total_samples / 13 + 1];
        for i in 0..map.len() {
            let sample_n = i as f64 * 13.0;
            let phase = sample_n % samples_per_line;
            if phase < mode.sync_time * sample_rate as f64 {
                map[i] = true;
            }
        }
        map
    }

    #[test]
    fn nominal_rate_sync_map_needs_no_correction() {
        let mode = &MODES[0];
        let sample_rate = 44_100u32;
        let map = synth_sync_map(mode, sample_rate, 20);
        let timing = correct(&map, mode, sample_rate);
        let ratio = timing.effective_sample_rate / sample_rate as f64;
        assert!((ratio - 1.0).abs() < 0.05, "ratio={ratio}");
    }

    #[test]
    fn line_start_offset_is_within_one_sync_pulse_width() {
        let mode = &MODES[0];
        let sample_rate = 44_100u32;
        let map = synth_sync_map(mode, sample_rate, 20);
        let offset = find_line_start_offset(&map, mode, sample_rate);
        assert!(offset >= 0.0);
        assert!(offset < mode.line_time * sample_rate as f64);
    }

    #[test]
    fn empty_sync_map_keeps_nominal_rate() {
        let mode = &MODES[0];
        let sample_rate = 44_100u32;
        let map = vec![false; 1000];
        let rate = correct_rate(&map, mode, sample_rate);
        assert_eq!(rate, sample_rate as f64);
    }
}
