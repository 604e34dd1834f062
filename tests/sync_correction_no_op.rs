//! A sync map with a perfectly straight column of sync hits (no drift) should leave the sample
//! rate essentially unchanged: the Hough correction step is a no-op on already-aligned input.

use sstv_ext::sstv::mode_table::MODES;
use sstv_ext::sstv::sync_correct::correct;

#[test]
fn straight_sync_column_keeps_nominal_rate() {
    let mode = &MODES[0];
    let sample_rate = 12_000u32;
    let samples_per_line = mode.line_time * sample_rate as f64;
    let lines = 30;
    let total_samples = (samples_per_line * lines as f64) as usize;
    let entries = total_samples / 13 + 1;

    let mut sync_map = vec![false; entries];
    for i in 0..entries {
        let sample_n = i as f64 * 13.0;
        let phase = sample_n % samples_per_line;
        if phase < 13.0 {
            sync_map[i] = true;
        }
    }

    let timing = correct(&sync_map, mode, sample_rate);
    let relative_drift =
        (timing.effective_sample_rate - sample_rate as f64).abs() / sample_rate as f64;
    assert!(relative_drift < 0.01, "rate drifted to {}", timing.effective_sample_rate);
}
