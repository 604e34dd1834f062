//! A constant-frequency tone fed straight into the video demodulator, bypassing VIS detection
//! entirely, should produce luminance values clustered tightly around the frequency-to-luma
//! mapping's midpoint.

use std::sync::Arc;

use sstv_ext::ring::PcmRing;
use sstv_ext::sstv::demod::VideoDemodulator;
use sstv_ext::sstv::mode_table::{ColorEncoding, ModeSpec, ScanlineFormat};

const TEST_MODE: ModeSpec = ModeSpec {
    name: "test-bw",
    short_name: "TBW",
    vis_code: 0xFF,
    sync_time: 0.0,
    porch_time: 0.0,
    separator_time: 0.0,
    pixel_time: 0.005,
    line_time: 0.08,
    width: 16,
    num_lines: 8,
    line_height: 1,
    color: ColorEncoding::Bw,
    format: ScanlineFormat::Bw,
    unsupported: false,
};

fn tone(freq: f64, n: usize, sample_rate: u32) -> Vec<i16> {
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (8000.0 * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16
        })
        .collect()
}

#[test]
fn pure_tone_clusters_around_expected_luminance() {
    let sample_rate = 12_000u32;
    let ring = Arc::new(PcmRing::with_capacity(65536));
    let samples = tone(1900.0, 32_000, sample_rate);
    ring.write(&samples);

    let mut demod = VideoDemodulator::new(ring, &TEST_MODE, sample_rate, 0.0);
    let mut luma_samples = Vec::new();
    demod
        .step(|line| {
            for px in line.rgb.chunks_exact(3) {
                luma_samples.push(px[0] as f64);
            }
            Ok(true)
        })
        .unwrap();

    assert!(!luma_samples.is_empty());
    let mean = luma_samples.iter().sum::<f64>() / luma_samples.len() as f64;
    let variance =
        luma_samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / luma_samples.len() as f64;
    let std_dev = variance.sqrt();

    let expected = (1900.0 - 1500.0) / 3.1372549;
    assert!((mean - expected).abs() < 40.0, "mean={mean} expected={expected}");
    assert!(std_dev < 20.0, "std_dev={std_dev}");
}
