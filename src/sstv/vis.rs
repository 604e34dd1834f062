//! Streaming VIS (Vertical Interval Signaling) header detector.
//!
//! Consumes the PCM ring ten milliseconds at a time, keeps a rolling history of tone-frequency
//! estimates, and looks for the VIS leader/start-bit/data-bits/stop-bit pattern described in
//! Detection never "fails" permanently: a parity mismatch or an unrecognized code just
//! resets the internal state machine back to scanning, exactly like the surrounding orchestrator
//! expects.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::fft::{self, gaussian_peak_refine, hann_window};
use crate::ring::PcmRing;
use crate::sstv::mode_table::{self, ModeId, VisResolution};

const STEP_SECONDS: f64 = 0.010;
const WINDOW_SECONDS: f64 = 0.020;
const FFT_SIZE: usize = 2048;
const HEADER_BUF_CAP: usize = 100;
const BIT_SECONDS: f64 = 0.030;
const LEADER_TONES: usize = 4;
const LEADER_TOLERANCE_HZ: f64 = 25.0;
const NOMINAL_VIS_TONE_HZ: f64 = 1900.0;
const START_BIT_OFFSET_HZ: f64 = 700.0;
const ZERO_BIT_OFFSET_HZ: f64 = 600.0;
const ONE_BIT_OFFSET_HZ: f64 = 800.0;

/// Result of a completed VIS header decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedVis {
    pub mode_id: ModeId,
    pub header_shift_hz: f64,
    pub extended: bool,
}

#[derive(Debug, Clone)]
enum State {
    Scanning,
    ReadingPayload {
        f0: f64,
        samples_per_bit: usize,
        collected: Vec<f64>,
    },
}

pub struct VisDetector {
    ring: Arc<PcmRing>,
    sample_rate: u32,
    window_initialized: bool,
    header_buf: VecDeque<f64>,
    last_freq_estimate: f64,
    state: State,
}

impl VisDetector {
    pub fn new(ring: Arc<PcmRing>, sample_rate: u32) -> Self {
        Self {
            ring,
            sample_rate,
            window_initialized: false,
            header_buf: VecDeque::with_capacity(HEADER_BUF_CAP),
            last_freq_estimate: NOMINAL_VIS_TONE_HZ,
            state: State::Scanning,
        }
    }

    fn step_samples(&self) -> usize {
        (self.sample_rate as f64 * STEP_SECONDS).round() as usize
    }

    fn window_samples(&self) -> usize {
        (self.sample_rate as f64 * WINDOW_SECONDS).round() as usize
    }

    fn samples_per_bit(&self) -> usize {
        (BIT_SECONDS / STEP_SECONDS).round() as usize
    }

    /// Advance by one 10ms step. Returns `Some` exactly when a legal VIS header completes on
    /// this step.
    pub fn poll(&mut self) -> Option<DetectedVis> {
        if !self.window_initialized {
            if self.ring.available() < self.ring.capacity() / 2 {
                return None;
            }
            self.ring.advance_window(self.ring.capacity() / 2);
            self.window_initialized = true;
        }

        let step = self.step_samples();
        let window_len = self.window_samples();
        let samples = self.ring.window_read(-(step as i64), window_len).ok()?;
        self.ring.advance_window(step);

        let freq = self.estimate_tone_frequency(&samples);
        self.header_buf.push_back(freq);
        if self.header_buf.len() > HEADER_BUF_CAP {
            self.header_buf.pop_front();
        }

        self.advance_state(freq)
    }

    fn estimate_tone_frequency(&mut self, samples: &[i16]) -> f64 {
        let hann = hann_window(samples.len());
        let mut buf = vec![0.0f64; FFT_SIZE];
        for (i, (&s, &w)) in samples.iter().zip(hann.iter()).enumerate() {
            if i >= buf.len() {
                break;
            }
            buf[i] = (s as f64 / 32768.0) * w;
        }

        let bins = fft::forward(&buf);
        let powers: Vec<f64> = bins[..FFT_SIZE / 2].iter().map(|c| c.power()).collect();

        let bin_hz = self.sample_rate as f64 / FFT_SIZE as f64;
        let lo = ((500.0 / bin_hz).round() as usize).max(1);
        let hi = ((3300.0 / bin_hz).round() as usize).min(powers.len().saturating_sub(2));
        if lo >= hi {
            return self.last_freq_estimate;
        }

        let (peak_bin, _) = powers[lo..=hi]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, p)| (i + lo, *p))
            .unwrap();

        if peak_bin == 0 || peak_bin + 1 >= powers.len() {
            return self.last_freq_estimate;
        }

        let delta =
            gaussian_peak_refine(powers[peak_bin - 1], powers[peak_bin], powers[peak_bin + 1]);
        if !(-1.0..=1.0).contains(&delta) {
            return self.last_freq_estimate;
        }

        let freq = (peak_bin as f64 + delta) * bin_hz;
        self.last_freq_estimate = freq;
        freq
    }

    fn advance_state(&mut self, freq: f64) -> Option<DetectedVis> {
        match &mut self.state {
            State::Scanning => {
                if self.header_buf.len() < LEADER_TONES + 1 {
                    return None;
                }
                let recent: Vec<f64> = self
                    .header_buf
                    .iter()
                    .rev()
                    .take(LEADER_TONES + 1)
                    .copied()
                    .collect();
                // `recent` is newest-first; reverse to oldest-first for readability.
                let recent: Vec<f64> = recent.into_iter().rev().collect();
                let leader = &recent[..LEADER_TONES];
                let start_bit = recent[LEADER_TONES];

                let f0 = leader.iter().sum::<f64>() / LEADER_TONES as f64;
                let leader_locked = leader.iter().all(|t| (t - f0).abs() <= LEADER_TOLERANCE_HZ);
                let start_bit_locked =
                    (start_bit - (f0 - START_BIT_OFFSET_HZ)).abs() <= LEADER_TOLERANCE_HZ;

                if leader_locked && start_bit_locked {
                    // `start_bit` is this same step's tone; carry it into the payload period
                    // count instead of dropping it, or every later bit period ends up shifted
                    // by one 10ms step relative to what `f0`/`START_BIT_OFFSET_HZ` assume.
                    self.state = State::ReadingPayload {
                        f0,
                        samples_per_bit: self.samples_per_bit(),
                        collected: vec![start_bit],
                    };
                }
                None
            }
            State::ReadingPayload {
                f0,
                samples_per_bit,
                collected,
            } => {
                collected.push(freq);
                let f0 = *f0;
                let spb = *samples_per_bit;

                // Try the short (8-bit payload + 1 stop bit) framing first.
                if collected.len() == spb * 9 {
                    if let Some(result) = decode_payload(&collected[..spb * 9], f0, spb, false) {
                        self.state = State::Scanning;
                        return Some(result);
                    }
                }
                // Fall back to the extended (16-bit payload + 1 stop bit) framing.
                if collected.len() == spb * 17 {
                    let result = decode_payload(&collected[..spb * 17], f0, spb, true);
                    self.state = State::Scanning;
                    return result;
                }
                None
            }
        }
    }
}

/// Decode a fixed run of per-10ms tone estimates into a VIS result, given the leader frequency
/// `f0`, `samples_per_bit` estimates per bit period, and whether this is the extended (16-bit)
/// framing. `periods` holds exactly `bit_count + 1` bit periods worth of samples (data+parity
/// bits, then the stop bit).
fn decode_payload(periods: &[f64], f0: f64, spb: usize, extended: bool) -> Option<DetectedVis> {
    let bit_count = if extended { 16 } else { 8 };
    debug_assert_eq!(periods.len(), spb * (bit_count + 1));

    let period_avg = |i: usize| -> f64 {
        let slice = &periods[i * spb..(i + 1) * spb];
        slice.iter().sum::<f64>() / spb as f64
    };

    let mut bits = Vec::with_capacity(bit_count);
    for i in 0..bit_count {
        let avg = period_avg(i);
        let d0 = (avg - (f0 - ZERO_BIT_OFFSET_HZ)).abs();
        let d1 = (avg - (f0 - ONE_BIT_OFFSET_HZ)).abs();
        bits.push(if d1 < d0 { 1u8 } else { 0u8 });
    }

    let stop_avg = period_avg(bit_count);
    let stop_expected = f0 - START_BIT_OFFSET_HZ;
    if (stop_avg - stop_expected).abs() > LEADER_TOLERANCE_HZ {
        return None;
    }

    // The payload code occupies the low 7 bits (LSB first); any bits beyond that (only present
    // in the extended framing) are not used by the 128-entry VIS maps.
    let mut code: u8 = 0;
    for (i, &b) in bits.iter().take(7).enumerate() {
        code |= b << i;
    }
    let parity_bit = bits[7];

    let resolution = mode_table::resolve_vis(code, extended)?;
    let mode_id = match resolution {
        VisResolution::Short(id) | VisResolution::Extended(id) => id,
    };

    let mut expected_parity = bits[..7].iter().fold(0u8, |acc, &b| acc ^ b);
    if mode_table::mode_by_id(mode_id).short_name == "R12BW" {
        expected_parity ^= 1;
    }
    if expected_parity != parity_bit {
        return None;
    }

    Some(DetectedVis {
        mode_id,
        header_shift_hz: f0 - NOMINAL_VIS_TONE_HZ,
        extended,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// Generate a contiguous PCM burst of `duration_s` seconds at `freq` Hz.
    fn tone(freq: f64, duration_s: f64, sample_rate: u32) -> Vec<i16> {
        let n = (duration_s * sample_rate as f64).round() as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (8000.0 * (2.0 * PI * freq * t).sin()) as i16
            })
            .collect()
    }

    /// Build a full VIS burst (silence, leader, start bit, 8 payload bits, stop bit) for
    /// `vis_code`, optionally shifted by `shift_hz`, optionally with one payload bit flipped
    /// (without correcting parity) to exercise the rejection path.
    fn synth_vis_burst(vis_code: u8, shift_hz: f64, flip_bit: Option<usize>, sample_rate: u32) -> Vec<i16> {
        let f0 = NOMINAL_VIS_TONE_HZ + shift_hz;
        let mut out = Vec::new();
        out.extend(vec![0i16; (0.3 * sample_rate as f64) as usize]);
        out.extend(tone(f0, 0.3, sample_rate));
        out.extend(tone(f0 - START_BIT_OFFSET_HZ, BIT_SECONDS, sample_rate));

        let mut bits = Vec::with_capacity(8);
        for i in 0..7 {
            bits.push((vis_code >> i) & 1);
        }
        if let Some(i) = flip_bit {
            bits[i] ^= 1;
        }
        let parity = bits.iter().fold(0u8, |acc, &b| acc ^ b);
        bits.push(parity);

        for &b in &bits {
            let f = if b == 1 { f0 - ONE_BIT_OFFSET_HZ } else { f0 - ZERO_BIT_OFFSET_HZ };
            out.extend(tone(f, BIT_SECONDS, sample_rate));
        }
        out.extend(tone(f0 - START_BIT_OFFSET_HZ, BIT_SECONDS, sample_rate));
        out
    }

    fn run_detector(samples: &[i16], sample_rate: u32) -> Option<DetectedVis> {
        let ring = Arc::new(PcmRing::with_sstv_capacity(sample_rate));
        let mut detector = VisDetector::new(ring.clone(), sample_rate);
        let step = (sample_rate as f64 * STEP_SECONDS) as usize;

        let mut result = None;
        for chunk in samples.chunks(step) {
            ring.write(chunk);
            if let Some(d) = detector.poll() {
                result = Some(d);
                break;
            }
        }
        // Drain remaining silence so the window can continue catching up to the tail.
        if result.is_none() {
            let tail = vec![0i16; step * 20];
            for chunk in tail.chunks(step) {
                ring.write(chunk);
                if let Some(d) = detector.poll() {
                    result = Some(d);
                    break;
                }
            }
        }
        result
    }

    #[test]
    fn detects_martin_m1_vis_code() {
        let sample_rate = 12_000;
        let samples = synth_vis_burst(0x2C, 0.0, None, sample_rate);
        let result = run_detector(&samples, sample_rate);
        let result = result.expect("expected a VIS detection");
        assert_eq!(mode_table::mode_by_id(result.mode_id).name, "Martin M1");
        assert!(result.header_shift_hz.abs() <= 5.0);
        assert!(!result.extended);
    }

    #[test]
    fn detects_frequency_offset() {
        let sample_rate = 12_000;
        let samples = synth_vis_burst(0x2C, 50.0, None, sample_rate);
        let result = run_detector(&samples, sample_rate).expect("expected a VIS detection");
        assert_eq!(mode_table::mode_by_id(result.mode_id).name, "Martin M1");
        assert!((45.0..=55.0).contains(&result.header_shift_hz));
    }

    #[test]
    fn rejects_payload_with_bad_parity() {
        let sample_rate = 12_000;
        let samples = synth_vis_burst(0x2C, 0.0, Some(3), sample_rate);
        let result = run_detector(&samples, sample_rate);
        assert!(result.is_none());
    }
}
