//! 45.45-baud FSK callsign ID decoder: follows the SSTV image as an optional trailer,
//! framed by a fixed sync pair and terminated by an all-zero character or a timeout.

use std::sync::Arc;

use crate::fft::hann_window;
use crate::ring::PcmRing;

const BAUD_HZ: f64 = 45.45;
const LOW_TONE_HZ: f64 = 1900.0;
const HIGH_TONE_HZ: f64 = 2100.0;
const SYNC_BYTE_0: u8 = 0x20;
const SYNC_BYTE_1: u8 = 0x2A;
const PREAMBLE_TIMEOUT_SECONDS: f64 = 3.0;
const TOTAL_TIMEOUT_SECONDS: f64 = 5.0;
const MAX_CALLSIGN_CHARS: usize = 10;

/// 6-bit reverse-bit lookup: the shift register accumulates LSB-first but characters are
/// transmitted MSB-first, so each completed byte's low 6 bits need reversing before ASCII offset.
const REVERSE6: [u8; 64] = build_reverse6();

const fn build_reverse6() -> [u8; 64] {
    let mut table = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        let mut v = i as u8;
        let mut r = 0u8;
        let mut b = 0;
        while b < 6 {
            r = (r << 1) | (v & 1);
            v >>= 1;
            b += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FskId {
    pub callsign: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingSync,
    ReadingChars,
}

pub struct FskDecoder {
    ring: Arc<PcmRing>,
    sample_rate: u32,
    samples_per_bit: usize,
    shift_register: u32,
    bits_seen: u32,
    chars: Vec<u8>,
    state: State,
    samples_elapsed: usize,
    preamble_deadline: usize,
    total_deadline: usize,
}

impl FskDecoder {
    pub fn new(ring: Arc<PcmRing>, sample_rate: u32) -> Self {
        Self {
            ring,
            sample_rate,
            samples_per_bit: (sample_rate as f64 / BAUD_HZ).round() as usize,
            shift_register: 0,
            bits_seen: 0,
            chars: Vec::new(),
            state: State::SeekingSync,
            samples_elapsed: 0,
            preamble_deadline: (PREAMBLE_TIMEOUT_SECONDS * sample_rate as f64) as usize,
            total_deadline: (TOTAL_TIMEOUT_SECONDS * sample_rate as f64) as usize,
        }
    }

    fn classify_bit(&self, samples: &[i16]) -> Option<bool> {
        let n = samples.len().next_power_of_two();
        if n < 8 {
            return None;
        }
        let hann = hann_window(samples.len());
        let mut buf = vec![0.0; n];
        for (i, (&s, &w)) in samples.iter().zip(hann.iter()).enumerate() {
            buf[i] = (s as f64 / 32768.0) * w;
        }
        let bins = crate::fft::forward(&buf);
        let powers: Vec<f64> = bins[..n / 2].iter().map(|c| c.power()).collect();
        let bin_hz = self.sample_rate as f64 / n as f64;

        let low_bin = (LOW_TONE_HZ / bin_hz).round() as usize;
        let high_bin = (HIGH_TONE_HZ / bin_hz).round() as usize;
        if high_bin >= powers.len() {
            return None;
        }
        let low_power = powers[low_bin];
        let high_power = powers[high_bin];
        // "1" is the high tone per the conventional FSK ID mark/space assignment.
        Some(high_power > low_power)
    }

    /// Consumes one bit period from the ring and advances the framing state machine. Returns
    /// `Some(id)` once a terminator character (0x00) closes out the callsign, `None` while still
    /// reading, and `Err(())` on preamble/total timeout (caller should reset and rescan).
    pub fn poll(&mut self) -> Result<Option<FskId>, ()> {
        if self.samples_elapsed > self.total_deadline {
            return Err(());
        }
        if self.state == State::SeekingSync && self.samples_elapsed > self.preamble_deadline {
            return Err(());
        }

        let Ok(samples) = self.ring.window_read(0, self.samples_per_bit) else {
            return Ok(None);
        };
        self.ring.advance_window(self.samples_per_bit);
        self.samples_elapsed += self.samples_per_bit;

        let Some(bit) = self.classify_bit(&samples) else {
            return Ok(None);
        };

        self.shift_register = (self.shift_register >> 1) | ((bit as u32) << 23);
        self.bits_seen += 1;

        match self.state {
            State::SeekingSync => {
                if self.bits_seen >= 16 {
                    let window = (self.shift_register >> 8) as u16;
                    let b0 = (window & 0xFF) as u8;
                    let b1 = (window >> 8) as u8;
                    if b0 == SYNC_BYTE_0 && b1 == SYNC_BYTE_1 {
                        self.state = State::ReadingChars;
                        self.bits_seen = 0;
                    }
                }
                Ok(None)
            }
            State::ReadingChars => {
                if self.bits_seen == 6 {
                    let raw = (self.shift_register >> 18) as u8 & 0x3F;
                    let reversed = REVERSE6[raw as usize];
                    self.bits_seen = 0;
                    if reversed == 0 || self.chars.len() >= MAX_CALLSIGN_CHARS {
                        let callsign = String::from_utf8_lossy(&self.chars).trim().to_string();
                        return Ok(Some(FskId { callsign }));
                    }
                    if reversed >= 0x0D {
                        self.chars.push(reversed + b' ');
                    }
                }
                Ok(None)
            }
        }
    }
}
