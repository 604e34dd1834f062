//! Lock-protected circular store of mono 16-bit PCM samples with sliding-window read access.
//!
//! The ring tracks three independent logical cursors (write, read, and window) against one
//! backing array. All three only ever move forward; "looking backward" from the window cursor is
//! expressed as a negative `offset` to `window_read`, not by moving the cursor itself. Logical
//! positions are u64 counters that never wrap; only the backing-array index wraps, via a
//! power-of-two mask.

use std::sync::Mutex;

use thiserror::Error;

/// Failure modes for ring operations. Never carries partial data: a ring op either returns
/// exactly what was asked for or an error, never a truncated buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    #[error("requested {requested} samples, only {available} available")]
    NotEnoughData { requested: usize, available: usize },

    #[error("window read [{start}, {end}) is outside the live range [{live_start}, {live_end})")]
    OutOfLiveRange {
        start: i64,
        end: i64,
        live_start: i64,
        live_end: i64,
    },
}

/// Core ring logic, free of any locking. Exercised directly in unit tests; wrapped in a `Mutex`
/// by [`PcmRing`] for the concurrent case the framework actually needs.
struct Ring {
    data: Vec<i16>,
    mask: usize,
    write_pos: u64,
    read_pos: u64,
    window_pos: u64,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        Self {
            data: vec![0; capacity],
            mask: capacity - 1,
            write_pos: 0,
            read_pos: 0,
            window_pos: 0,
        }
    }

    fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    fn oldest_live(&self) -> u64 {
        self.write_pos.saturating_sub(self.capacity())
    }

    fn index(&self, logical: u64) -> usize {
        (logical as usize) & self.mask
    }

    fn write(&mut self, samples: &[i16]) {
        for &s in samples {
            let idx = self.index(self.write_pos);
            self.data[idx] = s;
            self.write_pos += 1;
        }
        let oldest = self.oldest_live();
        if self.read_pos < oldest {
            self.read_pos = oldest;
        }
        if self.window_pos < oldest {
            self.window_pos = oldest;
        }
    }

    fn read(&mut self, n: usize) -> Result<Vec<i16>, RingError> {
        let available = self.write_pos.saturating_sub(self.read_pos);
        if available < n as u64 {
            return Err(RingError::NotEnoughData {
                requested: n,
                available: available as usize,
            });
        }
        let mut out = Vec::with_capacity(n);
        for i in 0..n as u64 {
            out.push(self.data[self.index(self.read_pos + i)]);
        }
        self.read_pos += n as u64;
        Ok(out)
    }

    fn window_read(&self, offset: i64, length: usize) -> Result<Vec<i16>, RingError> {
        let start = self.window_pos as i64 + offset;
        let end = start + length as i64;
        let live_start = self.oldest_live() as i64;
        let live_end = self.write_pos as i64;

        if start < live_start || end > live_end || start > end {
            return Err(RingError::OutOfLiveRange {
                start,
                end,
                live_start,
                live_end,
            });
        }

        let mut out = Vec::with_capacity(length);
        for i in 0..length as i64 {
            out.push(self.data[self.index((start + i) as u64)]);
        }
        Ok(out)
    }

    fn advance_window(&mut self, n: usize) {
        self.window_pos += n as u64;
    }

    fn available(&self) -> usize {
        self.write_pos
            .saturating_sub(self.read_pos)
            .min(self.capacity()) as usize
    }

    fn reset(&mut self) {
        self.data.fill(0);
        self.write_pos = 0;
        self.read_pos = 0;
        self.window_pos = 0;
    }
}

/// Thread-safe PCM ring buffer. Owned by a single extension instance: only its forwarding
/// subtask writes, only its main loop reads and window-reads, but both tasks touch it, so access
/// is still mutex-guarded.
pub struct PcmRing {
    inner: Mutex<Ring>,
}

impl PcmRing {
    /// Build a ring with an explicit capacity. Must be a power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ring::new(capacity)),
        }
    }

    /// Size a ring for SSTV use at the given sample rate: enough to hold roughly 1.3s of audio
    /// (a full VIS preamble plus margin), rounded up to the next power of two.
    ///
    /// The legacy 4096-sample constant some reference implementations use is deliberately not
    /// reproduced here; it's shorter than a full VIS preamble at typical SSTV sample rates.
    pub fn with_sstv_capacity(sample_rate_hz: u32) -> Self {
        let min_samples = (sample_rate_hz as f64 * 1.3).ceil() as usize;
        Self::with_capacity(min_samples.max(1).next_power_of_two())
    }

    pub fn write(&self, samples: &[i16]) {
        self.inner.lock().unwrap().write(samples);
    }

    pub fn read(&self, n: usize) -> Result<Vec<i16>, RingError> {
        self.inner.lock().unwrap().read(n)
    }

    /// Return `length` samples starting at `window_cursor + offset` without consuming them.
    /// Negative `offset` looks backward from the window cursor.
    pub fn window_read(&self, offset: i64, length: usize) -> Result<Vec<i16>, RingError> {
        self.inner.lock().unwrap().window_read(offset, length)
    }

    pub fn advance_window(&self, n: usize) {
        self.inner.lock().unwrap().advance_window(n);
    }

    pub fn available(&self) -> usize {
        self.inner.lock().unwrap().available()
    }

    pub fn reset(&self) {
        self.inner.lock().unwrap().reset();
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let ring = PcmRing::with_capacity(16);
        ring.write(&[1, 2, 3, 4]);
        assert_eq!(ring.available(), 4);
        let out = ring.read(4).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn read_more_than_available_errors() {
        let ring = PcmRing::with_capacity(16);
        ring.write(&[1, 2]);
        let err = ring.read(3).unwrap_err();
        assert_eq!(
            err,
            RingError::NotEnoughData {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn overwrite_pulls_read_cursor_forward() {
        let ring = PcmRing::with_capacity(4);
        ring.write(&[1, 2, 3, 4]);
        ring.write(&[5, 6]); // overflows by 2, oldest two samples (1,2) are gone
        assert_eq!(ring.available(), 4);
        let out = ring.read(4).unwrap();
        assert_eq!(out, vec![3, 4, 5, 6]);
    }

    #[test]
    fn window_read_looks_backward_and_forward() {
        let ring = PcmRing::with_capacity(16);
        ring.write(&[10, 20, 30, 40, 50]);
        ring.advance_window(2); // window cursor now at logical position 2 (value 30)
        assert_eq!(ring.window_read(0, 1).unwrap(), vec![30]);
        assert_eq!(ring.window_read(-2, 2).unwrap(), vec![10, 20]);
        assert_eq!(ring.window_read(1, 2).unwrap(), vec![40, 50]);
    }

    #[test]
    fn window_read_outside_live_range_errors() {
        let ring = PcmRing::with_capacity(4);
        ring.write(&[1, 2, 3, 4, 5, 6]); // live range is now [2, 6)
        ring.advance_window(2);
        assert!(ring.window_read(-3, 1).is_err()); // asks for logical pos -1
        assert!(ring.window_read(0, 10).is_err()); // runs past write cursor
    }

    #[test]
    fn advance_window_past_write_then_blocks_until_data_arrives() {
        let ring = PcmRing::with_capacity(8);
        ring.write(&[1, 2]);
        ring.advance_window(5); // window cursor now ahead of data that exists
        assert!(ring.window_read(0, 1).is_err());
        ring.write(&[3, 4, 5, 6]);
        assert_eq!(ring.window_read(0, 1).unwrap(), vec![6]);
    }

    #[test]
    fn reset_clears_all_cursors() {
        let ring = PcmRing::with_capacity(8);
        ring.write(&[1, 2, 3]);
        let _ = ring.read(1);
        ring.reset();
        assert_eq!(ring.available(), 0);
        ring.write(&[9]);
        assert_eq!(ring.read(1).unwrap(), vec![9]);
    }

    #[test]
    fn sstv_capacity_is_at_least_1_3_seconds_and_a_power_of_two() {
        let ring = PcmRing::with_sstv_capacity(12_000);
        assert!(ring.capacity() >= (12_000.0 * 1.3) as usize);
        assert!(ring.capacity().is_power_of_two());
    }

    // Available() always equals (total written - total read),
    // clipped to capacity, across an interleaved sequence of operations.
    #[test]
    fn available_matches_written_minus_read_clipped_to_capacity() {
        let cap = 8usize;
        let ring = PcmRing::with_capacity(cap);
        let mut total_written = 0usize;
        let mut total_read = 0usize;

        ring.write(&[1, 2, 3]);
        total_written += 3;
        assert_eq!(ring.available(), (total_written - total_read).min(cap));

        ring.write(&[4, 5, 6, 7, 8, 9]); // overflow past capacity
        total_written += 6;
        assert_eq!(ring.available(), (total_written - total_read).min(cap));

        let n = ring.available();
        ring.read(n).unwrap();
        total_read += n;
        assert_eq!(ring.available(), 0);
    }
}
