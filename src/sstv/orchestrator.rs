//! Top-level SSTV decode state machine: owns a `PcmRing`, drives the VIS detector, video
//! demodulator, sync corrector, and FSK ID decoder in sequence, and emits a stream of [`SstvEvent`]
//! values that the framework layer frames onto the wire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::sstv::demod::{DemodOutcome, ImageLine, VideoDemodulator};
use crate::sstv::fsk::FskDecoder;
use crate::sstv::mode_table::{effective_num_lines, longest_transmission_seconds, mode_by_id, ModeSpec};
use crate::sstv::sync_correct;
use crate::sstv::vis::{DetectedVis, VisDetector};
use crate::ring::PcmRing;

const SAMPLE_RATE_HZ: u32 = 11_025;
const STARVATION_TIMEOUT_SECONDS: f64 = 30.0;
/// Margin on top of the longest mode's image time: VIS leader/header plus an FSK ID trailer.
const RING_MARGIN_SECONDS: f64 = 6.0;

#[derive(Debug, Clone)]
pub enum SstvEvent {
    ModeDetected { mode: &'static str, header_shift_hz: f64 },
    ImageStart { width: u32, height: u32 },
    ImageLine(ImageLine),
    ImageComplete,
    Redraw,
    FskId { callsign: String },
    UnsupportedMode { mode: &'static str },
    Reset,
}

struct VideoPass {
    demod: VideoDemodulator,
    mode: &'static ModeSpec,
    header_shift_hz: f64,
    redraw_done: bool,
}

enum Phase {
    WaitingVis(VisDetector),
    DecodingVideo(VideoPass),
    DecodingFskId(FskDecoder),
}

/// Did this step make forward progress, or is it waiting on more PCM to arrive?
enum Advance {
    Progressed,
    WaitingForData,
}

pub struct Orchestrator {
    ring: Arc<PcmRing>,
    sample_rate: u32,
    phase: Phase,
    total_fed: AtomicU64,
    phase_progress_mark: u64,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_sample_rate(SAMPLE_RATE_HZ)
    }

    /// Sized for live, incremental use: the ring comfortably holds one full transmission (VIS
    /// header through the longest supported image plus an FSK ID trailer), so a scanline-by-
    /// scanline decode that spans many `feed`/`drain` ticks never has its own window evicted out
    /// from under it.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        let seconds = longest_transmission_seconds() + RING_MARGIN_SECONDS;
        Self::with_capacity(sample_rate, (seconds * sample_rate as f64).ceil() as usize)
    }

    /// Sized explicitly. The offline CLI uses this to size the ring to its whole input file, since
    /// it has no real-time pacing to rely on the default capacity's margin.
    pub fn with_capacity(sample_rate: u32, min_samples: usize) -> Self {
        let ring = Arc::new(PcmRing::with_capacity(min_samples.max(1).next_power_of_two()));
        Self {
            phase: Phase::WaitingVis(VisDetector::new(ring.clone(), sample_rate)),
            ring,
            sample_rate,
            total_fed: AtomicU64::new(0),
            phase_progress_mark: 0,
        }
    }

    /// Forward newly arrived PCM into the ring. Called by the extension's feed task; never
    /// blocks; backpressure is handled upstream of this point.
    pub fn feed(&self, samples: &[i16]) {
        self.ring.write(samples);
        self.total_fed.fetch_add(samples.len() as u64, Ordering::Relaxed);
    }

    pub fn ring(&self) -> &PcmRing {
        &self.ring
    }

    /// Drive the state machine as far as currently-buffered PCM allows, emitting events via
    /// `on_event`, then return. Safe to call repeatedly: on a live session this is invoked once
    /// per drain tick and resumes exactly where the previous call left off; the offline CLI calls
    /// it once against a ring already sized to hold its whole input.
    pub fn run_to_completion(&mut self, mut on_event: impl FnMut(SstvEvent) -> Result<()>) -> Result<()> {
        loop {
            match self.advance(&mut on_event)? {
                Advance::Progressed => continue,
                Advance::WaitingForData => return Ok(()),
            }
        }
    }

    fn advance(&mut self, on_event: &mut impl FnMut(SstvEvent) -> Result<()>) -> Result<Advance> {
        match &mut self.phase {
            Phase::WaitingVis(detector) => match detector.poll() {
                Some(detected) => {
                    self.handle_detected(detected, on_event)?;
                    Ok(Advance::Progressed)
                }
                None => Ok(Advance::WaitingForData),
            },
            Phase::DecodingVideo(_) => self.advance_video(on_event),
            Phase::DecodingFskId(fsk) => match fsk.poll() {
                Ok(Some(id)) => {
                    on_event(SstvEvent::FskId { callsign: id.callsign })?;
                    self.reset_to_waiting();
                    Ok(Advance::Progressed)
                }
                Ok(None) => {
                    if self.check_stall() {
                        on_event(SstvEvent::Reset)?;
                        self.reset_to_waiting();
                        Ok(Advance::Progressed)
                    } else {
                        Ok(Advance::WaitingForData)
                    }
                }
                Err(()) => {
                    self.reset_to_waiting();
                    Ok(Advance::Progressed)
                }
            },
        }
    }

    fn handle_detected(
        &mut self,
        detected: DetectedVis,
        on_event: &mut impl FnMut(SstvEvent) -> Result<()>,
    ) -> Result<()> {
        let mode: &'static ModeSpec = mode_by_id(detected.mode_id);
        on_event(SstvEvent::ModeDetected {
            mode: mode.name,
            header_shift_hz: detected.header_shift_hz,
        })?;

        if mode.unsupported {
            on_event(SstvEvent::UnsupportedMode { mode: mode.name })?;
            on_event(SstvEvent::Reset)?;
            self.reset_to_waiting();
            return Ok(());
        }

        on_event(SstvEvent::ImageStart {
            width: mode.width as u32,
            height: effective_num_lines(mode) as u32,
        })?;
        let demod = VideoDemodulator::new(self.ring.clone(), mode, self.sample_rate, detected.header_shift_hz);
        self.phase = Phase::DecodingVideo(VideoPass {
            demod,
            mode,
            header_shift_hz: detected.header_shift_hz,
            redraw_done: false,
        });
        self.mark_progress();
        Ok(())
    }

    fn advance_video(&mut self, on_event: &mut impl FnMut(SstvEvent) -> Result<()>) -> Result<Advance> {
        let Phase::DecodingVideo(pass) = &mut self.phase else {
            unreachable!("advance_video called outside DecodingVideo");
        };

        let outcome = pass.demod.step(|line| {
            on_event(SstvEvent::ImageLine(line))?;
            Ok(true)
        })?;

        match outcome {
            DemodOutcome::Complete { .. } => {
                self.mark_progress();
                let Phase::DecodingVideo(pass) = &self.phase else {
                    unreachable!()
                };
                if !pass.redraw_done {
                    let timing = sync_correct::correct(pass.demod.sync_map(), pass.mode, self.sample_rate);
                    let needs_redraw = (timing.effective_sample_rate - self.sample_rate as f64).abs() > 1.0
                        || timing.line_start_skip.abs() > 1.0;
                    if needs_redraw {
                        let mode = pass.mode;
                        let header_shift_hz = pass.header_shift_hz;
                        on_event(SstvEvent::Redraw)?;
                        let redraw_demod = VideoDemodulator::with_skip(
                            self.ring.clone(),
                            mode,
                            self.sample_rate,
                            header_shift_hz,
                            timing.effective_sample_rate,
                            timing.line_start_skip,
                        );
                        self.phase = Phase::DecodingVideo(VideoPass {
                            demod: redraw_demod,
                            mode,
                            header_shift_hz,
                            redraw_done: true,
                        });
                        return Ok(Advance::Progressed);
                    }
                }
                on_event(SstvEvent::ImageComplete)?;
                self.phase = Phase::DecodingFskId(FskDecoder::new(self.ring.clone(), self.sample_rate));
                Ok(Advance::Progressed)
            }
            DemodOutcome::Pending => {
                if self.check_stall() {
                    on_event(SstvEvent::Reset)?;
                    self.reset_to_waiting();
                    Ok(Advance::Progressed)
                } else {
                    Ok(Advance::WaitingForData)
                }
            }
        }
    }

    fn reset_to_waiting(&mut self) {
        self.phase = Phase::WaitingVis(VisDetector::new(self.ring.clone(), self.sample_rate));
        self.mark_progress();
    }

    fn mark_progress(&mut self) {
        self.phase_progress_mark = self.total_fed.load(Ordering::Relaxed);
    }

    /// True once `STARVATION_TIMEOUT_SECONDS` worth of PCM has been fed without the current phase
    /// completing a step: the signal dropped out mid-image or mid-ID rather than just lagging a
    /// drain tick behind.
    fn check_stall(&self) -> bool {
        let threshold = (STARVATION_TIMEOUT_SECONDS * self.sample_rate as f64) as u64;
        self.total_fed.load(Ordering::Relaxed).saturating_sub(self.phase_progress_mark) > threshold
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_input_produces_no_events() {
        let mut orchestrator = Orchestrator::with_sample_rate(8000);
        orchestrator.feed(&vec![0i16; 8000]);
        let mut events = Vec::new();
        orchestrator
            .run_to_completion(|e| {
                events.push(format!("{e:?}"));
                Ok(())
            })
            .unwrap();
        assert!(events.is_empty());
    }
}
