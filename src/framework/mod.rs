//! Pluggable audio-extension framework: session lifecycle, wire framing, and the registry
//! that maps an extension name to a factory. The SSTV decoder itself is just the one extension
//! this crate ships; the framework has no SSTV-specific knowledge baked in above this module.

pub mod frame;
pub mod registry;

#[cfg(feature = "bin-server")]
pub mod session;

use crate::error::Result;
use crate::framework::frame::{
    encode_to_vec, FrameEncode, FskIdFrame, ImageCompleteFrame, ImageLineFrame, ImageStartFrame,
    ModeDetectedFrame, RedrawFrame, ResetFrame, StatusFrame,
};
use crate::sstv::orchestrator::{Orchestrator, SstvEvent};

/// One pluggable audio extension. A session owns exactly one instance for its lifetime:
/// `feed` is called from the PCM-forwarding task, `drain` from the session's own poll loop, and
/// `detach` exactly once when the session ends (client disconnect, extension error, or shutdown).
pub trait AudioExtension: Send {
    /// Accepts newly arrived PCM. Must never block; extensions that cannot keep up drop samples
    /// internally (typically via their own ring buffer's overwrite semantics) rather than stall
    /// the feed task.
    fn feed(&mut self, samples: &[i16]);

    /// Produce zero or more encoded wire frames representing progress since the last call.
    fn drain(&mut self) -> Result<Vec<Vec<u8>>>;

    /// Called once when the session is torn down. Default is a no-op; extensions holding external
    /// resources (file handles, spawned tasks) override this to release them.
    fn detach(&mut self) {}
}

/// Static metadata describing an extension, returned by the registry alongside its factory.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// The SSTV decoder, wired up as an [`AudioExtension`]. Wraps an [`Orchestrator`] and translates
/// its event stream into wire frames, buffering them for the next `drain` call.
pub struct SstvExtension {
    orchestrator: Orchestrator,
    pending: Vec<Vec<u8>>,
    announced_waiting: bool,
}

impl SstvExtension {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            orchestrator: Orchestrator::with_sample_rate(sample_rate),
            pending: Vec::new(),
            announced_waiting: false,
        }
    }
}

impl AudioExtension for SstvExtension {
    fn feed(&mut self, samples: &[i16]) {
        self.orchestrator.feed(samples);
    }

    fn drain(&mut self) -> Result<Vec<Vec<u8>>> {
        if !self.announced_waiting {
            self.announced_waiting = true;
            self.pending.push(encode_to_vec(&StatusFrame {
                message: "Waiting for signal…",
            }));
        }
        self.orchestrator.run_to_completion(|event| {
            match event {
                SstvEvent::ModeDetected { mode, header_shift_hz } => {
                    self.pending.push(encode_to_vec(&ModeDetectedFrame {
                        mode_name: mode,
                        header_shift_hz: header_shift_hz as f32,
                    }));
                }
                SstvEvent::ImageStart { width, height } => {
                    self.pending.push(encode_to_vec(&ImageStartFrame { width, height }));
                }
                SstvEvent::ImageLine(line) => {
                    self.pending.push(encode_to_vec(&ImageLineFrame {
                        line: line.line,
                        rgb: &line.rgb,
                    }));
                }
                SstvEvent::ImageComplete => self.pending.push(encode_to_vec(&ImageCompleteFrame)),
                SstvEvent::Redraw => self.pending.push(encode_to_vec(&RedrawFrame)),
                SstvEvent::FskId { callsign } => {
                    self.pending.push(encode_to_vec(&FskIdFrame { callsign: &callsign }));
                }
                SstvEvent::UnsupportedMode { mode } => {
                    self.pending.push(encode_to_vec(&StatusFrame {
                        message: &format!("unsupported mode: {mode}"),
                    }));
                }
                SstvEvent::Reset => self.pending.push(encode_to_vec(&ResetFrame)),
            }
            Ok(())
        })?;
        Ok(std::mem::take(&mut self.pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_drain_announces_waiting_for_signal() {
        let mut ext = SstvExtension::new(8000);
        ext.feed(&vec![0i16; 8000]);
        let frames = ext.drain().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], crate::framework::frame::TAG_STATUS);
    }

    #[test]
    fn subsequent_drains_on_silence_produce_no_frames() {
        let mut ext = SstvExtension::new(8000);
        ext.feed(&vec![0i16; 8000]);
        let _ = ext.drain().unwrap();
        ext.feed(&vec![0i16; 8000]);
        let frames = ext.drain().unwrap();
        assert!(frames.is_empty());
    }
}
