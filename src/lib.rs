//! `sstv-ext`, a pluggable audio-extension framework with a slow-scan television (SSTV) image
//! decoder as its first extension.
//!
//! This crate provides:
//! - A mono 16-bit PCM ring buffer with independent write/read/window cursors
//! - A dependency-free FFT core shared by every frequency-domain stage
//! - A streaming SSTV pipeline: VIS header detection, FM video demodulation, Hough-based sync
//!   correction, and FSK callsign ID decoding
//! - A session-oriented extension framework (attach/feed/drain/detach) with a binary wire protocol
//!   for streaming decode progress to a client
//!
//! The library is designed to sit behind a live audio source (e.g. a WebSocket bridge to an SDR
//! front end) as well as an offline CLI, with an emphasis on never blocking the PCM feed path.

pub mod error;
pub mod fft;
pub mod framework;
pub mod instance_directory;
pub mod logging;
pub mod ring;
pub mod sstv;
pub mod wav;
