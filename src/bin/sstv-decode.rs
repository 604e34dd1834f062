use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;

use sstv_ext::framework::frame::{
    encode_to_vec, FskIdFrame, ImageCompleteFrame, ImageLineFrame, ImageStartFrame,
    ModeDetectedFrame, RedrawFrame, ResetFrame, StatusFrame,
};
use sstv_ext::sstv::orchestrator::{Orchestrator, SstvEvent};
use sstv_ext::wav;

#[derive(Parser, Debug)]
#[command(name = "sstv-decode")]
#[command(about = "Offline SSTV decoder: reads raw 16-bit mono PCM (or a .wav of the same), writes binary wire frames")]
struct Params {
    /// Path to a raw 16-bit little-endian mono PCM file, or a mono 16-bit WAV file.
    #[arg(short = 'i', long = "input")]
    input: String,

    /// Sample rate of the input, in Hz. Ignored for WAV input, whose own `fmt ` chunk is
    /// authoritative.
    #[arg(short = 'r', long = "rate", default_value_t = 11_025)]
    sample_rate: u32,

    /// Output path for the framed decode stream. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,
}

fn main() -> Result<()> {
    sstv_ext::logging::init();
    let params = Params::parse();

    let bytes = fs::read(&params.input)
        .with_context(|| format!("failed to read input file '{}'", params.input))?;

    let (samples, sample_rate) = if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        let (samples, format) =
            wav::read_mono_pcm16(&bytes).context("failed to parse input as WAV")?;
        (samples, format.sample_rate)
    } else {
        let samples = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        (samples, params.sample_rate)
    };

    let mut out: Box<dyn Write> = match &params.output {
        Some(path) => Box::new(fs::File::create(path).context("failed to create output file")?),
        None => Box::new(io::stdout()),
    };

    // Size the ring to the whole file up front: an offline source has no real-time pacing to
    // lean on, so nothing should be evicted before the decoder ever gets to read it.
    let mut orchestrator = Orchestrator::with_capacity(sample_rate, samples.len());
    orchestrator.feed(&samples);

    orchestrator.run_to_completion(|event| {
        let bytes = match event {
            SstvEvent::ModeDetected { mode, header_shift_hz } => encode_to_vec(&ModeDetectedFrame {
                mode_name: mode,
                header_shift_hz: header_shift_hz as f32,
            }),
            SstvEvent::ImageStart { width, height } => {
                encode_to_vec(&ImageStartFrame { width, height })
            }
            SstvEvent::ImageLine(line) => encode_to_vec(&ImageLineFrame {
                line: line.line,
                rgb: &line.rgb,
            }),
            SstvEvent::ImageComplete => encode_to_vec(&ImageCompleteFrame),
            SstvEvent::Redraw => encode_to_vec(&RedrawFrame),
            SstvEvent::FskId { callsign } => encode_to_vec(&FskIdFrame { callsign: &callsign }),
            SstvEvent::UnsupportedMode { mode } => encode_to_vec(&StatusFrame {
                message: &format!("unsupported mode: {mode}"),
            }),
            SstvEvent::Reset => encode_to_vec(&ResetFrame),
        };
        out.write_all(&bytes)?;
        Ok(())
    })?;

    Ok(())
}
