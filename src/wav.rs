//! Minimal RIFF/WAVE reader for the offline decode CLI's input files. Hand-rolled rather than
//! pulled in as a dependency: the only thing this crate's PCM ingest contract cares about is mono
//! 16-bit samples at a known rate, so a full WAV/audio-container library would bring far more than
//! is used.

use anyhow::{bail, Context, Result};

/// The subset of a WAV file's `fmt ` chunk this crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// Reads a RIFF/WAVE file's `fmt ` and `data` chunks, returning mono 16-bit samples.
///
/// Chunks are walked in file order rather than assuming `fmt ` precedes `data`; some encoders
/// emit metadata chunks (`LIST`, `fact`) in between, which are skipped by their declared size.
pub fn read_mono_pcm16(bytes: &[u8]) -> Result<(Vec<i16>, WavFormat)> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        bail!("not a RIFF/WAVE file");
    }

    let mut format: Option<WavFormat> = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12usize;

    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let body_start = pos + 8;
        let body_end = body_start
            .checked_add(chunk_size)
            .filter(|&end| end <= bytes.len())
            .with_context(|| format!("chunk '{}' size runs past end of file", String::from_utf8_lossy(chunk_id)))?;
        let body = &bytes[body_start..body_end];

        match chunk_id {
            b"fmt " => {
                if body.len() < 16 {
                    bail!("fmt chunk too short");
                }
                format = Some(WavFormat {
                    channels: u16::from_le_bytes([body[2], body[3]]),
                    sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
                    bits_per_sample: u16::from_le_bytes([body[14], body[15]]),
                });
            }
            b"data" => data = Some(body),
            _ => {}
        }

        // Chunks are word-aligned; an odd-sized chunk has one byte of padding after it.
        pos = body_end + (chunk_size % 2);
    }

    let format = format.context("no fmt chunk found")?;
    let data = data.context("no data chunk found")?;

    if format.channels != 1 {
        bail!("expected mono WAV, got {} channels", format.channels);
    }
    if format.bits_per_sample != 16 {
        bail!("expected 16-bit PCM, got {}-bit", format.bits_per_sample);
    }

    let samples = data
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect();

    Ok((samples, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_wav(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
        out.extend_from_slice(&2u16.to_le_bytes()); // block align
        out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&data_bytes);
        out
    }

    #[test]
    fn reads_back_a_synthesized_file() {
        let samples = [0i16, 100, -100, 32000, -32000];
        let bytes = synth_wav(11_025, &samples);
        let (decoded, format) = read_mono_pcm16(&bytes).unwrap();
        assert_eq!(format.sample_rate, 11_025);
        assert_eq!(format.channels, 1);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn rejects_non_riff_input() {
        assert!(read_mono_pcm16(b"not a wav file at all").is_err());
    }

    #[test]
    fn rejects_stereo() {
        let mut bytes = synth_wav(11_025, &[0, 1, 2]);
        bytes[22] = 2; // channels field inside the fmt chunk
        assert!(read_mono_pcm16(&bytes).is_err());
    }
}
