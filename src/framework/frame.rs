//! Big-endian binary wire frames emitted to a session's output sink. Each frame is a 1-byte
//! tag followed by a tag-specific payload; there is no outer length prefix, since the caller's
//! transport (WebSocket binary message) already delimits frames.

use std::io::{self, Write};

pub const TAG_MODE_DETECTED: u8 = 0x01;
pub const TAG_IMAGE_START: u8 = 0x02;
pub const TAG_IMAGE_LINE: u8 = 0x03;
pub const TAG_IMAGE_COMPLETE: u8 = 0x04;
pub const TAG_REDRAW: u8 = 0x05;
pub const TAG_FSK_ID: u8 = 0x06;
pub const TAG_STATUS: u8 = 0x07;
pub const TAG_RESET: u8 = 0x08;
pub const TAG_ERROR: u8 = 0x09;

/// Encodes one wire frame into `w`.
pub trait FrameEncode {
    fn encode(&self, w: &mut impl Write) -> io::Result<()>;
}

fn write_str(w: &mut impl Write, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u16).to_be_bytes())?;
    w.write_all(bytes)
}

pub struct ModeDetectedFrame<'a> {
    pub mode_name: &'a str,
    pub header_shift_hz: f32,
}

impl FrameEncode for ModeDetectedFrame<'_> {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_MODE_DETECTED])?;
        write_str(w, self.mode_name)?;
        w.write_all(&self.header_shift_hz.to_be_bytes())
    }
}

pub struct ImageStartFrame {
    pub width: u32,
    pub height: u32,
}

impl FrameEncode for ImageStartFrame {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_IMAGE_START])?;
        w.write_all(&self.width.to_be_bytes())?;
        w.write_all(&self.height.to_be_bytes())
    }
}

pub struct ImageLineFrame<'a> {
    pub line: u32,
    pub rgb: &'a [u8],
}

impl FrameEncode for ImageLineFrame<'_> {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_IMAGE_LINE])?;
        w.write_all(&self.line.to_be_bytes())?;
        w.write_all(&(self.rgb.len() as u32).to_be_bytes())?;
        w.write_all(self.rgb)
    }
}

pub struct ImageCompleteFrame;

impl FrameEncode for ImageCompleteFrame {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_IMAGE_COMPLETE])
    }
}

pub struct RedrawFrame;

impl FrameEncode for RedrawFrame {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_REDRAW])
    }
}

pub struct FskIdFrame<'a> {
    pub callsign: &'a str,
}

impl FrameEncode for FskIdFrame<'_> {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_FSK_ID])?;
        write_str(w, self.callsign)
    }
}

pub struct StatusFrame<'a> {
    pub message: &'a str,
}

impl FrameEncode for StatusFrame<'_> {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_STATUS])?;
        write_str(w, self.message)
    }
}

pub struct ResetFrame;

impl FrameEncode for ResetFrame {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_RESET])
    }
}

pub struct ErrorFrame<'a> {
    pub message: &'a str,
}

impl FrameEncode for ErrorFrame<'_> {
    fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        w.write_all(&[TAG_ERROR])?;
        write_str(w, self.message)
    }
}

/// Encode any [`FrameEncode`] value into a freshly allocated byte vector, for transports (like a
/// WebSocket binary message) that want a complete buffer rather than a `Write` sink.
pub fn encode_to_vec(frame: &impl FrameEncode) -> Vec<u8> {
    let mut buf = Vec::new();
    frame.encode(&mut buf).expect("writing to a Vec never fails");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_detected_round_trips_tag_and_length() {
        let frame = ModeDetectedFrame {
            mode_name: "Martin M1",
            header_shift_hz: 12.5,
        };
        let bytes = encode_to_vec(&frame);
        assert_eq!(bytes[0], TAG_MODE_DETECTED);
        let name_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        assert_eq!(name_len, "Martin M1".len());
        assert_eq!(&bytes[3..3 + name_len], b"Martin M1");
    }

    #[test]
    fn image_line_frame_carries_exact_payload_length() {
        let rgb = vec![1u8, 2, 3, 4, 5, 6];
        let frame = ImageLineFrame { line: 7, rgb: &rgb };
        let bytes = encode_to_vec(&frame);
        assert_eq!(bytes[0], TAG_IMAGE_LINE);
        let line = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
        assert_eq!(line, 7);
        let len = u32::from_be_bytes(bytes[5..9].try_into().unwrap()) as usize;
        assert_eq!(len, rgb.len());
        assert_eq!(&bytes[9..9 + len], rgb.as_slice());
    }

    #[test]
    fn zero_argument_frames_are_a_single_tag_byte() {
        assert_eq!(encode_to_vec(&ImageCompleteFrame), vec![TAG_IMAGE_COMPLETE]);
        assert_eq!(encode_to_vec(&RedrawFrame), vec![TAG_REDRAW]);
        assert_eq!(encode_to_vec(&ResetFrame), vec![TAG_RESET]);
    }
}
