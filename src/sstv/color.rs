//! Per-mode color space conversion, applied line-by-line to produce the wire RGB image.

use crate::sstv::mode_table::ColorEncoding;

fn clip_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert one pixel's three raw channel samples (already 0-255 luminance-scale bytes) into
/// output RGB, according to `encoding`.
pub fn convert(encoding: ColorEncoding, ch: [u8; 3]) -> [u8; 3] {
    let [c0, c1, c2] = ch;
    match encoding {
        ColorEncoding::Rgb => [c0, c1, c2],
        ColorEncoding::Gbr => [c2, c0, c1],
        ColorEncoding::Bw => [c0, c0, c0],
        ColorEncoding::Yuv | ColorEncoding::Yuvy => {
            let (y, u, v) = (c0 as f64, c1 as f64, c2 as f64);
            let r = clip_u8((100.0 * y + 140.0 * u - 17850.0) / 100.0);
            let g = clip_u8((100.0 * y - 71.0 * u - 33.0 * v + 13260.0) / 100.0);
            let b = clip_u8((100.0 * y + 178.0 * v - 22695.0) / 100.0);
            [r, g, b]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_is_identity() {
        assert_eq!(convert(ColorEncoding::Rgb, [10, 20, 30]), [10, 20, 30]);
    }

    #[test]
    fn gbr_permutes_channels() {
        assert_eq!(convert(ColorEncoding::Gbr, [10, 20, 30]), [30, 10, 20]);
    }

    #[test]
    fn bw_replicates_luma() {
        assert_eq!(convert(ColorEncoding::Bw, [77, 0, 0]), [77, 77, 77]);
    }

    // Clipping never produces values outside [0,255], and fully
    // saturated input maps to fully saturated output in the corresponding channel.
    #[test]
    fn yuv_saturated_white_stays_in_range() {
        let white = convert(ColorEncoding::Yuv, [255, 128, 128]);
        for c in white {
            assert!((0..=255).contains(&c));
        }
        assert_eq!(white, [255, 255, 255]);
    }

    #[test]
    fn yuv_never_exceeds_byte_range_on_extreme_input() {
        for y in [0u8, 255] {
            for u in [0u8, 255] {
                for v in [0u8, 255] {
                    let out = convert(ColorEncoding::Yuv, [y, u, v]);
                    for c in out {
                        assert!((0..=255).contains(&c));
                    }
                }
            }
        }
    }
}
