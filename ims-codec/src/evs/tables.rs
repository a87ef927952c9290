//! EVS Primary and AMR-WB-IO frame-length tables (3GPP TS 26.445 Annex
//! A.2.2).

/// Primary-mode Compact payload byte lengths, ascending, one per
/// negotiable bitrate plus the 2.8 kbps SID-only frame and one
/// channel-aware 13.2 kbps variant (+2 bytes of redundancy-offset
/// framing) — thirteen values total, per §4.4.2.
pub const PRIMARY_COMPACT_BYTES: [usize; 13] = [
    6, 18, 20, 24, 33, 35, 41, 61, 80, 120, 160, 240, 320,
];

/// Bitrates in bps, positionally aligned with `PRIMARY_COMPACT_BYTES`
/// (2.8 kbps SID and its 13.2 kbps channel-aware sibling excepted).
pub const PRIMARY_BITRATES_BPS: [u32; 13] = [
    2800, 7200, 8000, 9600, 13200, 13200, 16400, 24400, 32000, 48000, 64000, 96000, 128000,
];

pub const PRIMARY_SID_BYTES: usize = 6;

/// AMR-WB-IO Compact payload byte lengths for modes 0..=8, per 3GPP TS
/// 26.445 Annex A.2.3 Table A.1. The SID length (6 bytes) is handled by
/// the ambiguous-6-byte branch in `detect_format`, not listed here.
const AMRWBIO_COMPACT_BYTES: [usize; 9] = [18, 24, 33, 37, 41, 47, 51, 59, 61];

fn amrwbio_compact_bytes(mode: u8) -> Option<usize> {
    AMRWBIO_COMPACT_BYTES.get(mode as usize).copied()
}

pub fn amrwbio_compact_lengths() -> Vec<usize> {
    AMRWBIO_COMPACT_BYTES.to_vec()
}

pub fn amrwbio_mode_for_length(len: usize) -> Option<u8> {
    (0u8..=8).find(|&m| amrwbio_compact_bytes(m) == Some(len))
}
