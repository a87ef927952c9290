//! FT → speech-frame bit-length tables (RFC 4867 §3.6), kept table-driven
//! exactly as the wire format demands. Bit-sensitivity permutation (Class
//! A/B/C reordering) is codec-internal and out of scope for framing.

/// AMR narrowband: FT 0..=7 are the eight speech rates (4.75..12.2 kbps),
/// FT 8 is SID, FT 9..14 are reserved/future, FT 15 is NO_DATA.
const AMR_NB_BITS: [usize; 16] = [
    95, 103, 118, 134, 148, 159, 204, 244, 39, 0, 0, 0, 0, 0, 0, 0,
];
pub const AMR_NB_SID_FT: u8 = 8;

/// AMR-WB: FT 0..=8 are the nine speech rates (6.60..23.85 kbps), FT 9 is
/// SID, FT 10..13 reserved, FT 14 speech-lost, FT 15 NO_DATA.
const AMR_WB_BITS: [usize; 16] = [
    132, 177, 253, 285, 317, 365, 397, 461, 477, 40, 0, 0, 0, 0, 0, 0,
];
pub const AMR_WB_SID_FT: u8 = 9;

/// CMR value meaning "no mode change requested", for both bands.
pub const NO_REQUEST_CMR: u8 = 15;

pub fn amr_nb_bit_len(ft: u8) -> Option<usize> {
    AMR_NB_BITS.get(ft as usize).copied().filter(|b| *b != 0)
}

pub fn amr_wb_bit_len(ft: u8) -> Option<usize> {
    AMR_WB_BITS.get(ft as usize).copied().filter(|b| *b != 0)
}
