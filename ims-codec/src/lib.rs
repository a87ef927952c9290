pub mod amr;
pub mod evs;

use ims_shared::Result;

/// One decoded speech/SID frame lifted out of an RTP payload, still in
/// its bit-exact wire form; the codec collaborator (out of scope here)
/// is responsible for turning it into PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecFrame {
    /// FT/mode index as carried in the ToC.
    pub mode: u8,
    /// Bit-exact frame payload, MSB-first, zero-padded to a byte boundary.
    pub bits: Vec<u8>,
    pub bit_len: usize,
    pub is_sid: bool,
}

/// A codec-mode-request surfaced to the TX path. Emitted once per CMR
/// change, never repeated for a steady-state CMR value (§4.4.3, §8
/// scenario 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmrEvent {
    pub mode: u8,
}

/// Replaces the codec-type enum-dispatch fan-out the source uses: each
/// audio payload format implements this trait once instead of every
/// call site switching on a codec-type tag.
pub trait AudioPayloadCodec {
    /// Splits one RTP payload into its constituent frames, returning any
    /// CMR change observed alongside them.
    fn decode_payload(&mut self, payload: &[u8]) -> Result<(Vec<CodecFrame>, Option<CmrEvent>)>;

    /// Packs frames (and an optional CMR to request of the peer) into one
    /// RTP payload.
    fn encode_payload(&mut self, frames: &[CodecFrame], cmr: Option<u8>) -> Result<Vec<u8>>;

    /// True if a frame of `frame_byte_len` bytes (the whole RTP payload
    /// for a single-frame-per-packet stream) is a SID by length alone.
    fn sid_detect(&self, frame_byte_len: usize) -> bool;

    /// Speech-frame bit length for `mode`, or `None` if the mode carries
    /// no frame body (comfort-noise reserved codes, NO_DATA).
    fn frame_bits(&self, mode: u8) -> Option<usize>;
}
