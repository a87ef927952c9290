//! EVS Primary and AMR-WB-IO RTP payload framing, Compact and
//! Header-Full formats (3GPP TS 26.445 Annex A.2).

mod tables;

use ims_shared::bitio::{BitReader, BitWriter};
use ims_shared::{Error, Result};
use tracing::debug;

pub use tables::{
    amrwbio_compact_lengths, amrwbio_mode_for_length, PRIMARY_COMPACT_BYTES, PRIMARY_SID_BYTES,
};

use crate::{AudioPayloadCodec, CmrEvent, CodecFrame};

/// CMR value meaning "no request", for Compact (3-bit) framing.
pub const NO_REQUEST_CMR_COMPACT: u8 = 7;
/// `(type, define)` pair meaning "no request", for Header-Full (8-bit)
/// framing: type=7, define=15 per §4.4.3.
pub const NO_REQUEST_CMR_HEADER_FULL: (u8, u8) = (7, 15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvsCodecMode {
    Primary,
    AmrWbIo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvsFormat {
    Compact,
    HeaderFull,
}

/// Resolves the wire format a payload of `len` bytes must be in, given
/// the session's negotiated codec mode, per §4.4.2's auto-detection
/// rules including the 6-byte ambiguity (disambiguated here by the
/// caller supplying `first_bit_is_zero` once the payload is available).
pub fn detect_format(mode: EvsCodecMode, len: usize, first_bit_is_zero: Option<bool>) -> EvsFormat {
    if len == PRIMARY_SID_BYTES {
        return match (mode, first_bit_is_zero) {
            (EvsCodecMode::Primary, Some(true)) => EvsFormat::Compact,
            (EvsCodecMode::Primary, None) => EvsFormat::Compact,
            _ => EvsFormat::HeaderFull,
        };
    }
    let compact = match mode {
        EvsCodecMode::Primary => PRIMARY_COMPACT_BYTES.contains(&len),
        EvsCodecMode::AmrWbIo => amrwbio_compact_lengths().contains(&len),
    };
    if compact {
        EvsFormat::Compact
    } else {
        EvsFormat::HeaderFull
    }
}

#[derive(Debug, Clone)]
pub struct EvsCodec {
    pub mode: EvsCodecMode,
    pub header_full_only: bool,
    last_cmr: Option<(u8, u8)>,
}

impl EvsCodec {
    pub fn new(mode: EvsCodecMode, header_full_only: bool) -> Self {
        EvsCodec {
            mode,
            header_full_only,
            last_cmr: None,
        }
    }

    fn primary_bit_len_for(&self, byte_len: usize) -> Option<usize> {
        PRIMARY_COMPACT_BYTES
            .iter()
            .position(|&b| b == byte_len)
            .map(|_| byte_len * 8)
    }

    fn decode_compact(&mut self, payload: &[u8]) -> Result<(Vec<CodecFrame>, Option<CmrEvent>)> {
        match self.mode {
            EvsCodecMode::Primary => {
                if payload.len() == PRIMARY_SID_BYTES {
                    return Ok((
                        vec![CodecFrame {
                            mode: 0,
                            bits: payload.to_vec(),
                            bit_len: payload.len() * 8,
                            is_sid: true,
                        }],
                        None,
                    ));
                }
                let bit_len = self
                    .primary_bit_len_for(payload.len())
                    .ok_or(Error::ErrUnknownFraming)?;
                Ok((
                    vec![CodecFrame {
                        mode: 0,
                        bits: payload.to_vec(),
                        bit_len,
                        is_sid: false,
                    }],
                    None,
                ))
            }
            EvsCodecMode::AmrWbIo => {
                let mut reader = BitReader::new(payload);
                let cmr = reader.read_bits(3) as u8;
                let amrwb_mode = amrwbio_mode_for_length(payload.len());
                let bit_len = payload.len() * 8 - 3;
                let bits = reader.read_frame_bits(bit_len);
                let is_sid = amrwb_mode.is_none();
                let cmr_event = if cmr != NO_REQUEST_CMR_COMPACT && self.last_cmr != Some((0, cmr))
                {
                    debug!(cmr, "evs compact amr-wb-io cmr change observed");
                    Some(CmrEvent { mode: cmr })
                } else {
                    None
                };
                self.last_cmr = Some((0, cmr));
                Ok((
                    vec![CodecFrame {
                        mode: amrwb_mode.unwrap_or(9),
                        bits,
                        bit_len,
                        is_sid,
                    }],
                    cmr_event,
                ))
            }
        }
    }

    fn decode_header_full(&mut self, payload: &[u8]) -> Result<(Vec<CodecFrame>, Option<CmrEvent>)> {
        let mut reader = BitReader::new(payload);
        let mut cmr_event = None;
        let mut tocs: Vec<(u8, usize)> = Vec::new();

        loop {
            if reader.remaining_bits() < 8 {
                return Err(Error::ErrInvalidMsg);
            }
            let h = reader.read_bit();
            if h == 1 {
                let cmr_type = reader.read_bits(3) as u8;
                let cmr_define = reader.read_bits(4) as u8;
                if (cmr_type, cmr_define) != NO_REQUEST_CMR_HEADER_FULL
                    && self.last_cmr != Some((cmr_type, cmr_define))
                {
                    debug!(cmr_type, cmr_define, "evs header-full cmr change observed");
                    cmr_event = Some(CmrEvent {
                        mode: (cmr_type << 4) | cmr_define,
                    });
                }
                self.last_cmr = Some((cmr_type, cmr_define));
                continue;
            }
            let f = reader.read_bit();
            let ft_m = reader.read_bit();
            let ft_q = reader.read_bit();
            let ft_b = reader.read_bits(4) as u8;
            let _ = ft_q;
            let bit_len = PRIMARY_COMPACT_BYTES
                .get(ft_b as usize)
                .map(|b| b * 8)
                .unwrap_or(0);
            tocs.push(((ft_m << 4) | ft_b, bit_len));
            if f == 0 {
                break;
            }
            if tocs.len() > 16 {
                return Err(Error::ErrInvalidMsg);
            }
        }

        let mut frames = Vec::with_capacity(tocs.len());
        for (mode, bit_len) in tocs {
            let bits = reader.read_frame_bits(bit_len);
            reader.align();
            frames.push(CodecFrame {
                mode,
                bits,
                bit_len,
                is_sid: bit_len == PRIMARY_SID_BYTES * 8,
            });
        }
        Ok((frames, cmr_event))
    }
}

impl AudioPayloadCodec for EvsCodec {
    fn decode_payload(&mut self, payload: &[u8]) -> Result<(Vec<CodecFrame>, Option<CmrEvent>)> {
        if payload.is_empty() {
            return Err(Error::ErrBufferShort { need: 1, have: 0 });
        }
        let format = if self.header_full_only {
            EvsFormat::HeaderFull
        } else {
            let first_bit_is_zero = (payload[0] & 0x80) == 0;
            detect_format(self.mode, payload.len(), Some(first_bit_is_zero))
        };
        match format {
            EvsFormat::Compact => self.decode_compact(payload),
            EvsFormat::HeaderFull => self.decode_header_full(payload),
        }
    }

    fn encode_payload(&mut self, frames: &[CodecFrame], cmr: Option<u8>) -> Result<Vec<u8>> {
        match self.mode {
            EvsCodecMode::Primary if !self.header_full_only => {
                let frame = frames.first().ok_or(Error::ErrInvalidParam(
                    "no frame to encode".to_string(),
                ))?;
                Ok(frame.bits.clone())
            }
            EvsCodecMode::AmrWbIo if !self.header_full_only => {
                let frame = frames.first().ok_or(Error::ErrInvalidParam(
                    "no frame to encode".to_string(),
                ))?;
                let mut writer = BitWriter::with_capacity(frame.bit_len / 8 + 1);
                writer.write_bits(cmr.unwrap_or(NO_REQUEST_CMR_COMPACT) as u32, 3);
                writer.write_frame_bits(&frame.bits, frame.bit_len);
                Ok(writer.into_bytes())
            }
            _ => {
                let mut writer = BitWriter::new();
                if let Some(cmr) = cmr {
                    writer.write_bit(1);
                    writer.write_bits((cmr >> 4) as u32, 3);
                    writer.write_bits((cmr & 0xF) as u32, 4);
                }
                for (i, frame) in frames.iter().enumerate() {
                    writer.write_bit(0);
                    let is_last = i + 1 == frames.len();
                    writer.write_bit(if is_last { 0 } else { 1 });
                    writer.write_bit((frame.mode >> 4) & 1);
                    writer.write_bit(1); // FT-Q
                    writer.write_bits((frame.mode & 0xF) as u32, 4);
                }
                for frame in frames {
                    writer.write_frame_bits(&frame.bits, frame.bit_len);
                    writer.align();
                }
                Ok(writer.into_bytes())
            }
        }
    }

    fn sid_detect(&self, frame_byte_len: usize) -> bool {
        frame_byte_len == 5 || frame_byte_len == 6
    }

    fn frame_bits(&self, mode: u8) -> Option<usize> {
        match self.mode {
            EvsCodecMode::Primary => PRIMARY_COMPACT_BYTES.get(mode as usize).map(|b| b * 8),
            EvsCodecMode::AmrWbIo => crate::amr::amr_wb_bit_len(mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_compact_primary_by_length() {
        assert_eq!(
            detect_format(EvsCodecMode::Primary, 33, None),
            EvsFormat::Compact
        );
        assert_eq!(
            detect_format(EvsCodecMode::Primary, 37, None),
            EvsFormat::HeaderFull
        );
    }

    #[test]
    fn six_byte_ambiguity_resolved_by_first_bit() {
        assert_eq!(
            detect_format(EvsCodecMode::Primary, 6, Some(true)),
            EvsFormat::Compact
        );
        assert_eq!(
            detect_format(EvsCodecMode::AmrWbIo, 6, Some(false)),
            EvsFormat::HeaderFull
        );
    }

    #[test]
    fn compact_amrwbio_cmr_change_emitted_once() {
        let mut codec = EvsCodec::new(EvsCodecMode::AmrWbIo, false);
        let len = 61; // 23.85 kbps AMR-WB-IO Compact frame
        assert_eq!(detect_format(EvsCodecMode::AmrWbIo, len, None), EvsFormat::Compact);
        let mut payload = vec![0u8; len];
        payload[0] = 2 << 5; // 3-bit CMR = 2 in the top bits
        let (_, first) = codec.decode_payload(&payload).unwrap();
        assert_eq!(first, Some(CmrEvent { mode: 2 }));
        let (_, second) = codec.decode_payload(&payload).unwrap();
        assert_eq!(second, None);
    }

    #[test]
    fn header_full_round_trip_one_frame() {
        let mut codec = EvsCodec::new(EvsCodecMode::Primary, true);
        let frame = CodecFrame {
            mode: 4, // index into PRIMARY_COMPACT_BYTES -> 33 bytes/13.2kbps
            bits: vec![0x5A; 33],
            bit_len: 33 * 8,
            is_sid: false,
        };
        let payload = codec.encode_payload(&[frame.clone()], None).unwrap();
        let (decoded, _) = codec.decode_payload(&payload).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].bit_len, frame.bit_len);
        assert_eq!(decoded[0].bits, frame.bits);
    }
}
