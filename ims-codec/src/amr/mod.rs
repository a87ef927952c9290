//! AMR / AMR-WB bandwidth-efficient and octet-aligned RTP payload
//! framing (RFC 4867 §4.3/§4.4).

mod tables;

use ims_shared::bitio::{BitReader, BitWriter};
use ims_shared::{Error, Result};
use tracing::debug;

use crate::{AudioPayloadCodec, CmrEvent, CodecFrame};
pub use tables::{amr_nb_bit_len, amr_wb_bit_len, AMR_NB_SID_FT, AMR_WB_SID_FT, NO_REQUEST_CMR};

/// Narrowband (8 kHz) or wideband (16 kHz) mode set; selects the bit-length
/// table and the SID frame-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmrBand {
    NarrowBand,
    WideBand,
}

#[derive(Debug, Clone)]
pub struct AmrCodec {
    pub band: AmrBand,
    pub octet_aligned: bool,
    last_cmr: Option<u8>,
}

impl AmrCodec {
    pub fn new(band: AmrBand, octet_aligned: bool) -> Self {
        AmrCodec {
            band,
            octet_aligned,
            last_cmr: None,
        }
    }

    fn bit_len(&self, ft: u8) -> Option<usize> {
        match self.band {
            AmrBand::NarrowBand => amr_nb_bit_len(ft),
            AmrBand::WideBand => amr_wb_bit_len(ft),
        }
    }

    fn sid_ft(&self) -> u8 {
        match self.band {
            AmrBand::NarrowBand => AMR_NB_SID_FT,
            AmrBand::WideBand => AMR_WB_SID_FT,
        }
    }
}

impl AudioPayloadCodec for AmrCodec {
    fn decode_payload(&mut self, payload: &[u8]) -> Result<(Vec<CodecFrame>, Option<CmrEvent>)> {
        if payload.is_empty() {
            return Err(Error::ErrBufferShort { need: 1, have: 0 });
        }
        let mut reader = BitReader::new(payload);
        let cmr = reader.read_bits(4) as u8;
        if self.octet_aligned {
            reader.skip_bits(4);
        }

        let mut tocs = Vec::new();
        loop {
            if reader.remaining_bits() < 6 {
                return Err(Error::ErrInvalidMsg);
            }
            let f = reader.read_bit();
            let ft = reader.read_bits(4) as u8;
            let _q = reader.read_bit();
            if self.octet_aligned {
                reader.skip_bits(2);
            }
            tocs.push(ft);
            if f == 0 {
                break;
            }
            if tocs.len() > 32 {
                return Err(Error::ErrInvalidMsg);
            }
        }

        let mut frames = Vec::with_capacity(tocs.len());
        for ft in tocs {
            let bit_len = self.bit_len(ft).unwrap_or(0);
            let bits = reader.read_frame_bits(bit_len);
            if self.octet_aligned {
                reader.align();
            }
            frames.push(CodecFrame {
                mode: ft,
                bits,
                bit_len,
                is_sid: ft == self.sid_ft(),
            });
        }

        let cmr_event = if cmr != NO_REQUEST_CMR && self.last_cmr != Some(cmr) {
            debug!(cmr, "amr cmr change observed");
            Some(CmrEvent { mode: cmr })
        } else {
            None
        };
        self.last_cmr = Some(cmr);

        Ok((frames, cmr_event))
    }

    fn encode_payload(&mut self, frames: &[CodecFrame], cmr: Option<u8>) -> Result<Vec<u8>> {
        let mut writer = BitWriter::with_capacity(frames.len() * 32 + 4);
        writer.write_bits(cmr.unwrap_or(NO_REQUEST_CMR) as u32, 4);
        if self.octet_aligned {
            writer.write_bits(0, 4);
        }

        for (i, frame) in frames.iter().enumerate() {
            let is_last = i + 1 == frames.len();
            writer.write_bit(if is_last { 0 } else { 1 });
            writer.write_bits(frame.mode as u32, 4);
            writer.write_bit(1); // Q: frame judged good by the encoder
            if self.octet_aligned {
                writer.write_bits(0, 2);
            }
        }
        for frame in frames {
            writer.write_frame_bits(&frame.bits, frame.bit_len);
            if self.octet_aligned {
                writer.align();
            }
        }

        Ok(writer.into_bytes())
    }

    fn sid_detect(&self, frame_byte_len: usize) -> bool {
        frame_byte_len == 5
    }

    fn frame_bits(&self, mode: u8) -> Option<usize> {
        self.bit_len(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §8 scenario 2: AMR-WB bandwidth-efficient 12.65 kbps, one frame of
    /// 253 speech bits, CMR=15, F=0, FT=2, Q=1.
    #[test]
    fn amr_wb_scenario_2_payload_length() {
        let mut codec = AmrCodec::new(AmrBand::WideBand, false);
        let frame = CodecFrame {
            mode: 2,
            bits: vec![0xAB; 32], // 253 bits rounded up to 32 bytes, content irrelevant here
            bit_len: 253,
            is_sid: false,
        };
        let payload = codec.encode_payload(&[frame], Some(15)).unwrap();
        assert_eq!(payload.len(), 33);
        assert_eq!(payload[0] >> 4, 0b1111);
        assert_eq!((payload[0] >> 3) & 1, 0); // F = 0
    }

    #[test]
    fn round_trip_octet_aligned_one_frame() {
        let mut codec = AmrCodec::new(AmrBand::NarrowBand, true);
        let frames = vec![
            CodecFrame {
                mode: 7,
                bits: {
                    let mut r = BitWriter::new();
                    r.write_bits(0x1234, 24);
                    r.into_bytes()
                },
                bit_len: 244,
                is_sid: false,
            },
        ];
        let payload = codec.encode_payload(&frames, None).unwrap();
        let (decoded, cmr_event) = codec.decode_payload(&payload).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].mode, 7);
        assert_eq!(decoded[0].bit_len, 244);
        assert!(cmr_event.is_none());
    }

    #[test]
    fn cmr_event_emitted_once() {
        let mut codec = AmrCodec::new(AmrBand::NarrowBand, true);
        let frames = vec![CodecFrame {
            mode: 7,
            bits: vec![0; 31],
            bit_len: 244,
            is_sid: false,
        }];
        let payload = codec.encode_payload(&frames, Some(3)).unwrap();
        let (_, first) = codec.decode_payload(&payload).unwrap();
        assert_eq!(first, Some(CmrEvent { mode: 3 }));
        let (_, second) = codec.decode_payload(&payload).unwrap();
        assert_eq!(second, None);
    }
}
