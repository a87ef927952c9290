//! Audio depacketizer stage: sits between the RTP stack and the codec
//! collaborator, turning one RTP payload into the codec-ready frames
//! and CMR events an [`ims_codec::AudioPayloadCodec`] implementation
//! produces, per §2's "payload (de)packetizers" component.

use ims_codec::{AudioPayloadCodec, CmrEvent, CodecFrame};
use ims_shared::Result;

pub struct AudioDepacketizer {
    codec: Box<dyn AudioPayloadCodec>,
}

impl AudioDepacketizer {
    pub fn new(codec: Box<dyn AudioPayloadCodec>) -> Self {
        AudioDepacketizer { codec }
    }

    pub fn depacketize(&mut self, payload: &[u8]) -> Result<(Vec<CodecFrame>, Option<CmrEvent>)> {
        self.codec.decode_payload(payload)
    }

    pub fn packetize(&mut self, frames: &[CodecFrame], cmr: Option<u8>) -> Result<Vec<u8>> {
        self.codec.encode_payload(frames, cmr)
    }

    pub fn is_sid(&self, frame_byte_len: usize) -> bool {
        self.codec.sid_detect(frame_byte_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_codec::amr::{AmrBand, AmrCodec};

    #[test]
    fn round_trips_through_a_concrete_codec() {
        let mut depacketizer = AudioDepacketizer::new(Box::new(AmrCodec::new(AmrBand::NarrowBand, false)));
        let frame = CodecFrame {
            mode: 7,
            bits: vec![0xAB; 244usize.div_ceil(8)],
            bit_len: 244,
            is_sid: false,
        };
        let payload = depacketizer.packetize(&[frame.clone()], None).unwrap();
        let (decoded, _) = depacketizer.depacketize(&payload).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].bit_len, 244);
    }
}
