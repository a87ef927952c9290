use bytes::{Buf, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::Header;

/// Classification of a payload as seen by the jitter buffer and the
/// media-quality analyzer. Normal speech/video data, a silence
/// descriptor emitted during DTX, or an explicit no-data marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Normal,
    Sid,
    NoData,
}

/// Per-packet receive-side bookkeeping the jitter buffer and analyzer
/// attach once a packet is pulled off the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RxStatus {
    Normal,
    Late,
    Discarded,
    Duplicated,
    Lost,
}

/// An RTP packet together with the receive-side metadata that accrues
/// to it as it passes through jitter buffer and analyzer.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub header: Header,
    pub payload: Bytes,
    pub data_type: DataType,
    pub arrival: Option<std::time::Instant>,
    pub jitter_sample: Option<i64>,
    pub rx_status: Option<RxStatus>,
}

impl RtpPacket {
    pub fn new(header: Header, payload: Bytes) -> Self {
        RtpPacket {
            header,
            payload,
            data_type: DataType::Normal,
            arrival: None,
            jitter_sample: None,
            rx_status: None,
        }
    }

    pub fn marshal(&self) -> Result<Bytes> {
        let header_bytes = self.header.marshal()?;
        let mut buf = BytesMut::with_capacity(header_bytes.len() + self.payload.len());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Decodes a full wire packet, honouring the trailing pad-length byte
    /// when the padding bit is set.
    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        let header = Header::unmarshal(raw)?;
        let header_len = header.marshal_size();
        if raw.len() < header_len {
            return Err(Error::ErrBufferShort {
                need: header_len,
                have: raw.len(),
            });
        }
        let mut payload_end = raw.len();
        if header.padding {
            if raw.is_empty() {
                return Err(Error::ErrInvalidPadding);
            }
            let pad_len = raw[raw.len() - 1] as usize;
            if pad_len == 0 || pad_len > payload_end.saturating_sub(header_len) {
                return Err(Error::ErrInvalidPadding);
            }
            payload_end -= pad_len;
        }
        let payload = raw.slice(header_len..payload_end);
        Ok(RtpPacket::new(header, payload))
    }
}

/// Modular "newer-than" comparison for 16-bit RTP sequence numbers.
pub fn seq_is_newer(a: u16, b: u16) -> bool {
    let diff = a.wrapping_sub(b);
    diff != 0 && diff < 0x8000
}

/// Modular distance `a - b` for 16-bit sequence numbers, signed.
pub fn seq_diff(a: u16, b: u16) -> i32 {
    let raw = a.wrapping_sub(b) as i16;
    raw as i32
}

/// Quarter-space guard used to disambiguate a genuine 32-bit timestamp
/// wraparound from a large forward step.
pub const TS_ROUND_QUARD: u32 = 0x4000_0000;

pub fn ts_is_newer(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff != 0 && diff < TS_ROUND_QUARD * 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn round_trip_scenario_1() {
        let header = Header {
            padding: false,
            marker: true,
            payload_type: 99,
            sequence_number: 42371,
            timestamp: 57800,
            ssrc: 0x927D_CD02,
            csrc: vec![],
            extension_profile: 0xBEDE,
            extension: Some(Bytes::from_static(&[0x41, 0x78, 0x42, 0x00])),
        };
        let payload = Bytes::from_static(&[
            0x67, 0x42, 0xC0, 0x0C, 0xDA, 0x0F, 0x0A, 0x69, 0xA8, 0x10, 0x10, 0x10, 0x3C, 0x58,
            0xBA, 0x80,
        ]);
        let pkt = RtpPacket::new(header, payload.clone());
        let wire = pkt.marshal().unwrap();

        let expected: &[u8] = &[
            0x90, 0xE3, 0xA5, 0x83, 0x00, 0x00, 0xE1, 0xC8, 0x92, 0x7D, 0xCD, 0x02, 0xBE, 0xDE,
            0x00, 0x01, 0x41, 0x78, 0x42, 0x00, 0x67, 0x42, 0xC0, 0x0C, 0xDA, 0x0F, 0x0A, 0x69,
            0xA8, 0x10, 0x10, 0x10, 0x3C, 0x58, 0xBA, 0x80,
        ];
        assert_eq!(&wire[..], expected);

        let decoded = RtpPacket::unmarshal(&wire).unwrap();
        assert_eq!(decoded.header, pkt.header);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn sequence_wraparound_is_newer() {
        assert!(seq_is_newer(1, 0xFFFF));
        assert!(!seq_is_newer(0xFFFF, 1));
    }

    #[test]
    fn padding_strips_trailing_bytes() {
        let header = Header {
            padding: true,
            ..Default::default()
        };
        let mut payload = BytesMut::new();
        payload.extend_from_slice(&[1, 2, 3, 0, 0, 2]);
        let raw_header = header.marshal().unwrap();
        let mut raw = BytesMut::new();
        raw.extend_from_slice(&raw_header);
        raw.extend_from_slice(&payload);
        let raw = raw.freeze();

        let decoded = RtpPacket::unmarshal(&raw).unwrap();
        assert_eq!(&decoded.payload[..], &[1, 2, 3, 0]);
    }
}
