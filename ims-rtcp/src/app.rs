use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::{Header, PacketType, HEADER_LENGTH};
use crate::packet::RtcpPacket;

/// RTCP Application-Defined packet (RFC 3550 §6.7).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct App {
    pub subtype: u8,
    pub ssrc: u32,
    pub name: [u8; 4],
    pub data: Bytes,
}

impl App {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.subtype & 0x1F,
            packet_type: PacketType::ApplicationDefined,
            length: (self.marshal_size() / 4 - 1) as u16,
        }
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        let header = Header::unmarshal(raw)?;
        if header.packet_type != PacketType::ApplicationDefined {
            return Err(Error::ErrInvalidMsg);
        }
        if raw.len() < HEADER_LENGTH + 8 {
            return Err(Error::ErrBufferShort {
                need: HEADER_LENGTH + 8,
                have: raw.len(),
            });
        }
        let mut reader = raw.slice(HEADER_LENGTH..);
        let ssrc = reader.get_u32();
        let mut name = [0u8; 4];
        reader.copy_to_slice(&mut name);
        let data = reader.copy_to_bytes(reader.remaining());
        Ok(App {
            subtype: header.count,
            ssrc,
            name,
            data,
        })
    }
}

impl RtcpPacket for App {
    fn destination_ssrc(&self) -> Vec<u32> {
        vec![self.ssrc]
    }

    fn marshal_size(&self) -> usize {
        (HEADER_LENGTH + 8 + self.data.len()).div_ceil(4) * 4
    }

    fn marshal(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&self.header().marshal()?);
        buf.put_u32(self.ssrc);
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.data);
        while buf.len() % 4 != 0 {
            buf.put_u8(0);
        }
        Ok(buf.freeze())
    }

    fn equal(&self, other: &dyn RtcpPacket) -> bool {
        other
            .as_any()
            .downcast_ref::<App>()
            .is_some_and(|o| o == self)
    }

    fn cloned(&self) -> Box<dyn RtcpPacket> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_data() {
        let app = App {
            subtype: 3,
            ssrc: 0x1234_5678,
            name: *b"IMSX",
            data: Bytes::from_static(&[1, 2, 3, 4, 5]),
        };
        let wire = app.marshal().unwrap();
        let back = App::unmarshal(&wire).unwrap();
        assert_eq!(back.subtype, app.subtype);
        assert_eq!(back.ssrc, app.ssrc);
        assert_eq!(back.name, app.name);
        assert_eq!(&back.data[..], &[1, 2, 3, 4, 5, 0, 0, 0]);
    }
}
