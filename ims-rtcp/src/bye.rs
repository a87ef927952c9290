use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::{Header, PacketType, COUNT_MAX, HEADER_LENGTH};
use crate::packet::RtcpPacket;

/// RTCP Goodbye packet (RFC 3550 §6.6): a list of leaving SSRCs plus an
/// optional reason string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Goodbye {
    pub sources: Vec<u32>,
    pub reason: Option<Bytes>,
}

impl Goodbye {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.sources.len() as u8,
            packet_type: PacketType::Goodbye,
            length: (self.marshal_size() / 4 - 1) as u16,
        }
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        let header = Header::unmarshal(raw)?;
        if header.packet_type != PacketType::Goodbye {
            return Err(Error::ErrInvalidMsg);
        }
        let mut reader = raw.slice(HEADER_LENGTH..);
        if reader.remaining() < header.count as usize * 4 {
            return Err(Error::ErrBufferShort {
                need: header.count as usize * 4,
                have: reader.remaining(),
            });
        }
        let mut sources = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            sources.push(reader.get_u32());
        }
        let reason = if reader.has_remaining() {
            let len = reader.get_u8() as usize;
            if reader.remaining() < len {
                return Err(Error::ErrBufferShort {
                    need: len,
                    have: reader.remaining(),
                });
            }
            Some(reader.copy_to_bytes(len))
        } else {
            None
        };
        Ok(Goodbye { sources, reason })
    }
}

impl RtcpPacket for Goodbye {
    fn destination_ssrc(&self) -> Vec<u32> {
        self.sources.clone()
    }

    fn marshal_size(&self) -> usize {
        let mut n = HEADER_LENGTH + self.sources.len() * 4;
        if let Some(reason) = &self.reason {
            n += 1 + reason.len();
        }
        n.div_ceil(4) * 4
    }

    fn marshal(&self) -> Result<Bytes> {
        if self.sources.len() > COUNT_MAX {
            return Err(Error::ErrTooManyReports);
        }
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&self.header().marshal()?);
        for ssrc in &self.sources {
            buf.put_u32(*ssrc);
        }
        if let Some(reason) = &self.reason {
            buf.put_u8(reason.len() as u8);
            buf.extend_from_slice(reason);
        }
        while buf.len() % 4 != 0 {
            buf.put_u8(0);
        }
        Ok(buf.freeze())
    }

    fn equal(&self, other: &dyn RtcpPacket) -> bool {
        other
            .as_any()
            .downcast_ref::<Goodbye>()
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
    fn round_trip_with_reason() {
        let bye = Goodbye {
            sources: vec![1, 2],
            reason: Some(Bytes::from_static(b"done")),
        };
        let wire = bye.marshal().unwrap();
        let back = Goodbye::unmarshal(&wire).unwrap();
        assert_eq!(back, bye);
    }
}
