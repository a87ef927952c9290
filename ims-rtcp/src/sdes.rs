use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::{Header, PacketType, COUNT_MAX, HEADER_LENGTH};
use crate::packet::RtcpPacket;

/// SDES item types this stack produces/recognizes (RFC 3550 §6.5). Only
/// CNAME is mandatory; others are carried opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdesItemType {
    Cname,
    Name,
    Email,
    Phone,
    Loc,
    Tool,
    Note,
    Priv,
    Other(u8),
}

impl SdesItemType {
    fn to_u8(self) -> u8 {
        match self {
            SdesItemType::Cname => 1,
            SdesItemType::Name => 2,
            SdesItemType::Email => 3,
            SdesItemType::Phone => 4,
            SdesItemType::Loc => 5,
            SdesItemType::Tool => 6,
            SdesItemType::Note => 7,
            SdesItemType::Priv => 8,
            SdesItemType::Other(v) => v,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => SdesItemType::Cname,
            2 => SdesItemType::Name,
            3 => SdesItemType::Email,
            4 => SdesItemType::Phone,
            5 => SdesItemType::Loc,
            6 => SdesItemType::Tool,
            7 => SdesItemType::Note,
            8 => SdesItemType::Priv,
            other => SdesItemType::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesItem {
    pub item_type: SdesItemType,
    pub text: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub ssrc: u32,
    pub items: Vec<SdesItem>,
}

impl SdesChunk {
    fn marshal_size(&self) -> usize {
        let mut n = 4;
        for item in &self.items {
            n += 2 + item.text.len();
        }
        n += 1; // terminating null item
        n.div_ceil(4) * 4
    }
}

/// RTCP Source Description packet: a list of per-SSRC chunks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDescription {
    pub chunks: Vec<SdesChunk>,
}

impl SourceDescription {
    fn header(&self) -> Result<Header> {
        Ok(Header {
            padding: false,
            count: self.chunks.len() as u8,
            packet_type: PacketType::SourceDescription,
            length: (self.marshal_size() / 4 - 1) as u16,
        })
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        let header = Header::unmarshal(raw)?;
        if header.packet_type != PacketType::SourceDescription {
            return Err(Error::ErrInvalidMsg);
        }
        let mut reader = raw.slice(HEADER_LENGTH..);
        let mut chunks = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            if reader.remaining() < 4 {
                return Err(Error::ErrBufferShort {
                    need: 4,
                    have: reader.remaining(),
                });
            }
            let ssrc = reader.get_u32();
            let mut items = Vec::new();
            loop {
                if reader.remaining() == 0 {
                    return Err(Error::ErrInvalidMsg);
                }
                let item_type = reader.get_u8();
                if item_type == 0 {
                    break;
                }
                if reader.remaining() == 0 {
                    return Err(Error::ErrInvalidMsg);
                }
                let len = reader.get_u8() as usize;
                if reader.remaining() < len {
                    return Err(Error::ErrBufferShort {
                        need: len,
                        have: reader.remaining(),
                    });
                }
                let text = reader.copy_to_bytes(len);
                items.push(SdesItem {
                    item_type: SdesItemType::from_u8(item_type),
                    text,
                });
            }
            // consume padding up to a 4-byte boundary for this chunk
            let consumed = 4 + items.iter().map(|i| 2 + i.text.len()).sum::<usize>() + 1;
            let pad = (4 - (consumed % 4)) % 4;
            if reader.remaining() < pad {
                return Err(Error::ErrBufferShort {
                    need: pad,
                    have: reader.remaining(),
                });
            }
            reader.advance(pad);
            chunks.push(SdesChunk { ssrc, items });
        }
        Ok(SourceDescription { chunks })
    }
}

impl RtcpPacket for SourceDescription {
    fn destination_ssrc(&self) -> Vec<u32> {
        self.chunks.iter().map(|c| c.ssrc).collect()
    }

    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + self.chunks.iter().map(|c| c.marshal_size()).sum::<usize>()
    }

    fn marshal(&self) -> Result<Bytes> {
        if self.chunks.len() > COUNT_MAX {
            return Err(Error::ErrTooManyReports);
        }
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&self.header()?.marshal()?);
        for chunk in &self.chunks {
            let start = buf.len();
            buf.put_u32(chunk.ssrc);
            for item in &chunk.items {
                buf.put_u8(item.item_type.to_u8());
                buf.put_u8(item.text.len() as u8);
                buf.extend_from_slice(&item.text);
            }
            buf.put_u8(0);
            while (buf.len() - start) % 4 != 0 {
                buf.put_u8(0);
            }
        }
        Ok(buf.freeze())
    }

    fn equal(&self, other: &dyn RtcpPacket) -> bool {
        other
            .as_any()
            .downcast_ref::<SourceDescription>()
            .is_some_and(|o| o == self)
    }

    fn cloned(&self) -> Box<dyn RtcpPacket> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl SourceDescription {
    pub fn cname(ssrc: u32, cname: &str) -> Self {
        SourceDescription {
            chunks: vec![SdesChunk {
                ssrc,
                items: vec![SdesItem {
                    item_type: SdesItemType::Cname,
                    text: Bytes::copy_from_slice(cname.as_bytes()),
                }],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_cname() {
        let sdes = SourceDescription::cname(7, "user@host");
        let wire = sdes.marshal().unwrap();
        let back = SourceDescription::unmarshal(&wire).unwrap();
        assert_eq!(back, sdes);
    }
}
