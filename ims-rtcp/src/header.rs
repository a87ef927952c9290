use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

pub const HEADER_LENGTH: usize = 4;
pub const COUNT_MAX: usize = 31;

/// RTCP packet type values in use by this stack (RFC 3550 §12.1,
/// RFC 4585/5104 §6.1 for the feedback types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    SenderReport,
    ReceiverReport,
    SourceDescription,
    Goodbye,
    ApplicationDefined,
    TransportSpecificFeedback,
    PayloadSpecificFeedback,
    ExtendedReport,
    Unknown(u8),
}

impl PacketType {
    pub fn to_u8(self) -> u8 {
        match self {
            PacketType::SenderReport => 200,
            PacketType::ReceiverReport => 201,
            PacketType::SourceDescription => 202,
            PacketType::Goodbye => 203,
            PacketType::ApplicationDefined => 204,
            PacketType::TransportSpecificFeedback => 205,
            PacketType::PayloadSpecificFeedback => 206,
            PacketType::ExtendedReport => 207,
            PacketType::Unknown(v) => v,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            200 => PacketType::SenderReport,
            201 => PacketType::ReceiverReport,
            202 => PacketType::SourceDescription,
            203 => PacketType::Goodbye,
            204 => PacketType::ApplicationDefined,
            205 => PacketType::TransportSpecificFeedback,
            206 => PacketType::PayloadSpecificFeedback,
            207 => PacketType::ExtendedReport,
            other => PacketType::Unknown(other),
        }
    }
}

/// Common 32-bit RTCP header: version(2) padding(1) count(5) type(8) length(16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub padding: bool,
    pub count: u8,
    pub packet_type: PacketType,
    pub length: u16,
}

impl Header {
    pub fn marshal(&self) -> Result<Bytes> {
        if self.count as usize > COUNT_MAX {
            return Err(Error::ErrTooManyReports);
        }
        let mut buf = BytesMut::with_capacity(HEADER_LENGTH);
        let mut b0 = 2u8 << 6;
        if self.padding {
            b0 |= 1 << 5;
        }
        b0 |= self.count & 0x1F;
        buf.put_u8(b0);
        buf.put_u8(self.packet_type.to_u8());
        buf.put_u16(self.length);
        Ok(buf.freeze())
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < HEADER_LENGTH {
            return Err(Error::ErrBufferShort {
                need: HEADER_LENGTH,
                have: raw.len(),
            });
        }
        let mut reader = raw.clone();
        let b0 = reader.get_u8();
        let version = b0 >> 6;
        if version != 2 {
            return Err(Error::ErrUnsupportedVersion);
        }
        let padding = (b0 >> 5) & 1 != 0;
        let count = b0 & 0x1F;
        let packet_type = PacketType::from_u8(reader.get_u8());
        let length = reader.get_u16();
        Ok(Header {
            padding,
            count,
            packet_type,
            length,
        })
    }
}

/// Computes the zero-padding length (0 or enough to reach a 4-byte
/// boundary) for a packet of `size` bytes, mirroring the teacher's
/// `get_padding`/`put_padding` helper pair.
pub fn get_padding(size: usize) -> usize {
    if size % 4 == 0 {
        0
    } else {
        4 - (size % 4)
    }
}

pub fn put_padding(buf: &mut BytesMut) {
    let pad = get_padding(buf.len());
    for _ in 0..pad {
        buf.put_u8(0);
    }
}
