use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::{Header, PacketType, HEADER_LENGTH};
use crate::packet::RtcpPacket;

/// RTPFB (transport-layer) format/subtype values actually produced by
/// this stack (RFC 4585 §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpFbKind {
    Nack,
    Tmmbr,
    Tmmbn,
    Other(u8),
}

impl RtpFbKind {
    fn to_u8(self) -> u8 {
        match self {
            RtpFbKind::Nack => 1,
            RtpFbKind::Tmmbr => 3,
            RtpFbKind::Tmmbn => 4,
            RtpFbKind::Other(v) => v,
        }
    }
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RtpFbKind::Nack,
            3 => RtpFbKind::Tmmbr,
            4 => RtpFbKind::Tmmbn,
            other => RtpFbKind::Other(other),
        }
    }
}

/// Generic transport-layer feedback packet; the FCI body is opaque to
/// this layer (NACK bitmask, TMMBR bandwidth tuple, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpFb {
    pub kind: RtpFbKind,
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub fci: Bytes,
}

/// PSFB (payload-specific) format/subtype values (RFC 4585 §6.3,
/// RFC 5104 §4.3 for FIR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsFbKind {
    Pli,
    Fir,
    Other(u8),
}

impl PsFbKind {
    fn to_u8(self) -> u8 {
        match self {
            PsFbKind::Pli => 1,
            PsFbKind::Fir => 4,
            PsFbKind::Other(v) => v,
        }
    }
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PsFbKind::Pli,
            4 => PsFbKind::Fir,
            other => PsFbKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsFb {
    pub kind: PsFbKind,
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub fci: Bytes,
}

macro_rules! impl_fb {
    ($ty:ident, $kind_ty:ident, $packet_type:expr) => {
        impl $ty {
            fn header(&self) -> Header {
                Header {
                    padding: false,
                    count: self.kind.to_u8(),
                    packet_type: $packet_type,
                    length: (self.marshal_size() / 4 - 1) as u16,
                }
            }

            pub fn unmarshal(raw: &Bytes) -> Result<Self> {
                let header = Header::unmarshal(raw)?;
                if header.packet_type != $packet_type {
                    return Err(Error::ErrInvalidMsg);
                }
                if raw.len() < HEADER_LENGTH + 8 {
                    return Err(Error::ErrBufferShort {
                        need: HEADER_LENGTH + 8,
                        have: raw.len(),
                    });
                }
                let mut reader = raw.slice(HEADER_LENGTH..);
                let sender_ssrc = reader.get_u32();
                let media_ssrc = reader.get_u32();
                let fci = reader.copy_to_bytes(reader.remaining());
                Ok($ty {
                    kind: $kind_ty::from_u8(header.count),
                    sender_ssrc,
                    media_ssrc,
                    fci,
                })
            }
        }

        impl RtcpPacket for $ty {
            fn destination_ssrc(&self) -> Vec<u32> {
                vec![self.media_ssrc]
            }

            fn marshal_size(&self) -> usize {
                (HEADER_LENGTH + 8 + self.fci.len()).div_ceil(4) * 4
            }

            fn marshal(&self) -> Result<Bytes> {
                let mut buf = BytesMut::with_capacity(self.marshal_size());
                buf.extend_from_slice(&self.header().marshal()?);
                buf.put_u32(self.sender_ssrc);
                buf.put_u32(self.media_ssrc);
                buf.extend_from_slice(&self.fci);
                while buf.len() % 4 != 0 {
                    buf.put_u8(0);
                }
                Ok(buf.freeze())
            }

            fn equal(&self, other: &dyn RtcpPacket) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$ty>()
                    .is_some_and(|o| o == self)
            }

            fn cloned(&self) -> Box<dyn RtcpPacket> {
                Box::new(self.clone())
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

impl_fb!(RtpFb, RtpFbKind, PacketType::TransportSpecificFeedback);
impl_fb!(PsFb, PsFbKind, PacketType::PayloadSpecificFeedback);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pli_round_trip() {
        let pli = PsFb {
            kind: PsFbKind::Pli,
            sender_ssrc: 1,
            media_ssrc: 2,
            fci: Bytes::new(),
        };
        let wire = pli.marshal().unwrap();
        let back = PsFb::unmarshal(&wire).unwrap();
        assert_eq!(back, pli);
    }

    #[test]
    fn tmmbr_round_trip() {
        let tmmbr = RtpFb {
            kind: RtpFbKind::Tmmbr,
            sender_ssrc: 10,
            media_ssrc: 20,
            fci: Bytes::from_static(&[0, 0, 0, 1]),
        };
        let wire = tmmbr.marshal().unwrap();
        let back = RtpFb::unmarshal(&wire).unwrap();
        assert_eq!(back, tmmbr);
    }
}
