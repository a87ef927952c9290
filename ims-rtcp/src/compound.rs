use bytes::{Buf, Bytes};
use ims_shared::{Error, Result};

use crate::app::App;
use crate::bye::Goodbye;
use crate::feedback::{PsFb, RtpFb};
use crate::header::{Header, PacketType, HEADER_LENGTH};
use crate::packet::RtcpPacket;
use crate::receiver_report::ReceiverReport;
use crate::sdes::SourceDescription;
use crate::sender_report::SenderReport;
use crate::xr::ExtendedReport;

/// An ordered RTCP compound packet: a list of individually-typed RTCP
/// packets read back-to-back off the wire. Resolves the spec's one open
/// ambiguity (two competing `RtcpPacket` implementations in the source)
/// in favour of a single implementation over a standard ordered list,
/// validated on decode to open with SR, RR or a feedback packet and to
/// contain at least one of {SR, RR, FB, BYE}.
#[derive(Debug, Default)]
pub struct CompoundPacket {
    pub packets: Vec<Box<dyn RtcpPacket>>,
}

impl CompoundPacket {
    pub fn marshal(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        for packet in &self.packets {
            buf.extend_from_slice(&packet.marshal()?);
        }
        Ok(Bytes::from(buf))
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        let mut packets: Vec<Box<dyn RtcpPacket>> = Vec::new();
        let mut cursor = raw.clone();
        let mut first = true;

        while cursor.has_remaining() {
            if cursor.remaining() < HEADER_LENGTH {
                return Err(Error::ErrBufferShort {
                    need: HEADER_LENGTH,
                    have: cursor.remaining(),
                });
            }
            let header = Header::unmarshal(&cursor)?;
            let packet_len = (header.length as usize + 1) * 4;
            if cursor.remaining() < packet_len {
                return Err(Error::ErrBufferShort {
                    need: packet_len,
                    have: cursor.remaining(),
                });
            }
            let packet_bytes = cursor.copy_to_bytes(packet_len);

            if first {
                match header.packet_type {
                    PacketType::SenderReport
                    | PacketType::ReceiverReport
                    | PacketType::TransportSpecificFeedback
                    | PacketType::PayloadSpecificFeedback => {}
                    _ => return Err(Error::ErrRtcpHeaderOrder),
                }
                first = false;
            }

            let parsed: Box<dyn RtcpPacket> = match header.packet_type {
                PacketType::SenderReport => Box::new(SenderReport::unmarshal(&packet_bytes)?),
                PacketType::ReceiverReport => Box::new(ReceiverReport::unmarshal(&packet_bytes)?),
                PacketType::SourceDescription => {
                    Box::new(SourceDescription::unmarshal(&packet_bytes)?)
                }
                PacketType::Goodbye => Box::new(Goodbye::unmarshal(&packet_bytes)?),
                PacketType::ApplicationDefined => Box::new(App::unmarshal(&packet_bytes)?),
                PacketType::TransportSpecificFeedback => {
                    Box::new(RtpFb::unmarshal(&packet_bytes)?)
                }
                PacketType::PayloadSpecificFeedback => Box::new(PsFb::unmarshal(&packet_bytes)?),
                PacketType::ExtendedReport => Box::new(ExtendedReport::unmarshal(&packet_bytes)?),
                PacketType::Unknown(_) => return Err(Error::ErrInvalidMsg),
            };
            packets.push(parsed);
        }

        if packets.is_empty() {
            return Err(Error::ErrRtcpHeaderOrder);
        }
        let has_required = packets.iter().any(|p| {
            let any = p.as_any();
            any.is::<SenderReport>()
                || any.is::<ReceiverReport>()
                || any.is::<RtpFb>()
                || any.is::<PsFb>()
                || any.is::<Goodbye>()
        });
        if !has_required {
            return Err(Error::ErrRtcpHeaderOrder);
        }

        Ok(CompoundPacket { packets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver_report::ReceiverReport;
    use crate::sdes::SourceDescription;

    #[test]
    fn rr_plus_sdes_round_trips() {
        let compound = CompoundPacket {
            packets: vec![
                Box::new(ReceiverReport {
                    ssrc: 1,
                    reports: vec![],
                }),
                Box::new(SourceDescription::cname(1, "a@b")),
            ],
        };
        let wire = compound.marshal().unwrap();
        let back = CompoundPacket::unmarshal(&wire).unwrap();
        assert_eq!(back.packets.len(), 2);
    }

    #[test]
    fn rejects_sdes_only() {
        let wire = SourceDescription::cname(1, "a@b").marshal().unwrap();
        assert!(matches!(
            CompoundPacket::unmarshal(&wire),
            Err(Error::ErrRtcpHeaderOrder)
        ));
    }
}
