use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::{get_padding, Header, PacketType, COUNT_MAX, HEADER_LENGTH};
use crate::packet::RtcpPacket;
use crate::report_block::{ReportBlock, REPORT_BLOCK_LENGTH};

pub const SR_BODY_LENGTH: usize = 20;

/// RTCP Sender Report (RFC 3550 §6.4.1): sender info plus zero or more
/// reception report blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp_time: u64,
    pub rtp_time: u32,
    pub packet_count: u32,
    pub octet_count: u32,
    pub reports: Vec<ReportBlock>,
}

impl SenderReport {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.reports.len() as u8,
            packet_type: PacketType::SenderReport,
            length: (self.marshal_size() / 4 - 1) as u16,
        }
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < HEADER_LENGTH + SR_BODY_LENGTH {
            return Err(Error::ErrBufferShort {
                need: HEADER_LENGTH + SR_BODY_LENGTH,
                have: raw.len(),
            });
        }
        let header = Header::unmarshal(raw)?;
        if header.packet_type != PacketType::SenderReport {
            return Err(Error::ErrInvalidMsg);
        }
        let mut reader = raw.slice(HEADER_LENGTH..);
        let ssrc = reader.get_u32();
        let ntp_time = reader.get_u64();
        let rtp_time = reader.get_u32();
        let packet_count = reader.get_u32();
        let octet_count = reader.get_u32();

        let mut reports = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            if reader.remaining() < REPORT_BLOCK_LENGTH {
                return Err(Error::ErrBufferShort {
                    need: REPORT_BLOCK_LENGTH,
                    have: reader.remaining(),
                });
            }
            let block_bytes = reader.copy_to_bytes(REPORT_BLOCK_LENGTH);
            reports.push(ReportBlock::unmarshal(&block_bytes)?);
        }

        Ok(SenderReport {
            ssrc,
            ntp_time,
            rtp_time,
            packet_count,
            octet_count,
            reports,
        })
    }
}

impl RtcpPacket for SenderReport {
    fn destination_ssrc(&self) -> Vec<u32> {
        let mut out: Vec<u32> = self.reports.iter().map(|r| r.ssrc).collect();
        out.push(self.ssrc);
        out
    }

    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + SR_BODY_LENGTH + self.reports.len() * REPORT_BLOCK_LENGTH
    }

    fn marshal(&self) -> Result<Bytes> {
        if self.reports.len() > COUNT_MAX {
            return Err(Error::ErrTooManyReports);
        }
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&self.header().marshal()?);
        buf.put_u32(self.ssrc);
        buf.put_u64(self.ntp_time);
        buf.put_u32(self.rtp_time);
        buf.put_u32(self.packet_count);
        buf.put_u32(self.octet_count);
        for report in &self.reports {
            buf.extend_from_slice(&report.marshal()?);
        }
        let _ = get_padding(buf.len());
        Ok(buf.freeze())
    }

    fn equal(&self, other: &dyn RtcpPacket) -> bool {
        other
            .as_any()
            .downcast_ref::<SenderReport>()
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
    fn round_trip_with_one_report() {
        let sr = SenderReport {
            ssrc: 1,
            ntp_time: 0x1122_3344_5566_7788,
            rtp_time: 9000,
            packet_count: 12,
            octet_count: 1400,
            reports: vec![ReportBlock {
                ssrc: 2,
                fraction_lost: 1,
                total_lost: 3,
                last_sequence_number: 55,
                jitter: 7,
                last_sr: 0,
                delay_since_last_sr: 0,
            }],
        };
        let wire = sr.marshal().unwrap();
        let back = SenderReport::unmarshal(&wire).unwrap();
        assert_eq!(back, sr);
    }
}
