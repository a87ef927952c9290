use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::{Header, PacketType, COUNT_MAX, HEADER_LENGTH};
use crate::packet::RtcpPacket;
use crate::report_block::{ReportBlock, REPORT_BLOCK_LENGTH};

/// RTCP Receiver Report (RFC 3550 §6.4.2): identical to a Sender Report
/// minus the sender-info block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReportBlock>,
}

impl ReceiverReport {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.reports.len() as u8,
            packet_type: PacketType::ReceiverReport,
            length: (self.marshal_size() / 4 - 1) as u16,
        }
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < HEADER_LENGTH + 4 {
            return Err(Error::ErrBufferShort {
                need: HEADER_LENGTH + 4,
                have: raw.len(),
            });
        }
        let header = Header::unmarshal(raw)?;
        if header.packet_type != PacketType::ReceiverReport {
            return Err(Error::ErrInvalidMsg);
        }
        let mut reader = raw.slice(HEADER_LENGTH..);
        let ssrc = reader.get_u32();
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
        Ok(ReceiverReport { ssrc, reports })
    }
}

impl RtcpPacket for ReceiverReport {
    fn destination_ssrc(&self) -> Vec<u32> {
        let mut out: Vec<u32> = self.reports.iter().map(|r| r.ssrc).collect();
        out.push(self.ssrc);
        out
    }

    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + 4 + self.reports.len() * REPORT_BLOCK_LENGTH
    }

    fn marshal(&self) -> Result<Bytes> {
        if self.reports.len() > COUNT_MAX {
            return Err(Error::ErrTooManyReports);
        }
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&self.header().marshal()?);
        buf.put_u32(self.ssrc);
        for report in &self.reports {
            buf.extend_from_slice(&report.marshal()?);
        }
        Ok(buf.freeze())
    }

    fn equal(&self, other: &dyn RtcpPacket) -> bool {
        other
            .as_any()
            .downcast_ref::<ReceiverReport>()
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
    fn round_trip_no_reports() {
        let rr = ReceiverReport {
            ssrc: 42,
            reports: vec![],
        };
        let wire = rr.marshal().unwrap();
        let back = ReceiverReport::unmarshal(&wire).unwrap();
        assert_eq!(back, rr);
    }
}
