use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

pub const REPORT_BLOCK_LENGTH: usize = 24;

/// One reception report block, embedded in both SR and RR packets
/// (RFC 3550 §6.4.1/§6.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportBlock {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// Cumulative count of packets lost, a signed 24-bit quantity stored
    /// sign-extended into an i32.
    pub total_lost: i32,
    pub last_sequence_number: u32,
    pub jitter: u32,
    pub last_sr: u32,
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    pub fn marshal_size(&self) -> usize {
        REPORT_BLOCK_LENGTH
    }

    pub fn marshal(&self) -> Result<Bytes> {
        if !(-(1 << 23)..(1 << 23)).contains(&self.total_lost) {
            return Err(Error::ErrInvalidMsg);
        }
        let mut buf = BytesMut::with_capacity(REPORT_BLOCK_LENGTH);
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        let raw = (self.total_lost as u32) & 0x00FF_FFFF;
        buf.put_u8((raw >> 16) as u8);
        buf.put_u8((raw >> 8) as u8);
        buf.put_u8(raw as u8);
        buf.put_u32(self.last_sequence_number);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sr);
        buf.put_u32(self.delay_since_last_sr);
        Ok(buf.freeze())
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < REPORT_BLOCK_LENGTH {
            return Err(Error::ErrBufferShort {
                need: REPORT_BLOCK_LENGTH,
                have: raw.len(),
            });
        }
        let mut reader = raw.clone();
        let ssrc = reader.get_u32();
        let fraction_lost = reader.get_u8();
        let t0 = reader.get_u8() as u32;
        let t1 = reader.get_u8() as u32;
        let t2 = reader.get_u8() as u32;
        let mut total_lost = (t0 << 16) | (t1 << 8) | t2;
        if total_lost & 0x0080_0000 != 0 {
            total_lost |= 0xFF00_0000;
        }
        let last_sequence_number = reader.get_u32();
        let jitter = reader.get_u32();
        let last_sr = reader.get_u32();
        let delay_since_last_sr = reader.get_u32();
        Ok(ReportBlock {
            ssrc,
            fraction_lost,
            total_lost: total_lost as i32,
            last_sequence_number,
            jitter,
            last_sr,
            delay_since_last_sr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_negative_total_lost() {
        let rb = ReportBlock {
            ssrc: 0x1234,
            fraction_lost: 10,
            total_lost: -5,
            last_sequence_number: 99,
            jitter: 20,
            last_sr: 1,
            delay_since_last_sr: 2,
        };
        let wire = rb.marshal().unwrap();
        let back = ReportBlock::unmarshal(&wire).unwrap();
        assert_eq!(back, rb);
    }
}
