use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ims_shared::{Error, Result};

use crate::header::{Header, PacketType, HEADER_LENGTH};
use crate::packet::RtcpPacket;

/// One RTCP-XR report block, RFC 3611 §4. Only the block types this
/// engine's media-quality analyzer produces are modeled; an unrecognized
/// block type is kept as `Unknown` so a compound packet can still be
/// forwarded unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrBlock {
    /// Loss Run-Length Encoding report, block type 1.
    LossRle {
        ssrc: u32,
        begin_seq: u16,
        end_seq: u16,
        chunks: Vec<u16>,
    },
    /// Duplicate Run-Length Encoding report, block type 2.
    DuplicateRle {
        ssrc: u32,
        begin_seq: u16,
        end_seq: u16,
        chunks: Vec<u16>,
    },
    /// Packet Receipt Times report, block type 3.
    ReceiptTimes {
        ssrc: u32,
        begin_seq: u16,
        end_seq: u16,
        receipt_times: Vec<u32>,
    },
    /// Receiver Reference Time report, block type 4.
    RcvrReferenceTime { ntp_time: u64 },
    /// DLRR report, block type 5.
    Dlrr {
        sub_blocks: Vec<(u32, u32, u32)>, // ssrc, last_rr, delay_since_last_rr
    },
    /// Statistics Summary report, block type 6.
    StatisticsSummary {
        ssrc: u32,
        begin_seq: u16,
        end_seq: u16,
        lost_packets: u32,
        dup_packets: u32,
        min_jitter: u32,
        max_jitter: u32,
        mean_jitter: u32,
        dev_jitter: u32,
    },
    /// VoIP Metrics report, block type 7.
    VoipMetrics {
        ssrc: u32,
        loss_rate: u8,
        discard_rate: u8,
        burst_density: u8,
        gap_density: u8,
        burst_duration: u16,
        gap_duration: u16,
        round_trip_delay: u16,
        end_system_delay: u16,
        signal_level: u8,
        noise_level: u8,
        r_factor: u8,
        mos_lq: u8,
        mos_cq: u8,
        jb_nominal: u16,
        jb_maximum: u16,
        jb_abs_max: u16,
    },
    Unknown { block_type: u8, body: Bytes },
}

impl XrBlock {
    fn block_type(&self) -> u8 {
        match self {
            XrBlock::LossRle { .. } => 1,
            XrBlock::DuplicateRle { .. } => 2,
            XrBlock::ReceiptTimes { .. } => 3,
            XrBlock::RcvrReferenceTime { .. } => 4,
            XrBlock::Dlrr { .. } => 5,
            XrBlock::StatisticsSummary { .. } => 6,
            XrBlock::VoipMetrics { .. } => 7,
            XrBlock::Unknown { block_type, .. } => *block_type,
        }
    }

    fn body_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            XrBlock::LossRle {
                ssrc,
                begin_seq,
                end_seq,
                chunks,
            }
            | XrBlock::DuplicateRle {
                ssrc,
                begin_seq,
                end_seq,
                chunks,
            } => {
                buf.put_u32(*ssrc);
                buf.put_u16(*begin_seq);
                buf.put_u16(*end_seq);
                for c in chunks {
                    buf.put_u16(*c);
                }
            }
            XrBlock::ReceiptTimes {
                ssrc,
                begin_seq,
                end_seq,
                receipt_times,
            } => {
                buf.put_u32(*ssrc);
                buf.put_u16(*begin_seq);
                buf.put_u16(*end_seq);
                for t in receipt_times {
                    buf.put_u32(*t);
                }
            }
            XrBlock::RcvrReferenceTime { ntp_time } => {
                buf.put_u64(*ntp_time);
            }
            XrBlock::Dlrr { sub_blocks } => {
                for (ssrc, last_rr, delay) in sub_blocks {
                    buf.put_u32(*ssrc);
                    buf.put_u32(*last_rr);
                    buf.put_u32(*delay);
                }
            }
            XrBlock::StatisticsSummary {
                ssrc,
                begin_seq,
                end_seq,
                lost_packets,
                dup_packets,
                min_jitter,
                max_jitter,
                mean_jitter,
                dev_jitter,
            } => {
                buf.put_u32(*ssrc);
                buf.put_u16(*begin_seq);
                buf.put_u16(*end_seq);
                buf.put_u32(*lost_packets);
                buf.put_u32(*dup_packets);
                buf.put_u32(*min_jitter);
                buf.put_u32(*max_jitter);
                buf.put_u32(*mean_jitter);
                buf.put_u32(*dev_jitter);
            }
            XrBlock::VoipMetrics {
                ssrc,
                loss_rate,
                discard_rate,
                burst_density,
                gap_density,
                burst_duration,
                gap_duration,
                round_trip_delay,
                end_system_delay,
                signal_level,
                noise_level,
                r_factor,
                mos_lq,
                mos_cq,
                jb_nominal,
                jb_maximum,
                jb_abs_max,
            } => {
                buf.put_u32(*ssrc);
                buf.put_u8(*loss_rate);
                buf.put_u8(*discard_rate);
                buf.put_u8(*burst_density);
                buf.put_u8(*gap_density);
                buf.put_u16(*burst_duration);
                buf.put_u16(*gap_duration);
                buf.put_u16(*round_trip_delay);
                buf.put_u16(*end_system_delay);
                buf.put_u8(*signal_level);
                buf.put_u8(*noise_level);
                buf.put_u8(0); // RERL, not tracked by the analyzer
                buf.put_u8(0); // Gmin, unused
                buf.put_u8(*r_factor);
                buf.put_u8(0); // ext R factor, unused
                buf.put_u8(*mos_lq);
                buf.put_u8(*mos_cq);
                buf.put_u8(0); // rx config
                buf.put_u8(0); // reserved
                buf.put_u16(*jb_nominal);
                buf.put_u16(*jb_maximum);
                buf.put_u16(*jb_abs_max);
            }
            XrBlock::Unknown { body, .. } => buf.extend_from_slice(body),
        }
        while buf.len() % 4 != 0 {
            buf.put_u8(0);
        }
        buf.freeze()
    }

    fn marshal(&self) -> Bytes {
        let body = self.body_bytes();
        let mut buf = BytesMut::with_capacity(4 + body.len());
        buf.put_u8(self.block_type());
        buf.put_u8(0);
        buf.put_u16((body.len() / 4) as u16);
        buf.extend_from_slice(&body);
        buf.freeze()
    }

    fn unmarshal(mut reader: Bytes) -> Result<(Self, Bytes)> {
        if reader.remaining() < 4 {
            return Err(Error::ErrBufferShort {
                need: 4,
                have: reader.remaining(),
            });
        }
        let block_type = reader.get_u8();
        let _reserved = reader.get_u8();
        let len_words = reader.get_u16() as usize;
        let body_len = len_words * 4;
        if reader.remaining() < body_len {
            return Err(Error::ErrBufferShort {
                need: body_len,
                have: reader.remaining(),
            });
        }
        let mut body = reader.copy_to_bytes(body_len);
        let block = match block_type {
            1 | 2 => {
                let ssrc = body.get_u32();
                let begin_seq = body.get_u16();
                let end_seq = body.get_u16();
                let mut chunks = Vec::new();
                while body.remaining() >= 2 {
                    chunks.push(body.get_u16());
                }
                if block_type == 1 {
                    XrBlock::LossRle {
                        ssrc,
                        begin_seq,
                        end_seq,
                        chunks,
                    }
                } else {
                    XrBlock::DuplicateRle {
                        ssrc,
                        begin_seq,
                        end_seq,
                        chunks,
                    }
                }
            }
            3 => {
                let ssrc = body.get_u32();
                let begin_seq = body.get_u16();
                let end_seq = body.get_u16();
                let mut receipt_times = Vec::new();
                while body.remaining() >= 4 {
                    receipt_times.push(body.get_u32());
                }
                XrBlock::ReceiptTimes {
                    ssrc,
                    begin_seq,
                    end_seq,
                    receipt_times,
                }
            }
            4 => XrBlock::RcvrReferenceTime {
                ntp_time: body.get_u64(),
            },
            5 => {
                let mut sub_blocks = Vec::new();
                while body.remaining() >= 12 {
                    sub_blocks.push((body.get_u32(), body.get_u32(), body.get_u32()));
                }
                XrBlock::Dlrr { sub_blocks }
            }
            6 => XrBlock::StatisticsSummary {
                ssrc: body.get_u32(),
                begin_seq: body.get_u16(),
                end_seq: body.get_u16(),
                lost_packets: body.get_u32(),
                dup_packets: body.get_u32(),
                min_jitter: body.get_u32(),
                max_jitter: body.get_u32(),
                mean_jitter: body.get_u32(),
                dev_jitter: body.get_u32(),
            },
            7 => {
                let ssrc = body.get_u32();
                let loss_rate = body.get_u8();
                let discard_rate = body.get_u8();
                let burst_density = body.get_u8();
                let gap_density = body.get_u8();
                let burst_duration = body.get_u16();
                let gap_duration = body.get_u16();
                let round_trip_delay = body.get_u16();
                let end_system_delay = body.get_u16();
                let signal_level = body.get_u8();
                let noise_level = body.get_u8();
                let _rerl = body.get_u8();
                let _gmin = body.get_u8();
                let r_factor = body.get_u8();
                let _ext_r_factor = body.get_u8();
                let mos_lq = body.get_u8();
                let mos_cq = body.get_u8();
                let _rx_config = body.get_u8();
                let _reserved2 = body.get_u8();
                let jb_nominal = body.get_u16();
                let jb_maximum = body.get_u16();
                let jb_abs_max = body.get_u16();
                XrBlock::VoipMetrics {
                    ssrc,
                    loss_rate,
                    discard_rate,
                    burst_density,
                    gap_density,
                    burst_duration,
                    gap_duration,
                    round_trip_delay,
                    end_system_delay,
                    signal_level,
                    noise_level,
                    r_factor,
                    mos_lq,
                    mos_cq,
                    jb_nominal,
                    jb_maximum,
                    jb_abs_max,
                }
            }
            other => XrBlock::Unknown {
                block_type: other,
                body,
            },
        };
        Ok((block, reader))
    }
}

/// RTCP Extended Report packet (RFC 3611 §3): a report-originator SSRC
/// followed by a chain of typed blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedReport {
    pub ssrc: u32,
    pub blocks: Vec<XrBlock>,
}

impl ExtendedReport {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: 0,
            packet_type: PacketType::ExtendedReport,
            length: (self.marshal_size() / 4 - 1) as u16,
        }
    }

    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        let header = Header::unmarshal(raw)?;
        if header.packet_type != PacketType::ExtendedReport {
            return Err(Error::ErrInvalidMsg);
        }
        if raw.len() < HEADER_LENGTH + 4 {
            return Err(Error::ErrBufferShort {
                need: HEADER_LENGTH + 4,
                have: raw.len(),
            });
        }
        let mut reader = raw.slice(HEADER_LENGTH..);
        let ssrc = reader.get_u32();
        let mut blocks = Vec::new();
        while reader.has_remaining() {
            let (block, rest) = XrBlock::unmarshal(reader)?;
            blocks.push(block);
            reader = rest;
        }
        Ok(ExtendedReport { ssrc, blocks })
    }
}

impl RtcpPacket for ExtendedReport {
    fn destination_ssrc(&self) -> Vec<u32> {
        vec![self.ssrc]
    }

    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + 4 + self.blocks.iter().map(|b| 4 + b.body_bytes().len()).sum::<usize>()
    }

    fn marshal(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&self.header().marshal()?);
        buf.put_u32(self.ssrc);
        for block in &self.blocks {
            buf.extend_from_slice(&block.marshal());
        }
        Ok(buf.freeze())
    }

    fn equal(&self, other: &dyn RtcpPacket) -> bool {
        other
            .as_any()
            .downcast_ref::<ExtendedReport>()
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
    fn round_trip_voip_metrics() {
        let xr = ExtendedReport {
            ssrc: 1,
            blocks: vec![XrBlock::VoipMetrics {
                ssrc: 2,
                loss_rate: 5,
                discard_rate: 0,
                burst_density: 0,
                gap_density: 0,
                burst_duration: 0,
                gap_duration: 0,
                round_trip_delay: 40,
                end_system_delay: 10,
                signal_level: 0,
                noise_level: 0,
                r_factor: 90,
                mos_lq: 40,
                mos_cq: 40,
                jb_nominal: 20,
                jb_maximum: 60,
                jb_abs_max: 120,
            }],
        };
        let wire = xr.marshal().unwrap();
        let back = ExtendedReport::unmarshal(&wire).unwrap();
        assert_eq!(back, xr);
    }

    #[test]
    fn round_trip_loss_rle() {
        let xr = ExtendedReport {
            ssrc: 9,
            blocks: vec![XrBlock::LossRle {
                ssrc: 10,
                begin_seq: 0,
                end_seq: 20,
                chunks: vec![0x8001, 0x0005],
            }],
        };
        let wire = xr.marshal().unwrap();
        let back = ExtendedReport::unmarshal(&wire).unwrap();
        assert_eq!(back, xr);
    }
}
