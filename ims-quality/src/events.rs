//! Event vocabulary the analyzer consumes, mirroring §4.7's
//! `kCollect*` handlers.

use ims_rtp::packet::RxStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    RtpTx,
    RtpRx,
    Rtcp,
}

#[derive(Debug, Clone, Copy)]
pub struct PacketInfo {
    pub direction: StreamDirection,
    pub sequence: u16,
    pub is_sid: bool,
    pub byte_len: usize,
    pub jitter_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub enum OptionalInfo {
    /// A gap of `count` packets was confirmed lost (e.g. via RTCP-XR
    /// loss RLE on the peer, or local sequence-gap timeout).
    PacketLossGap { count: u32 },
    RoundTripDelayMs(f64),
    TimeToLive(u8),
}

#[derive(Debug, Clone, Copy)]
pub enum QualityEvent {
    CollectPacketInfo(PacketInfo),
    CollectRxRtpStatus {
        sequence: u16,
        status: RxStatus,
        arrival_delay_ms: i64,
    },
    CollectOptionalInfo(OptionalInfo),
    CollectJitterBufferSize {
        curr: u32,
        max: u32,
    },
}
