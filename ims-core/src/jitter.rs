//! `JitterBuffer` facade: pairs [`ims_jitter::AudioJitterBuffer`] with
//! its [`ims_jitter::JitterNetworkAnalyser`] so callers drive one
//! object through add/get/delete/reset/set-threshold per §6, instead of
//! manually wiring analyser samples into buffer resizes at every call
//! site.

use std::time::Instant;

use ims_jitter::{AnalyserConfig, AudioJitterBuffer, BufferSizeParams, JitterNetworkAnalyser, JitterSlot, SlotClass};
use ims_rtp::packet::RtpPacket;

pub struct JitterBufferFacade {
    buffer: AudioJitterBuffer,
    analyser: JitterNetworkAnalyser,
}

impl JitterBufferFacade {
    pub fn new(params: BufferSizeParams, analyser_config: AnalyserConfig) -> Self {
        JitterBufferFacade {
            buffer: AudioJitterBuffer::new(params),
            analyser: JitterNetworkAnalyser::new(analyser_config),
        }
    }

    /// Enqueues one packet and folds its transit-time sample into the
    /// analyser in the same call, matching §4.5's "all transitions feed
    /// the analyser" rule.
    pub fn add(&mut self, packet: &RtpPacket, is_sid: bool, arrival_ms: i64, rtp_ms: i64) -> SlotClass {
        self.analyser.add_sample(arrival_ms, rtp_ms);
        self.buffer.add(packet, is_sid)
    }

    pub fn get(&mut self) -> Option<JitterSlot> {
        self.buffer.get()
    }

    pub fn delete(&mut self, sequence: u16) -> bool {
        self.buffer.delete(sequence)
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
        self.analyser.reset();
    }

    /// Applies a new `(init, min, max)` size configuration; takes effect
    /// on the next resize evaluation.
    pub fn set_threshold(&mut self, params: BufferSizeParams) {
        self.buffer = AudioJitterBuffer::new(params);
    }

    pub fn curr_size(&self) -> u32 {
        self.buffer.curr_size()
    }

    /// Runs one analyser evaluation against the buffer's current size
    /// and applies the recommendation, per §4.5 step 3 ("every ~2s or at
    /// each wait transition"). Returns the resulting size.
    pub fn resize_from_analyser(&mut self, now: Instant) -> u32 {
        let next = self.analyser.evaluate(self.buffer.curr_size(), now);
        self.buffer.resize(next);
        self.buffer.curr_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ims_rtp::header::Header;

    fn packet(seq: u16, ts: u32) -> RtpPacket {
        RtpPacket::new(
            Header {
                sequence_number: seq,
                timestamp: ts,
                ..Default::default()
            },
            Bytes::from_static(&[0u8; 10]),
        )
    }

    #[test]
    fn add_feeds_analyser_and_buffer_together() {
        let mut facade = JitterBufferFacade::new(BufferSizeParams::default(), AnalyserConfig::default());
        for i in 0..10u16 {
            facade.add(&packet(i, i as u32 * 160), false, i as i64 * 160, i as i64 * 160);
        }
        let now = Instant::now();
        let size = facade.resize_from_analyser(now);
        assert!(size >= 3 && size <= 9);
    }
}
