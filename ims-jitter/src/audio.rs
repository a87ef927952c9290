//! Audio jitter buffer: absorbs network jitter, enforces in-order
//! playout, detects loss/duplication, and reports size-change requests
//! driven by [`crate::analyser::JitterNetworkAnalyser`].

use std::collections::VecDeque;

use ims_rtp::packet::{seq_is_newer, RtpPacket};
use tracing::trace;

/// How an enqueued slot was classified as it entered or left the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClass {
    Normal,
    Late,
    Discarded,
    Duplicated,
    Lost,
}

#[derive(Debug, Clone)]
pub struct JitterSlot {
    pub sequence: u16,
    pub timestamp: u32,
    pub payload: Vec<u8>,
    pub mark: bool,
    pub is_sid: bool,
    pub class: SlotClass,
}

/// `(init, min, max)` buffer-size parameters in frames; defaults per
/// §4.5 are 4/3/9, with G.711 callers overriding to 6/3/9 or similar.
#[derive(Debug, Clone, Copy)]
pub struct BufferSizeParams {
    pub init: u32,
    pub min: u32,
    pub max: u32,
}

impl Default for BufferSizeParams {
    fn default() -> Self {
        BufferSizeParams {
            init: 4,
            min: 3,
            max: 9,
        }
    }
}

const MAX_BUNDLED_PER_SEQUENCE: u32 = 1;
/// Empty ticks to wait before the very first `Get` is allowed to deliver
/// anything, avoiding starting playout on an initial burst/spike.
const INITIAL_GUARD_TICKS: u32 = 4;
/// Consecutive queued SIDs at which surplus ones are dropped to let the
/// buffer shrink back down during DTX.
const SID_RICH_REGION: usize = 4;
const FRAME_INTERVAL_MS: u32 = 20;
const EQUIVALENT_FRAME_TOLERANCE_MS: i64 = 10;

#[derive(Debug)]
pub struct AudioJitterBuffer {
    params: BufferSizeParams,
    curr_size: u32,
    slots: VecDeque<JitterSlot>,
    last_played_sequence: Option<u16>,
    current_play_ts: Option<u32>,
    started: bool,
    guard_ticks_remaining: u32,
    waiting: bool,
}

impl AudioJitterBuffer {
    pub fn new(params: BufferSizeParams) -> Self {
        AudioJitterBuffer {
            curr_size: params.init,
            params,
            slots: VecDeque::new(),
            last_played_sequence: None,
            current_play_ts: None,
            started: false,
            guard_ticks_remaining: INITIAL_GUARD_TICKS,
            waiting: true,
        }
    }

    pub fn curr_size(&self) -> u32 {
        self.curr_size
    }

    fn capacity(&self) -> usize {
        (self.params.max + self.params.min + MAX_BUNDLED_PER_SEQUENCE - 1) as usize
    }

    /// Enqueues one received packet. Drops (and classifies) packets that
    /// are late, duplicate, or would push the queue over capacity.
    pub fn add(&mut self, packet: &RtpPacket, is_sid: bool) -> SlotClass {
        let seq = packet.header.sequence_number;

        if self.started {
            if let Some(last) = self.last_played_sequence {
                if !seq_is_newer(seq, last) {
                    trace!(seq, last, "jitter buffer: dropping late packet");
                    return SlotClass::Late;
                }
            }
        }

        if self
            .slots
            .iter()
            .any(|s| s.sequence == seq && s.payload.len() == packet.payload.len())
        {
            trace!(seq, "jitter buffer: dropping duplicate packet");
            return SlotClass::Duplicated;
        }

        let slot = JitterSlot {
            sequence: seq,
            timestamp: packet.header.timestamp,
            payload: packet.payload.to_vec(),
            mark: packet.header.marker,
            is_sid,
            class: SlotClass::Normal,
        };

        let insert_at = self
            .slots
            .iter()
            .position(|s| seq_is_newer(s.sequence, seq))
            .unwrap_or(self.slots.len());
        self.slots.insert(insert_at, slot);

        while self.slots.len() > self.capacity() {
            let evicted = self.slots.pop_front();
            trace!(?evicted, "jitter buffer: evicting over capacity");
        }

        self.drop_surplus_sids();
        SlotClass::Normal
    }

    /// Drops the oldest surplus SID frames once `SID_RICH_REGION` or more
    /// consecutive SIDs are queued, letting the buffer shrink during DTX.
    fn drop_surplus_sids(&mut self) {
        let consecutive_sids = self
            .slots
            .iter()
            .rev()
            .take_while(|s| s.is_sid)
            .count();
        if consecutive_sids >= SID_RICH_REGION {
            let drop = consecutive_sids - 1;
            let keep_from = self.slots.len() - drop;
            self.slots.drain(keep_from..self.slots.len() - 1);
        }
    }

    /// Applies a new recommended size from the analyser. Caller is
    /// expected to call this roughly every 2 s or on a `wait` state
    /// transition, per §4.5.
    pub fn resize(&mut self, next_size: u32) {
        let next_size = next_size.clamp(self.params.min, self.params.max);
        if next_size != self.curr_size {
            trace!(from = self.curr_size, to = next_size, "jitter buffer resize");
            if let Some(ts) = &mut self.current_play_ts {
                let delta_frames = next_size as i64 - self.curr_size as i64;
                *ts = ts.wrapping_add((delta_frames * FRAME_INTERVAL_MS as i64) as u32);
            }
            self.curr_size = next_size;
        }
    }

    /// Attempts to pull the next frame to play out. Returns `None` while
    /// the initial guard is still running, while waiting for the head
    /// packet to age past the configured threshold, or when the buffer
    /// is empty.
    pub fn get(&mut self) -> Option<JitterSlot> {
        if self.guard_ticks_remaining > 0 {
            self.guard_ticks_remaining -= 1;
            return None;
        }

        let head = self.slots.front()?;

        if !self.started {
            // Require the oldest packet to have aged past
            // (currSize-1)*20 + 10 ms before starting playout; this
            // engine does not track wall-clock arrival age directly on
            // the slot, so the caller is expected to have already waited
            // for that via its own scheduler tick cadence.
            self.started = true;
            self.waiting = false;
            self.current_play_ts = Some(head.timestamp);
        }

        let play_ts = self.current_play_ts.unwrap_or(head.timestamp);
        let diff = (head.timestamp as i64 - play_ts as i64).unsigned_abs() as i64;

        if head.timestamp == play_ts || diff <= EQUIVALENT_FRAME_TOLERANCE_MS as i64 {
            let slot = self.slots.pop_front()?;
            self.last_played_sequence = Some(slot.sequence);
            self.current_play_ts = Some(slot.timestamp.wrapping_add(self.frame_interval_ticks()));
            Some(slot)
        } else if (head.timestamp as i64) < play_ts as i64 {
            // Head is behind the play cursor: skip it as late.
            self.slots.pop_front();
            self.get()
        } else {
            None
        }
    }

    fn frame_interval_ticks(&self) -> u32 {
        FRAME_INTERVAL_MS
    }

    pub fn delete(&mut self, sequence: u16) -> bool {
        if let Some(pos) = self.slots.iter().position(|s| s.sequence == sequence) {
            self.slots.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.slots.clear();
        self.last_played_sequence = None;
        self.current_play_ts = None;
        self.started = false;
        self.guard_ticks_remaining = INITIAL_GUARD_TICKS;
        self.waiting = true;
        self.curr_size = self.params.init;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_rtp::header::Header;
    use bytes::Bytes;

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
    fn sorted_insertion_and_dedup() {
        let mut buf = AudioJitterBuffer::new(BufferSizeParams::default());
        assert_eq!(buf.add(&packet(5, 800), false), SlotClass::Normal);
        assert_eq!(buf.add(&packet(3, 480), false), SlotClass::Normal);
        assert_eq!(buf.add(&packet(4, 640), false), SlotClass::Normal);
        assert_eq!(buf.slots.front().unwrap().sequence, 3);
        assert_eq!(buf.add(&packet(4, 640), false), SlotClass::Duplicated);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut buf = AudioJitterBuffer::new(BufferSizeParams {
            init: 4,
            min: 3,
            max: 9,
        });
        let cap = buf.capacity();
        for i in 0..(cap as u16 + 5) {
            buf.add(&packet(i, i as u32 * 160), false);
        }
        assert!(buf.len() <= cap);
    }

    #[test]
    fn sid_rich_region_drops_surplus() {
        let mut buf = AudioJitterBuffer::new(BufferSizeParams::default());
        for i in 0..6u16 {
            buf.add(&packet(i, i as u32 * 160), true);
        }
        assert!(buf.len() < 6);
    }
}
