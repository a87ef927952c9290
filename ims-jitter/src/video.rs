//! Video jitter buffer: frame-grouped reordering, NACK escalation, and
//! IDR-gated playout per §4.8.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How far into the NACK/PLI escalation ladder a missing frame has
/// progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackState {
    /// Gap just detected, first NACK not yet sent.
    Pending,
    InitialNack,
    SecondNack,
    Pli,
}

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub timestamp: u32,
    pub packets: Vec<Vec<u8>>,
    pub marker_seen: bool,
    pub is_idr: bool,
}

#[derive(Debug, Clone)]
struct PendingNack {
    state: NackState,
    first_seen: Instant,
    last_action: Option<Instant>,
}

const INITIAL_NACK_DELAY: Duration = Duration::from_millis(40);
const SECOND_NACK_DELAY: Duration = Duration::from_millis(60);
const PLI_DELAY: Duration = Duration::from_millis(100);
/// If no IDR request is satisfied within this window, fall back to FIR
/// to force a full intra refresh from any downstream mixer.
const FIR_FALLBACK: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct VideoJitterBuffer {
    frames: BTreeMap<u32, VideoFrame>,
    missing: BTreeMap<u16, PendingNack>,
    last_delivered_ts: Option<u32>,
    waiting_for_idr: bool,
    idr_requested_at: Option<Instant>,
}

impl VideoJitterBuffer {
    pub fn new() -> Self {
        VideoJitterBuffer {
            frames: BTreeMap::new(),
            missing: BTreeMap::new(),
            last_delivered_ts: None,
            waiting_for_idr: true,
            idr_requested_at: None,
        }
    }

    /// Validates a payload's leading byte looks like a well-formed
    /// H.264/H.265 NAL unit header: RTP carries raw NAL units with no
    /// Annex-B start code, and both codecs reserve the header's
    /// top (forbidden_zero_bit) bit as always zero.
    pub fn check_header(payload: &[u8]) -> bool {
        if payload.len() < 2 {
            return false;
        }
        payload[0] & 0x80 == 0
    }

    pub fn add_packet(&mut self, sequence: u16, timestamp: u32, marker: bool, is_idr: bool, payload: Vec<u8>) {
        self.missing.remove(&sequence);
        let frame = self.frames.entry(timestamp).or_insert_with(|| VideoFrame {
            timestamp,
            packets: Vec::new(),
            marker_seen: false,
            is_idr: false,
        });
        frame.packets.push(payload);
        frame.marker_seen |= marker;
        frame.is_idr |= is_idr;
    }

    pub fn note_gap(&mut self, sequence: u16, now: Instant) {
        self.missing.entry(sequence).or_insert(PendingNack {
            state: NackState::Pending,
            first_seen: now,
            last_action: None,
        });
    }

    /// Advances each pending gap's NACK/PLI escalation state. Returns
    /// the sequence numbers (if any) that just crossed into a new
    /// escalation tier, for the caller to act on (send NACK/PLI/FIR).
    pub fn tick_nack_escalation(&mut self, now: Instant) -> Vec<(u16, NackState)> {
        let mut actions = Vec::new();
        for (&seq, pending) in self.missing.iter_mut() {
            let age = now.duration_since(pending.first_seen);
            let next_state = if age >= PLI_DELAY {
                NackState::Pli
            } else if age >= SECOND_NACK_DELAY {
                NackState::SecondNack
            } else if age >= INITIAL_NACK_DELAY {
                NackState::InitialNack
            } else {
                NackState::Pending
            };
            if next_state != pending.state {
                pending.state = next_state;
                pending.last_action = Some(now);
                if next_state != NackState::Pending {
                    actions.push((seq, next_state));
                }
            }
        }
        if actions.iter().any(|(_, s)| *s == NackState::Pli) {
            warn!("video jitter buffer: escalating to PLI after repeated NACK loss");
            if self.idr_requested_at.is_none() {
                self.idr_requested_at = Some(now);
            }
        }
        actions
    }

    /// Returns `true` once the caller should fall back to FIR because an
    /// outstanding IDR request has gone unanswered for `FIR_FALLBACK`.
    pub fn should_fall_back_to_fir(&self, now: Instant) -> bool {
        self.idr_requested_at
            .is_some_and(|t| now.duration_since(t) >= FIR_FALLBACK)
    }

    /// Pulls the next complete, in-order frame. Frames are gated behind
    /// the first IDR until one is observed, discarding any inter frame
    /// queued ahead of it.
    pub fn get(&mut self) -> Option<VideoFrame> {
        loop {
            let (&ts, frame) = self.frames.iter().next()?;
            if !frame.marker_seen {
                return None;
            }
            if self.waiting_for_idr && !frame.is_idr {
                debug!(ts, "video jitter buffer: discarding non-idr frame before first idr");
                self.frames.remove(&ts);
                continue;
            }
            let frame = self.frames.remove(&ts)?;
            self.waiting_for_idr = false;
            self.idr_requested_at = None;
            self.last_delivered_ts = Some(ts);
            return Some(frame);
        }
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.missing.clear();
        self.last_delivered_ts = None;
        self.waiting_for_idr = true;
        self.idr_requested_at = None;
    }

    pub fn pending_frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Default for VideoJitterBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_playout_behind_first_idr() {
        let mut buf = VideoJitterBuffer::new();
        buf.add_packet(1, 160, true, false, vec![0x61]);
        assert!(buf.get().is_none());
        buf.add_packet(2, 320, true, true, vec![0x65]);
        let frame = buf.get().unwrap();
        assert!(frame.is_idr);
        assert_eq!(buf.pending_frame_count(), 0);
    }

    #[test]
    fn nack_escalates_to_pli_after_delays() {
        let mut buf = VideoJitterBuffer::new();
        let t0 = Instant::now();
        buf.note_gap(5, t0);
        let early = buf.tick_nack_escalation(t0);
        assert!(early.is_empty());
        let later = buf.tick_nack_escalation(t0 + Duration::from_millis(150));
        assert_eq!(later, vec![(5, NackState::Pli)]);
        assert!(buf.should_fall_back_to_fir(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn check_header_rejects_forbidden_bit_set() {
        assert!(!VideoJitterBuffer::check_header(&[0x80, 0x00]));
        assert!(VideoJitterBuffer::check_header(&[0x65, 0x88]));
    }
}
