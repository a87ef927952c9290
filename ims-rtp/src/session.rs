use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use tracing::{info, warn};

use crate::packet::{seq_diff, RtpPacket};
use crate::sequence::{random_ssrc, SequenceGenerator};

/// The three media kinds an `RtpSession` can carry; part of the registry key
/// so one (media-type, local, peer) tuple can never collide across audio,
/// video and text flows on the same socket pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub media_type: MediaType,
    pub local: SocketAddr,
    pub peer: SocketAddr,
}

/// Jitter accumulator state from RFC 3550 §A.8.
#[derive(Debug, Clone, Copy, Default)]
struct JitterState {
    transit: Option<i64>,
    jitter: f64,
}

impl JitterState {
    /// Folds in one arrival: `Ri` = arrival RTP-clock ticks, `Si` = packet's
    /// RTP timestamp. `D = (Rj-Ri) - (Sj-Si)`, `J += (|D|-J)/16`.
    fn update(&mut self, arrival_ticks: i64, rtp_timestamp: i64) -> f64 {
        let transit = arrival_ticks - rtp_timestamp;
        if let Some(prev_transit) = self.transit {
            let d = (transit - prev_transit).abs() as f64;
            self.jitter += (d - self.jitter) / 16.0;
        }
        self.transit = Some(transit);
        self.jitter
    }

    fn reset(&mut self) {
        self.transit = None;
        self.jitter = 0.0;
    }
}

/// TX-side timestamp/sequence bookkeeping for one direction of a session.
#[derive(Debug, Clone)]
struct TxState {
    sequence: SequenceGenerator,
    timestamp: u32,
    packet_count: u32,
    octet_count: u32,
}

impl TxState {
    fn new() -> Self {
        TxState {
            sequence: SequenceGenerator::new(),
            timestamp: rand::Rng::random(&mut rand::rng()),
            packet_count: 0,
            octet_count: 0,
        }
    }

    /// Advances the TX timestamp by `ticks_since_last` samples; a zero delta
    /// means "reuse the previous timestamp", used for DTMF event
    /// continuation packets.
    fn advance(&mut self, ticks_since_last: u32) -> u32 {
        if ticks_since_last != 0 {
            self.timestamp = self.timestamp.wrapping_add(ticks_since_last);
        }
        self.timestamp
    }
}

/// One RTP media flow: local/peer endpoints, SSRC pair, TX/RX state and
/// jitter accumulator. Created through [`SessionRegistry::acquire`] and
/// released through [`SessionRegistry::release`]; the registry — not a
/// global refcounted pointer — is the sole owner of the session's identity
/// while it is shared between graph stages.
#[derive(Debug)]
pub struct RtpSession {
    pub key: SessionKey,
    pub local_ssrc: u32,
    pub peer_ssrc: Option<u32>,
    pub sampling_rate_hz: u32,
    tx: TxState,
    rx_jitter: JitterState,
    rx_reference: Option<(u32, i64)>,
}

impl RtpSession {
    fn new(key: SessionKey, sampling_rate_hz: u32) -> Self {
        info!(?key.media_type, "rtp session created");
        RtpSession {
            key,
            local_ssrc: random_ssrc(),
            peer_ssrc: None,
            sampling_rate_hz,
            tx: TxState::new(),
            rx_jitter: JitterState::default(),
            rx_reference: None,
        }
    }

    /// Advances TX state and returns the `(sequence, timestamp)` pair to
    /// stamp on the next outgoing packet.
    pub fn next_tx_stamp(&mut self, ticks_since_last: u32) -> (u16, u32) {
        let seq = self.tx.sequence.next();
        let ts = self.tx.advance(ticks_since_last);
        self.tx.packet_count = self.tx.packet_count.wrapping_add(1);
        (seq, ts)
    }

    pub fn record_tx_octets(&mut self, n: u32) {
        self.tx.octet_count = self.tx.octet_count.wrapping_add(n);
    }

    pub fn tx_packet_count(&self) -> u32 {
        self.tx.packet_count
    }

    pub fn tx_octet_count(&self) -> u32 {
        self.tx.octet_count
    }

    /// Ingests one received packet's arrival; updates jitter, detects an
    /// SSRC change and resets accumulators on detection (§4.3).
    ///
    /// `arrival_ticks` is the arrival instant expressed in the session's
    /// sampling-rate ticks since an arbitrary reference, matching the
    /// units of `packet.header.timestamp`.
    pub fn on_receive(&mut self, packet: &RtpPacket, arrival_ticks: i64) -> f64 {
        if self.peer_ssrc != Some(packet.header.ssrc) {
            if self.peer_ssrc.is_some() {
                warn!(old = ?self.peer_ssrc, new = packet.header.ssrc, "rx ssrc changed, resetting jitter state");
            }
            self.peer_ssrc = Some(packet.header.ssrc);
            self.rx_jitter.reset();
            self.rx_reference = None;
        }
        self.rx_jitter
            .update(arrival_ticks, packet.header.timestamp as i64)
    }

    /// Detects an SSRC collision on ingress: an incoming packet claims the
    /// session's own local SSRC. Per §4.3/§7 the session emits BYE and
    /// rotates to a fresh SSRC rather than failing.
    pub fn check_ssrc_collision(&mut self, incoming_ssrc: u32) -> bool {
        if incoming_ssrc == self.local_ssrc {
            warn!(ssrc = incoming_ssrc, "ssrc collision detected, rotating");
            self.local_ssrc = random_ssrc();
            true
        } else {
            false
        }
    }

    pub fn jitter(&self) -> f64 {
        self.rx_jitter.jitter
    }
}

/// Returns whether `newer`'s sequence number should be treated as ahead of
/// `older` after accounting for 16-bit wraparound.
pub fn is_seq_ahead(newer: u16, older: u16) -> bool {
    seq_diff(newer, older) > 0
}

/// Session-scoped registry keyed by (media-type, local-endpoint,
/// peer-endpoint). Replaces a process-wide refcounted singleton: callers
/// hold an explicit [`SessionHandle`] and must call [`SessionRegistry::release`]
/// when done; the session is dropped only when its refcount reaches zero.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionKey, (RtpSession, usize)>,
}

/// An explicit reference to a registered session. Does not implement
/// `Clone`: a caller that wants to share access must go back through the
/// registry with the same key, keeping ownership traceable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    key_hash: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    /// Returns the existing session for `key`, incrementing its refcount,
    /// or creates a new one with refcount 1.
    pub fn acquire(&mut self, key: SessionKey, sampling_rate_hz: u32) -> SessionHandle {
        let handle = SessionHandle {
            key_hash: hash_key(&key),
        };
        self.sessions
            .entry(key.clone())
            .and_modify(|(_, refcount)| *refcount += 1)
            .or_insert_with(|| (RtpSession::new(key, sampling_rate_hz), 1));
        handle
    }

    pub fn get(&self, key: &SessionKey) -> Option<&RtpSession> {
        self.sessions.get(key).map(|(s, _)| s)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut RtpSession> {
        self.sessions.get_mut(key).map(|(s, _)| s)
    }

    /// Decrements the refcount for `key`; the session and its handle are
    /// dropped once it reaches zero. Returns the remaining refcount, or
    /// `None` if `key` was not registered.
    pub fn release(&mut self, key: &SessionKey) -> Option<usize> {
        let remove = {
            let (_, refcount) = self.sessions.get_mut(key)?;
            *refcount -= 1;
            *refcount == 0
        };
        if remove {
            self.sessions.remove(key);
            Some(0)
        } else {
            self.sessions.get(key).map(|(_, r)| *r)
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn hash_key(key: &SessionKey) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[allow(dead_code)]
fn now_ticks(reference: Instant, now: Instant, clock_rate: u32) -> i64 {
    let elapsed = now.saturating_duration_since(reference);
    (elapsed.as_secs_f64() * clock_rate as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;
    use bytes::Bytes;

    fn key() -> SessionKey {
        SessionKey {
            media_type: MediaType::Audio,
            local: "127.0.0.1:10000".parse().unwrap(),
            peer: "127.0.0.1:20000".parse().unwrap(),
        }
    }

    #[test]
    fn registry_dedups_and_refcounts() {
        let mut reg = SessionRegistry::new();
        let _h1 = reg.acquire(key(), 16000);
        let _h2 = reg.acquire(key(), 16000);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.release(&key()), Some(1));
        assert_eq!(reg.release(&key()), Some(0));
        assert!(reg.is_empty());
    }

    #[test]
    fn jitter_converges_within_one_ms_after_100_samples() {
        let mut session = RtpSession::new(key(), 8000);
        let header = Header {
            ssrc: 0xAAAA,
            ..Default::default()
        };
        let mut last = 0.0;
        for i in 0..100i64 {
            let mut h = header.clone();
            h.timestamp = (i * 160) as u32;
            let pkt = RtpPacket::new(h, Bytes::new());
            // transit grows by a constant 20 ticks per packet, so D is a
            // steady 20 every sample and the EWMA should converge to it
            last = session.on_receive(&pkt, i * 160 + i * 20);
        }
        assert!((last - 20.0).abs() < 1.0);
    }

    #[test]
    fn ssrc_collision_rotates_local_ssrc() {
        let mut session = RtpSession::new(key(), 8000);
        let local = session.local_ssrc;
        assert!(session.check_ssrc_collision(local));
        assert_ne!(session.local_ssrc, local);
    }
}
