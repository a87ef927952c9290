//! `RtpSession` facade: create/open/enable-rtp/enable-rtcp/send-rtp/close,
//! per §6's exposed collaborator interface. Wraps [`SessionRegistry`] so
//! TX framing and the handle lifecycle live next to each other instead
//! of being re-derived at every call site.

use bytes::Bytes;
use ims_rtp::header::{Extension, Header};
use ims_rtp::packet::RtpPacket;
use ims_rtp::session::{MediaType, SessionHandle, SessionKey, SessionRegistry};
use ims_shared::{Error, Result};
use std::net::SocketAddr;

use crate::collaborators::SocketIo;

#[derive(Debug)]
pub struct RtpSessionFacade {
    key: SessionKey,
    sampling_rate_hz: u32,
    handle: Option<SessionHandle>,
    rtp_enabled: bool,
    rtcp_enabled: bool,
}

impl RtpSessionFacade {
    pub fn new(media_type: MediaType, local: SocketAddr, peer: SocketAddr, sampling_rate_hz: u32) -> Self {
        RtpSessionFacade {
            key: SessionKey {
                media_type,
                local,
                peer,
            },
            sampling_rate_hz,
            handle: None,
            rtp_enabled: false,
            rtcp_enabled: false,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn open(&mut self, registry: &mut SessionRegistry) {
        if self.handle.is_none() {
            self.handle = Some(registry.acquire(self.key.clone(), self.sampling_rate_hz));
        }
    }

    pub fn enable_rtp(&mut self, enabled: bool) {
        self.rtp_enabled = enabled;
    }

    pub fn enable_rtcp(&mut self, enabled: bool) {
        self.rtcp_enabled = enabled;
    }

    pub fn rtcp_enabled(&self) -> bool {
        self.rtcp_enabled
    }

    /// Stamps, marshals, and transmits one RTP packet, advancing the
    /// session's sequence/timestamp state. `ts_delta` is the number of
    /// sampling-rate ticks since the previous packet (0 reuses the
    /// previous timestamp, for DTMF continuation).
    pub fn send_rtp(
        &mut self,
        registry: &mut SessionRegistry,
        socket: &mut dyn SocketIo,
        payload: Bytes,
        payload_type: u8,
        marker: bool,
        ts_delta: u32,
        extension: Option<Extension>,
    ) -> Result<usize> {
        if !self.rtp_enabled {
            return Err(Error::ErrNotReady);
        }
        let session = registry
            .get_mut(&self.key)
            .ok_or(Error::ErrNotReady)?;
        let (sequence_number, timestamp) = session.next_tx_stamp(ts_delta);
        session.record_tx_octets(payload.len() as u32);

        let (extension_profile, extension_bytes) = match extension {
            Some(ext) => {
                let mut buf = bytes::BytesMut::new();
                let byte = (ext.id << 4) | ((ext.payload.len().saturating_sub(1)) as u8 & 0xF);
                buf.extend_from_slice(&[byte]);
                buf.extend_from_slice(&ext.payload);
                while buf.len() % 4 != 0 {
                    buf.extend_from_slice(&[0]);
                }
                (0xBEDE, Some(buf.freeze()))
            }
            None => (0, None),
        };

        let header = Header {
            padding: false,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc: session.local_ssrc,
            csrc: Vec::new(),
            extension_profile,
            extension: extension_bytes,
        };
        let packet = RtpPacket::new(header, payload);
        let wire = packet.marshal()?;
        socket.send_to(&wire)
    }

    pub fn close(&mut self, registry: &mut SessionRegistry) {
        if self.handle.take().is_some() {
            registry.release(&self.key);
        }
        self.rtp_enabled = false;
        self.rtcp_enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct LoopbackSocket {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl SocketIo for LoopbackSocket {
        fn send_to(&mut self, bytes: &[u8]) -> Result<usize> {
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(bytes.len())
        }

        fn subscribe(&mut self, _on_receive: Box<dyn FnMut(&[u8], &str) + Send>) {}
    }

    #[test]
    fn send_rtp_requires_open_and_enabled() {
        let mut registry = SessionRegistry::new();
        let mut facade = RtpSessionFacade::new(
            MediaType::Audio,
            "127.0.0.1:1000".parse().unwrap(),
            "127.0.0.1:2000".parse().unwrap(),
            8000,
        );
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut socket = LoopbackSocket { sent: sent.clone() };

        let err = facade.send_rtp(&mut registry, &mut socket, Bytes::new(), 8, false, 160, None);
        assert!(err.is_err());

        facade.open(&mut registry);
        facade.enable_rtp(true);
        facade
            .send_rtp(&mut registry, &mut socket, Bytes::from_static(&[1, 2, 3]), 8, true, 160, None)
            .unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);

        facade.close(&mut registry);
        assert!(registry.is_empty());
    }
}
