//! Interfaces the core consumes from platform adapters (socket I/O,
//! codec, audio/video capture, timers, clock). The core compiles and
//! is fully testable against stub implementations of these traits —
//! it never reaches into platform headers directly.

use ims_shared::Result;

pub trait SocketIo: Send {
    fn send_to(&mut self, bytes: &[u8]) -> Result<usize>;
    /// Registers a callback invoked with each received datagram and its
    /// peer address string. Replaces any previously registered callback.
    fn subscribe(&mut self, on_receive: Box<dyn FnMut(&[u8], &str) + Send>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeFlags {
    pub marker: bool,
    pub is_idr: bool,
}

pub trait Codec: Send {
    fn encode(&mut self, pcm_or_yuv: &[u8], mode: u32) -> Result<(Vec<u8>, EncodeFlags)>;
    fn decode(&mut self, bytes: &[u8]) -> Result<Vec<u8>>;
    /// No-op for audio codecs; video codecs force the next encoded
    /// frame to be an IDR.
    fn request_key_frame(&mut self) {}
    /// No-op for audio codecs.
    fn set_bitrate(&mut self, _bps: u32) {}
}

pub trait AudioIo: Send {
    fn read_frame(&mut self) -> Result<Vec<u8>>;
    fn write_frame(&mut self, pcm: &[u8]) -> Result<()>;
}

pub trait VideoIo: Send {
    fn read_frame(&mut self) -> Result<Vec<u8>>;
    fn write_frame(&mut self, yuv: &[u8]) -> Result<()>;
}

pub type TimerHandle = u64;

pub trait Timer: Send {
    fn schedule_periodic(&mut self, period_ms: u64, callback: Box<dyn FnMut() + Send>) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

pub trait Clock: Send {
    fn monotonic_millis(&self) -> u64;
    fn monotonic_micros(&self) -> u64;
}

/// A [`Clock`] backed by [`std::time::Instant`], for tests and for
/// adapters with no platform-specific monotonic source to prefer.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn monotonic_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances_monotonically() {
        let clock = SystemClock::new();
        let a = clock.monotonic_micros();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = clock.monotonic_micros();
        assert!(b > a);
    }
}
