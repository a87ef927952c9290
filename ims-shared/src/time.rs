//! Monotonic instants paired with wall-clock/NTP conversion, used to stamp
//! RTP send times and to fill the NTP field of RTCP sender reports.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch
/// (1970-01-01).
const NTP_UNIX_EPOCH_OFFSET: u64 = 0x83AA_7E80;

/// A point in time usable both for elapsed-duration arithmetic (`Instant`)
/// and for producing the NTP timestamp RTCP wants, captured together so the
/// two never drift apart.
#[derive(Debug, Clone, Copy)]
pub struct ClockInstant {
    instant: Instant,
    duration_since_unix_epoch: Duration,
}

impl ClockInstant {
    pub fn now() -> Self {
        ClockInstant {
            instant: Instant::now(),
            duration_since_unix_epoch: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
        }
    }

    pub fn instant(&self) -> Instant {
        self.instant
    }

    pub fn duration_since_unix_epoch(&self) -> Duration {
        self.duration_since_unix_epoch
    }

    /// Returns the 64-bit NTP timestamp (32.32 fixed point) for this instant.
    pub fn ntp(&self) -> u64 {
        unix_to_ntp(self.duration_since_unix_epoch)
    }

    pub fn elapsed_since(&self, earlier: &ClockInstant) -> Duration {
        self.instant.saturating_duration_since(earlier.instant)
    }
}

fn unix_to_ntp(d: Duration) -> u64 {
    let seconds = d.as_secs().wrapping_add(NTP_UNIX_EPOCH_OFFSET);
    let frac = ((d.subsec_nanos() as u64) << 32) / 1_000_000_000;
    (seconds << 32) | frac
}

/// Inverse of [`unix_to_ntp`], exposed for tests and for any collaborator
/// that needs to interpret a received sender report's NTP field as wall
/// clock time.
pub fn ntp_to_unix(ntp: u64) -> Duration {
    let seconds = (ntp >> 32).wrapping_sub(NTP_UNIX_EPOCH_OFFSET);
    let frac = ntp & 0xFFFF_FFFF;
    let nanos = (frac * 1_000_000_000) >> 32;
    Duration::new(seconds, nanos as u32)
}

/// Converts an RTP timestamp delta into wall-clock duration given the
/// media clock rate (8000 Hz for narrowband AMR, 16000 for AMR-WB, up to
/// 32000/48000 for EVS Super-Wideband/Fullband).
pub fn rtp_ticks_to_duration(ticks: u32, clock_rate: u32) -> Duration {
    Duration::from_secs_f64(ticks as f64 / clock_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntp_round_trip() {
        let d = Duration::new(1_700_000_000, 500_000_000);
        let ntp = unix_to_ntp(d);
        let back = ntp_to_unix(ntp);
        assert_eq!(back.as_secs(), d.as_secs());
        assert!((back.subsec_nanos() as i64 - d.subsec_nanos() as i64).abs() < 2);
    }

    #[test]
    fn ticks_to_duration_amr_wb() {
        let d = rtp_ticks_to_duration(320, 16000);
        assert_eq!(d.as_millis(), 20);
    }
}
