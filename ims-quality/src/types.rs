//! `CallQuality` snapshot and the threshold/status types that drive
//! quality-change notifications.

/// Coarse downlink/uplink quality bucket derived from loss rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallQualityLevel {
    #[default]
    Excellent,
    Good,
    Fair,
    Poor,
    Bad,
}

impl CallQualityLevel {
    /// `<1% Excellent, <3% Good, <5% Fair, <8% Poor, else Bad`.
    pub fn from_loss_rate_percent(loss_rate: f64) -> Self {
        if loss_rate < 1.0 {
            CallQualityLevel::Excellent
        } else if loss_rate < 3.0 {
            CallQualityLevel::Good
        } else if loss_rate < 5.0 {
            CallQualityLevel::Fair
        } else if loss_rate < 8.0 {
            CallQualityLevel::Poor
        } else {
            CallQualityLevel::Bad
        }
    }
}

/// Snapshot of one session's accumulated quality counters, refreshed on
/// each periodic timer tick and readable at any time.
#[derive(Debug, Clone, Default)]
pub struct CallQuality {
    pub num_rtp_packets_received: u32,
    pub num_rtp_packets_not_received: u32,
    pub num_rtp_duplicate_packets: u32,
    pub num_rtp_sid_packets_received: u32,
    pub num_rtp_sid_packets_not_received: u32,
    pub num_rtp_packets_transmitted: u32,
    pub average_relative_jitter: f64,
    pub max_relative_jitter: f64,
    pub average_round_trip_time_ms: f64,
    pub call_duration_secs: u64,
    pub codec_type: u8,
    pub downlink_call_quality_level: CallQualityLevel,
    pub uplink_call_quality_level: CallQualityLevel,
    pub rtp_inactivity_detected: bool,
    pub rtcp_inactivity_detected: bool,
}

/// Per-session threshold configuration. Any list left empty disables
/// that particular notification.
#[derive(Debug, Clone, Default)]
pub struct MediaQualityThreshold {
    pub rtp_inactivity_timer_ms: Vec<u32>,
    pub rtcp_inactivity_timer_ms: Option<u32>,
    pub packet_loss_duration_ms: Option<u32>,
    pub packet_loss_rate_percents: Vec<u8>,
    pub jitter_duration_ms: Option<u32>,
    pub jitter_thresholds_ms: Vec<u32>,
    /// Minimum dwell between two jitter or packet-loss notifications;
    /// a crossing within this window of the previous notification of
    /// the same kind is suppressed.
    pub hysteresis_time_ms: Option<u32>,
    /// When set, the very next tick emits a `MediaQualityStatus` even if
    /// nothing has crossed a threshold, letting a fresh listener get an
    /// immediate baseline.
    pub notify_current_status: bool,
}

/// Emitted whenever a configured threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaQualityStatus {
    pub rtp_inactivity_ms: Option<u32>,
    pub rtcp_inactivity_ms: Option<u32>,
    pub loss_rate_percent: Option<f64>,
    pub jitter_ms: Option<f64>,
}
