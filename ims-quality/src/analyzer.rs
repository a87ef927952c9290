//! Single-threaded media-quality analyzer: accumulates per-session
//! counters from a stream of [`QualityEvent`]s, advances a 1 s
//! wall-clock timer, and emits threshold-crossing notifications plus
//! RTCP-XR report bodies on demand.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ims_rtcp::xr::{ExtendedReport, XrBlock};
use ims_rtp::packet::RxStatus;
use tracing::info;

use crate::events::{OptionalInfo, PacketInfo, QualityEvent, StreamDirection};
use crate::types::{CallQuality, CallQualityLevel, MediaQualityStatus, MediaQualityThreshold};

const LIST_CAP: usize = 500;

/// Bitmask selecting which RTCP-XR block types `get_xr_report_block`
/// should emit, one bit per block type (bit 0 unused, bits 1..=7 match
/// the RFC 3611 block-type numbers).
pub mod xr_mask {
    pub const LOSS_RLE: u8 = 1 << 1;
    pub const DUPLICATE_RLE: u8 = 1 << 2;
    pub const RECEIPT_TIMES: u8 = 1 << 3;
    pub const RCVR_REFERENCE_TIME: u8 = 1 << 4;
    pub const DLRR: u8 = 1 << 5;
    pub const STATISTICS_SUMMARY: u8 = 1 << 6;
    pub const VOIP_METRICS: u8 = 1 << 7;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityNotification {
    CallQualityChanged,
    Status(MediaQualityStatus),
    PacketLoss { rate_percent: f64 },
    Jitter { jitter_ms: f64 },
}

#[derive(Debug)]
pub struct MediaQualityAnalyzer {
    threshold: MediaQualityThreshold,
    quality: CallQuality,
    running: bool,

    ssrc: Option<u32>,
    begin_seq: u16,
    end_seq: u16,
    tx_list: VecDeque<u16>,
    rx_list: VecDeque<(u16, RxStatus)>,
    lost_list: VecDeque<u16>,
    receipt_times: VecDeque<u32>,
    jitter_samples: VecDeque<f64>,

    jitter_buffer_curr: u32,
    jitter_buffer_max: u32,

    round_trip_sum_ms: f64,
    round_trip_count: u32,

    seconds_since_last_rx: u64,
    seconds_since_last_rtcp: u64,
    seconds_since_start: u64,
    seconds_since_last_5s_mark: u64,
    rtp_inactivity_index: usize,

    loss_window_start: Option<Instant>,
    jitter_window_start: Option<Instant>,
    last_loss_notification: Option<Instant>,
    last_jitter_notification: Option<Instant>,
    notified_current_status: bool,
}

impl MediaQualityAnalyzer {
    pub fn new(codec_type: u8) -> Self {
        let mut quality = CallQuality::default();
        quality.codec_type = codec_type;
        MediaQualityAnalyzer {
            threshold: MediaQualityThreshold::default(),
            quality,
            running: false,
            ssrc: None,
            begin_seq: 0,
            end_seq: 0,
            tx_list: VecDeque::new(),
            rx_list: VecDeque::new(),
            lost_list: VecDeque::new(),
            receipt_times: VecDeque::new(),
            jitter_samples: VecDeque::new(),
            jitter_buffer_curr: 0,
            jitter_buffer_max: 0,
            round_trip_sum_ms: 0.0,
            round_trip_count: 0,
            seconds_since_last_rx: 0,
            seconds_since_last_rtcp: 0,
            seconds_since_start: 0,
            seconds_since_last_5s_mark: 0,
            rtp_inactivity_index: 0,
            loss_window_start: None,
            jitter_window_start: None,
            last_loss_notification: None,
            last_jitter_notification: None,
            notified_current_status: false,
        }
    }

    pub fn set_threshold(&mut self, threshold: MediaQualityThreshold) {
        self.notified_current_status = !threshold.notify_current_status;
        self.threshold = threshold;
    }

    pub fn start(&mut self) {
        info!("media quality analyzer started");
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn get_media_quality(&self) -> CallQuality {
        self.quality.clone()
    }

    fn push_capped<T>(list: &mut VecDeque<T>, item: T) {
        if list.len() >= LIST_CAP {
            list.pop_front();
        }
        list.push_back(item);
    }

    fn maybe_reset_on_ssrc_change(&mut self, incoming_ssrc: u32) {
        if self.ssrc.is_some_and(|s| s != incoming_ssrc) {
            info!(old = ?self.ssrc, new = incoming_ssrc, "media quality analyzer: ssrc changed, resetting epoch");
            let call_duration = self.quality.call_duration_secs;
            self.tx_list.clear();
            self.rx_list.clear();
            self.lost_list.clear();
            self.receipt_times.clear();
            self.jitter_samples.clear();
            self.begin_seq = 0;
            self.end_seq = 0;
            self.quality = CallQuality {
                call_duration_secs: call_duration,
                codec_type: self.quality.codec_type,
                ..Default::default()
            };
        }
        self.ssrc = Some(incoming_ssrc);
    }

    pub fn send_event(&mut self, event: QualityEvent) {
        match event {
            QualityEvent::CollectPacketInfo(info) => self.collect_packet_info(info),
            QualityEvent::CollectRxRtpStatus {
                sequence,
                status,
                arrival_delay_ms,
            } => self.collect_rx_status(sequence, status, arrival_delay_ms),
            QualityEvent::CollectOptionalInfo(info) => self.collect_optional_info(info),
            QualityEvent::CollectJitterBufferSize { curr, max } => {
                self.jitter_buffer_curr = curr;
                self.jitter_buffer_max = max;
            }
        }
    }

    fn collect_packet_info(&mut self, info: PacketInfo) {
        match info.direction {
            StreamDirection::RtpTx => {
                self.quality.num_rtp_packets_transmitted += 1;
                Self::push_capped(&mut self.tx_list, info.sequence);
            }
            StreamDirection::RtpRx => {
                self.seconds_since_last_rx = 0;
                self.rtp_inactivity_index = 0;
                self.quality.rtp_inactivity_detected = false;
                if info.is_sid {
                    self.quality.num_rtp_sid_packets_received += 1;
                } else {
                    self.quality.num_rtp_packets_received += 1;
                }
                if let Some(jitter_ms) = info.jitter_ms {
                    Self::push_capped(&mut self.jitter_samples, jitter_ms);
                    let n = self.jitter_samples.len() as f64;
                    self.quality.average_relative_jitter =
                        self.jitter_samples.iter().sum::<f64>() / n;
                    if jitter_ms > self.quality.max_relative_jitter {
                        self.quality.max_relative_jitter = jitter_ms;
                    }
                }
            }
            StreamDirection::Rtcp => {
                self.seconds_since_last_rtcp = 0;
                self.quality.rtcp_inactivity_detected = false;
            }
        }
    }

    fn collect_rx_status(&mut self, sequence: u16, status: RxStatus, arrival_delay_ms: i64) {
        Self::push_capped(&mut self.rx_list, (sequence, status));
        self.end_seq = sequence;
        match status {
            RxStatus::Duplicated => self.quality.num_rtp_duplicate_packets += 1,
            RxStatus::Lost | RxStatus::Discarded => {
                self.quality.num_rtp_packets_not_received += 1;
                Self::push_capped(&mut self.lost_list, sequence);
            }
            RxStatus::Normal => {
                Self::push_capped(&mut self.receipt_times, arrival_delay_ms.max(0) as u32);
            }
            RxStatus::Late => {}
        }
    }

    fn collect_optional_info(&mut self, info: OptionalInfo) {
        match info {
            OptionalInfo::PacketLossGap { count } => {
                self.quality.num_rtp_packets_not_received += count;
                for _ in 0..count {
                    Self::push_capped(&mut self.lost_list, self.end_seq);
                    self.end_seq = self.end_seq.wrapping_add(1);
                }
            }
            OptionalInfo::RoundTripDelayMs(rtt) => {
                self.round_trip_sum_ms += rtt;
                self.round_trip_count += 1;
                self.quality.average_round_trip_time_ms =
                    self.round_trip_sum_ms / self.round_trip_count as f64;
            }
            OptionalInfo::TimeToLive(_) => {}
        }
    }

    /// Builds an RTCP-XR compound body covering `[beginSeq, endSeq]` for
    /// every block type selected in `mask`, then advances the window and
    /// prunes the lists that fed it.
    pub fn get_xr_report_block(&mut self, ssrc: u32, mask: u8) -> ExtendedReport {
        let mut blocks = Vec::new();
        let begin_seq = self.begin_seq;
        let end_seq = self.end_seq;

        if mask & xr_mask::LOSS_RLE != 0 {
            blocks.push(XrBlock::LossRle {
                ssrc,
                begin_seq,
                end_seq,
                chunks: self.lost_list.iter().map(|&s| 0x8000 | (s & 0x7FFF)).collect(),
            });
        }
        if mask & xr_mask::DUPLICATE_RLE != 0 {
            let dup_seqs: Vec<u16> = self
                .rx_list
                .iter()
                .filter(|(_, s)| *s == RxStatus::Duplicated)
                .map(|(seq, _)| 0x8000 | (seq & 0x7FFF))
                .collect();
            blocks.push(XrBlock::DuplicateRle {
                ssrc,
                begin_seq,
                end_seq,
                chunks: dup_seqs,
            });
        }
        if mask & xr_mask::RECEIPT_TIMES != 0 {
            blocks.push(XrBlock::ReceiptTimes {
                ssrc,
                begin_seq,
                end_seq,
                receipt_times: self.receipt_times.iter().copied().collect(),
            });
        }
        if mask & xr_mask::STATISTICS_SUMMARY != 0 {
            let (min_j, max_j, mean_j, dev_j) = self.jitter_stats();
            blocks.push(XrBlock::StatisticsSummary {
                ssrc,
                begin_seq,
                end_seq,
                lost_packets: self.quality.num_rtp_packets_not_received,
                dup_packets: self.quality.num_rtp_duplicate_packets,
                min_jitter: min_j as u32,
                max_jitter: max_j as u32,
                mean_jitter: mean_j as u32,
                dev_jitter: dev_j as u32,
            });
        }
        if mask & xr_mask::VOIP_METRICS != 0 {
            let loss_rate = self.loss_rate_percent();
            blocks.push(XrBlock::VoipMetrics {
                ssrc,
                loss_rate: (loss_rate.clamp(0.0, 100.0) * 2.56) as u8,
                discard_rate: 0,
                burst_density: 0,
                gap_density: 0,
                burst_duration: 0,
                gap_duration: 0,
                round_trip_delay: self.quality.average_round_trip_time_ms as u16,
                end_system_delay: 0,
                signal_level: 0,
                noise_level: 0,
                r_factor: 0,
                mos_lq: 0,
                mos_cq: 0,
                jb_nominal: self.jitter_buffer_curr as u16 * 20,
                jb_maximum: self.jitter_buffer_max as u16 * 20,
                jb_abs_max: self.jitter_buffer_max as u16 * 20,
            });
        }

        self.begin_seq = end_seq.wrapping_add(1);
        self.lost_list.clear();
        self.receipt_times.clear();

        ExtendedReport { ssrc, blocks }
    }

    fn jitter_stats(&self) -> (f64, f64, f64, f64) {
        if self.jitter_samples.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }
        let min = self.jitter_samples.iter().cloned().fold(f64::MAX, f64::min);
        let max = self.jitter_samples.iter().cloned().fold(f64::MIN, f64::max);
        let n = self.jitter_samples.len() as f64;
        let mean = self.jitter_samples.iter().sum::<f64>() / n;
        let var = self
            .jitter_samples
            .iter()
            .map(|j| (j - mean) * (j - mean))
            .sum::<f64>()
            / n;
        (min, max, mean, var.sqrt())
    }

    /// `true` when a notification of this kind is allowed to fire again,
    /// i.e. either no `hysteresisTimeMs` dwell is configured or at least
    /// that much time has passed since `last`.
    fn past_hysteresis(&self, last: Option<Instant>, now: Instant) -> bool {
        match (self.threshold.hysteresis_time_ms, last) {
            (Some(ms), Some(t)) => now.duration_since(t) >= Duration::from_millis(ms as u64),
            _ => true,
        }
    }

    fn loss_rate_percent(&self) -> f64 {
        let lost = self.quality.num_rtp_packets_not_received as f64;
        let rx = self.quality.num_rtp_packets_received as f64;
        if rx + lost == 0.0 {
            0.0
        } else {
            lost / (rx + lost) * 100.0
        }
    }

    /// Advances the periodic 1 s timer by exactly one second and returns
    /// whatever notifications fired this tick.
    pub fn tick_one_second(&mut self, now: Instant) -> Vec<QualityNotification> {
        let mut out = Vec::new();
        if !self.running {
            return out;
        }

        self.quality.call_duration_secs += 1;
        self.seconds_since_start += 1;
        self.seconds_since_last_rx += 1;
        self.seconds_since_last_rtcp += 1;
        self.seconds_since_last_5s_mark += 1;

        if self.threshold.rtp_inactivity_timer_ms.is_empty() {
            if self.seconds_since_last_rx >= 5 && !self.quality.rtp_inactivity_detected {
                self.quality.rtp_inactivity_detected = true;
                out.push(QualityNotification::CallQualityChanged);
            }
        } else {
            let ms_since_last_rx = self.seconds_since_last_rx * 1000;
            if let Some(&threshold_ms) = self
                .threshold
                .rtp_inactivity_timer_ms
                .get(self.rtp_inactivity_index)
            {
                if ms_since_last_rx >= threshold_ms as u64 {
                    self.rtp_inactivity_index += 1;
                    self.quality.rtp_inactivity_detected = true;
                    out.push(QualityNotification::CallQualityChanged);
                    out.push(QualityNotification::Status(MediaQualityStatus {
                        rtp_inactivity_ms: Some(threshold_ms),
                        rtcp_inactivity_ms: None,
                        loss_rate_percent: None,
                        jitter_ms: None,
                    }));
                }
            }
        }
        if let Some(rtcp_ms) = self.threshold.rtcp_inactivity_timer_ms {
            if self.seconds_since_last_rtcp * 1000 >= rtcp_ms as u64
                && !self.quality.rtcp_inactivity_detected
            {
                self.quality.rtcp_inactivity_detected = true;
                out.push(QualityNotification::CallQualityChanged);
            }
        }

        if self.seconds_since_last_5s_mark >= 5 {
            self.seconds_since_last_5s_mark = 0;
            let rate = self.loss_rate_percent();
            let next = CallQualityLevel::from_loss_rate_percent(rate);
            if next != self.quality.downlink_call_quality_level {
                self.quality.downlink_call_quality_level = next;
                out.push(QualityNotification::CallQualityChanged);
            }
        }

        if let Some(loss_duration_ms) = self.threshold.packet_loss_duration_ms {
            let since = *self.loss_window_start.get_or_insert(now);
            if now.duration_since(since) >= Duration::from_millis(loss_duration_ms as u64) {
                self.loss_window_start = Some(now);
                let rate = self.loss_rate_percent();
                if self
                    .threshold
                    .packet_loss_rate_percents
                    .iter()
                    .any(|&t| rate >= t as f64)
                    && self.past_hysteresis(self.last_loss_notification, now)
                {
                    out.push(QualityNotification::PacketLoss { rate_percent: rate });
                    self.last_loss_notification = Some(now);
                }
            }
        }

        if let Some(jitter_duration_ms) = self.threshold.jitter_duration_ms {
            let since = *self.jitter_window_start.get_or_insert(now);
            if now.duration_since(since) >= Duration::from_millis(jitter_duration_ms as u64) {
                self.jitter_window_start = Some(now);
                let jitter = self.quality.average_relative_jitter;
                if self
                    .threshold
                    .jitter_thresholds_ms
                    .iter()
                    .any(|&t| jitter >= t as f64)
                    && self.past_hysteresis(self.last_jitter_notification, now)
                {
                    out.push(QualityNotification::Jitter { jitter_ms: jitter });
                    self.last_jitter_notification = Some(now);
                }
            }
        }

        if !self.notified_current_status {
            self.notified_current_status = true;
            out.push(QualityNotification::Status(MediaQualityStatus {
                rtp_inactivity_ms: Some((self.seconds_since_last_rx * 1000) as u32),
                rtcp_inactivity_ms: Some((self.seconds_since_last_rtcp * 1000) as u32),
                loss_rate_percent: Some(self.loss_rate_percent()),
                jitter_ms: Some(self.quality.average_relative_jitter),
            }));
        }

        out
    }

    pub fn note_ssrc(&mut self, ssrc: u32) {
        self.maybe_reset_on_ssrc_change(ssrc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PacketInfo;

    #[test]
    fn nine_rx_packets_reach_expected_count() {
        let mut analyzer = MediaQualityAnalyzer::new(0);
        analyzer.start();
        for seq in 0..9u16 {
            analyzer.send_event(QualityEvent::CollectPacketInfo(PacketInfo {
                direction: StreamDirection::RtpRx,
                sequence: seq,
                is_sid: false,
                byte_len: 160,
                jitter_ms: Some(20.0),
            }));
        }
        assert_eq!(analyzer.get_media_quality().num_rtp_packets_received, 9);
    }

    #[test]
    fn inactivity_after_five_seconds_of_silence() {
        let mut analyzer = MediaQualityAnalyzer::new(0);
        analyzer.start();
        let t0 = Instant::now();
        for i in 0..6u64 {
            analyzer.tick_one_second(t0 + Duration::from_secs(i));
        }
        assert!(analyzer.get_media_quality().rtp_inactivity_detected);
    }

    #[test]
    fn jitter_threshold_status_reported_within_window() {
        let mut analyzer = MediaQualityAnalyzer::new(0);
        analyzer.set_threshold(MediaQualityThreshold {
            jitter_duration_ms: Some(1000),
            jitter_thresholds_ms: vec![15],
            ..Default::default()
        });
        analyzer.start();
        analyzer.send_event(QualityEvent::CollectPacketInfo(PacketInfo {
            direction: StreamDirection::RtpRx,
            sequence: 0,
            is_sid: false,
            byte_len: 160,
            jitter_ms: Some(20.0),
        }));
        let t0 = Instant::now();
        let mut saw_jitter = false;
        for i in 0..2u64 {
            let notifications = analyzer.tick_one_second(t0 + Duration::from_secs(i + 1));
            if notifications
                .iter()
                .any(|n| matches!(n, QualityNotification::Jitter { .. }))
            {
                saw_jitter = true;
            }
        }
        assert!(saw_jitter);
    }

    #[test]
    fn ssrc_change_resets_counters_but_keeps_call_duration() {
        let mut analyzer = MediaQualityAnalyzer::new(0);
        analyzer.start();
        analyzer.note_ssrc(111);
        analyzer.send_event(QualityEvent::CollectPacketInfo(PacketInfo {
            direction: StreamDirection::RtpRx,
            sequence: 0,
            is_sid: false,
            byte_len: 160,
            jitter_ms: Some(5.0),
        }));
        analyzer.tick_one_second(Instant::now());
        let duration_before = analyzer.get_media_quality().call_duration_secs;
        analyzer.note_ssrc(222);
        let quality = analyzer.get_media_quality();
        assert_eq!(quality.num_rtp_packets_received, 0);
        assert_eq!(quality.call_duration_secs, duration_before);
    }

    #[test]
    fn rtp_inactivity_hysteresis_list_resets_on_rx() {
        let mut analyzer = MediaQualityAnalyzer::new(0);
        analyzer.set_threshold(MediaQualityThreshold {
            rtp_inactivity_timer_ms: vec![2000, 4000],
            ..Default::default()
        });
        analyzer.start();
        let t0 = Instant::now();

        let mut statuses = Vec::new();
        for i in 1..=4u64 {
            statuses.extend(analyzer.tick_one_second(t0 + Duration::from_secs(i)));
        }
        let seen: Vec<u32> = statuses
            .into_iter()
            .filter_map(|n| match n {
                QualityNotification::Status(s) => s.rtp_inactivity_ms,
                _ => None,
            })
            .collect();
        assert_eq!(seen, vec![2000, 4000]);

        analyzer.send_event(QualityEvent::CollectPacketInfo(PacketInfo {
            direction: StreamDirection::RtpRx,
            sequence: 0,
            is_sid: false,
            byte_len: 160,
            jitter_ms: None,
        }));

        let mut statuses = Vec::new();
        for i in 1..=2u64 {
            statuses.extend(analyzer.tick_one_second(t0 + Duration::from_secs(4 + i)));
        }
        let seen_again: Vec<u32> = statuses
            .into_iter()
            .filter_map(|n| match n {
                QualityNotification::Status(s) => s.rtp_inactivity_ms,
                _ => None,
            })
            .collect();
        assert_eq!(seen_again, vec![2000]);
    }

    #[test]
    fn hysteresis_suppresses_repeat_packet_loss_notifications() {
        let mut analyzer = MediaQualityAnalyzer::new(0);
        analyzer.set_threshold(MediaQualityThreshold {
            packet_loss_duration_ms: Some(1000),
            packet_loss_rate_percents: vec![5],
            hysteresis_time_ms: Some(3000),
            ..Default::default()
        });
        analyzer.start();
        analyzer.send_event(QualityEvent::CollectOptionalInfo(OptionalInfo::PacketLossGap {
            count: 10,
        }));
        let t0 = Instant::now();
        let mut loss_notifications = 0;
        for i in 1..=4u64 {
            let notifications = analyzer.tick_one_second(t0 + Duration::from_secs(i));
            loss_notifications += notifications
                .iter()
                .filter(|n| matches!(n, QualityNotification::PacketLoss { .. }))
                .count();
        }
        assert_eq!(loss_notifications, 1);
    }
}
