//! Jitter network analyser: turns a rolling window of transit-time deltas
//! into a recommended jitter-buffer depth via a GOOD/NORMAL/BAD state
//! machine and μ + z·σ statistics.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

/// Audio frame interval in milliseconds; the unit the buffer size is
/// expressed in (frames) is converted to/from time through this.
pub const PACKET_INTERVAL_MS: u32 = 20;

const DEFAULT_Z: f64 = 2.5;
const DEFAULT_DWELL: Duration = Duration::from_secs(20);
const DEFAULT_STEP_SIZE: u32 = 2;
const DEFAULT_WINDOW: usize = 500;
/// Past this much elapsed time without a growth event, the one-growth-
/// per-second rate limit resets.
const GROWTH_RATE_LIMIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Good,
    Normal,
    Bad,
}

#[derive(Debug, Clone)]
pub struct AnalyserConfig {
    pub z_value: f64,
    pub dwell: Duration,
    pub step_size: u32,
    pub window: usize,
    pub min_size: u32,
    pub max_size: u32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        AnalyserConfig {
            z_value: DEFAULT_Z,
            dwell: DEFAULT_DWELL,
            step_size: DEFAULT_STEP_SIZE,
            window: DEFAULT_WINDOW,
            min_size: 3,
            max_size: 9,
        }
    }
}

/// Tracks transit-time deltas `Dj = (Rj - R0) - (Tj - T0)` and recommends
/// the next jitter-buffer depth in frames.
#[derive(Debug)]
pub struct JitterNetworkAnalyser {
    config: AnalyserConfig,
    reference: Option<(i64, i64)>, // (R0, T0)
    window: VecDeque<i64>,
    state: NetworkState,
    good_since: Option<Instant>,
    last_growth: Option<Instant>,
    max_jitter_ms: f64,
}

impl JitterNetworkAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        JitterNetworkAnalyser {
            config,
            reference: None,
            window: VecDeque::new(),
            state: NetworkState::Normal,
            good_since: None,
            last_growth: None,
            max_jitter_ms: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.reference = None;
        self.window.clear();
        self.state = NetworkState::Normal;
        self.good_since = None;
        self.last_growth = None;
        self.max_jitter_ms = 0.0;
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Feeds one arrival sample: `arrival_ms` is the receive-side
    /// monotonic clock in ms, `rtp_ms` is the packet's RTP timestamp
    /// converted to ms at the session's sampling rate.
    pub fn add_sample(&mut self, arrival_ms: i64, rtp_ms: i64) {
        let (r0, t0) = *self.reference.get_or_insert((arrival_ms, rtp_ms));
        let d = (arrival_ms - r0) - (rtp_ms - t0);
        if self.window.len() >= self.config.window {
            self.window.pop_front();
        }
        self.window.push_back(d);
        let abs_d = d.unsigned_abs() as f64;
        if abs_d > self.max_jitter_ms {
            self.max_jitter_ms = abs_d;
        }
    }

    fn mean_std(&self) -> (f64, f64) {
        if self.window.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.window.len() as f64;
        let mean = self.window.iter().map(|&d| d as f64).sum::<f64>() / n;
        let var = self
            .window
            .iter()
            .map(|&d| {
                let diff = d as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }

    /// Evaluates the state machine against `curr_size` (frames) and
    /// returns the recommended next size. `now` drives the dwell timer
    /// and the growth rate limit.
    pub fn evaluate(&mut self, curr_size: u32, now: Instant) -> u32 {
        let (mean, std_dev) = self.mean_std();
        let calc = mean + self.config.z_value * std_dev;
        let interval = PACKET_INTERVAL_MS as f64;
        let curr_size_f = curr_size as f64;

        let bad_threshold = curr_size_f * interval;
        let good_threshold = (curr_size_f - 1.0) * interval - 10.0;

        if calc >= bad_threshold {
            self.state = NetworkState::Bad;
            self.good_since = None;
            let rate_limited = self
                .last_growth
                .is_some_and(|t| now.duration_since(t) < GROWTH_RATE_LIMIT);
            if rate_limited {
                return curr_size;
            }
            let mut delta_ms = calc - bad_threshold;
            if delta_ms > interval * 2.0 {
                delta_ms *= 1.5;
            }
            let grow_frames = (delta_ms / interval).ceil().max(1.0) as u32;
            self.last_growth = Some(now);
            let next = (curr_size + grow_frames).min(self.config.max_size);
            debug!(curr_size, next, calc, "jitter analyser: growing buffer");
            next
        } else if calc < good_threshold && self.max_jitter_ms < good_threshold {
            self.state = NetworkState::Good;
            let since = *self.good_since.get_or_insert(now);
            if now.duration_since(since) >= self.config.dwell {
                self.good_since = Some(now);
                let next = curr_size.saturating_sub(self.config.step_size).max(self.config.min_size);
                debug!(curr_size, next, "jitter analyser: shrinking buffer");
                next
            } else {
                curr_size
            }
        } else {
            self.state = NetworkState::Normal;
            self.good_since = None;
            curr_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_jitter_stays_normal() {
        let mut analyser = JitterNetworkAnalyser::new(AnalyserConfig::default());
        let now = Instant::now();
        for i in 0..50i64 {
            analyser.add_sample(i * 20, i * 20);
        }
        let next = analyser.evaluate(4, now);
        assert_eq!(next, 4);
        assert_eq!(analyser.state(), NetworkState::Good);
    }

    #[test]
    fn large_jitter_triggers_growth() {
        let mut analyser = JitterNetworkAnalyser::new(AnalyserConfig::default());
        let now = Instant::now();
        for i in 0..50i64 {
            let jitter = if i % 2 == 0 { 0 } else { 120 };
            analyser.add_sample(i * 20 + jitter, i * 20);
        }
        let next = analyser.evaluate(4, now);
        assert!(next >= 4);
        assert_eq!(analyser.state(), NetworkState::Bad);
    }
}
