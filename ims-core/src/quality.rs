//! `MediaQualityAnalyzer` facade matching §6's
//! setConfig/setThreshold/start/stop/sendEvent/getMediaQuality/
//! getXrReportBlock(mask)→bytes surface, adding the final marshal step
//! the analyzer itself stays agnostic of.

use bytes::Bytes;
use ims_quality::{CallQuality, MediaQualityAnalyzer, MediaQualityThreshold, QualityEvent, QualityNotification};
use ims_rtcp::RtcpPacket;
use ims_shared::Result;
use std::time::Instant;

pub struct MediaQualityFacade {
    analyzer: MediaQualityAnalyzer,
}

impl MediaQualityFacade {
    pub fn new(codec_type: u8) -> Self {
        MediaQualityFacade {
            analyzer: MediaQualityAnalyzer::new(codec_type),
        }
    }

    pub fn set_threshold(&mut self, threshold: MediaQualityThreshold) {
        self.analyzer.set_threshold(threshold);
    }

    pub fn start(&mut self) {
        self.analyzer.start();
    }

    pub fn stop(&mut self) {
        self.analyzer.stop();
    }

    pub fn send_event(&mut self, event: QualityEvent) {
        self.analyzer.send_event(event);
    }

    pub fn get_media_quality(&self) -> CallQuality {
        self.analyzer.get_media_quality()
    }

    pub fn tick_one_second(&mut self, now: Instant) -> Vec<QualityNotification> {
        self.analyzer.tick_one_second(now)
    }

    /// Builds the RTCP-XR body for `mask` and marshals it to wire bytes.
    pub fn get_xr_report_block(&mut self, ssrc: u32, mask: u8) -> Result<Bytes> {
        self.analyzer.get_xr_report_block(ssrc, mask).marshal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_quality::{xr_mask, OptionalInfo};

    #[test]
    fn xr_report_marshals_to_nonempty_bytes() {
        let mut facade = MediaQualityFacade::new(0);
        facade.start();
        facade.send_event(QualityEvent::CollectOptionalInfo(OptionalInfo::RoundTripDelayMs(40.0)));
        let wire = facade.get_xr_report_block(42, xr_mask::VOIP_METRICS).unwrap();
        assert!(!wire.is_empty());
    }
}
