//! Session configuration recognized by the core, mirroring §6's
//! "Configuration options (recognized)" list.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaDirection {
    Inactive,
    SendOnly,
    ReceiveOnly,
    #[default]
    SendReceive,
    NoFlow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecType {
    #[default]
    Amr,
    AmrWb,
    Evs,
    Pcmu,
    Pcma,
}

#[derive(Debug, Clone, Copy)]
pub struct AmrParams {
    pub octet_aligned: bool,
    pub max_redundancy_millis: u32,
}

impl Default for AmrParams {
    fn default() -> Self {
        AmrParams {
            octet_aligned: false,
            max_redundancy_millis: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvsBandwidth {
    NarrowBand,
    WideBand,
    SuperWideBand,
    FullBand,
}

#[derive(Debug, Clone, Copy)]
pub struct EvsParams {
    pub bandwidth: EvsBandwidth,
    pub mode: u8,
    pub channel_aware_mode: bool,
    pub use_header_full_only: bool,
}

impl Default for EvsParams {
    fn default() -> Self {
        EvsParams {
            bandwidth: EvsBandwidth::WideBand,
            mode: 0,
            channel_aware_mode: false,
            use_header_full_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RtcpConfig {
    pub cname: String,
    pub transmit_interval_secs: u32,
    pub xr_blocks_mask: u8,
}

impl Default for RtcpConfig {
    fn default() -> Self {
        RtcpConfig {
            cname: String::new(),
            transmit_interval_secs: 5,
            xr_blocks_mask: 0,
        }
    }
}

/// Whole-session configuration, matching the keys listed in §6.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub media_direction: MediaDirection,
    pub codec_type: CodecType,
    pub codec_mode: u8,
    pub sampling_rate_khz: u32,
    pub dtx_enabled: bool,
    pub ptime_millis: u32,
    pub max_ptime_millis: u32,
    pub dscp: u8,
    pub amr_params: AmrParams,
    pub evs_params: EvsParams,
    pub rtcp_config: RtcpConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            media_direction: MediaDirection::default(),
            codec_type: CodecType::default(),
            codec_mode: 0,
            sampling_rate_khz: 16,
            dtx_enabled: false,
            ptime_millis: 20,
            max_ptime_millis: 20,
            dscp: 0,
            amr_params: AmrParams::default(),
            evs_params: EvsParams::default(),
            rtcp_config: RtcpConfig::default(),
        }
    }
}
