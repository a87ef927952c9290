use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds shared by the RTP/RTCP stack, the payload (de)packetizers, the
/// jitter buffer and the media-quality analyzer.
///
/// Parse and codec errors are meant to be recovered locally by the caller
/// (drop the packet, bump a counter, keep going); configuration and
/// resource-acquisition errors are meant to be surfaced synchronously.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid parameter: {0}")]
    ErrInvalidParam(String),

    #[error("component not ready for this operation")]
    ErrNotReady,

    #[error("buffer too short: need {need}, have {have}")]
    ErrBufferShort { need: usize, have: usize },

    #[error("malformed rtp/rtcp message")]
    ErrInvalidMsg,

    #[error("decode error: {0}")]
    ErrDecodeError(String),

    #[error("unsupported rtp version")]
    ErrUnsupportedVersion,

    #[error("padding length exceeds packet length")]
    ErrInvalidPadding,

    #[error("rtcp compound packet must open with sr, rr or fb")]
    ErrRtcpHeaderOrder,

    #[error("too many report blocks for a single packet")]
    ErrTooManyReports,

    #[error("no resources available to satisfy the request")]
    ErrNoResources,

    #[error("unknown codec mode request")]
    ErrUnknownCmr,

    #[error("payload length does not match any known codec framing")]
    ErrUnknownFraming,
}
