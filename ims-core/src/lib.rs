pub mod collaborators;
pub mod config;
pub mod depacketizer;
pub mod graph;
pub mod inbox;
pub mod jitter;
pub mod quality;
pub mod session;

pub use collaborators::{AudioIo, Clock, Codec, EncodeFlags, SocketIo, SystemClock, Timer, TimerHandle, VideoIo};
pub use config::{AmrParams, CodecType, EvsBandwidth, EvsParams, MediaDirection, RtcpConfig, SessionConfig};
pub use depacketizer::AudioDepacketizer;
pub use graph::{Node, StopToken, StreamGraph};
pub use inbox::{Inbox, InboxSender};
pub use jitter::JitterBufferFacade;
pub use quality::MediaQualityFacade;
pub use session::RtpSessionFacade;
