pub mod analyser;
pub mod audio;
pub mod video;

pub use analyser::{AnalyserConfig, JitterNetworkAnalyser, NetworkState, PACKET_INTERVAL_MS};
pub use audio::{AudioJitterBuffer, BufferSizeParams, JitterSlot, SlotClass};
pub use video::{NackState, VideoFrame, VideoJitterBuffer};
