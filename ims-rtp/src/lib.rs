pub mod header;
pub mod packet;
pub mod sequence;
pub mod session;

pub use header::{Extension, Header};
pub use packet::{seq_diff, seq_is_newer, ts_is_newer, DataType, RtpPacket, RxStatus};
pub use session::{is_seq_ahead, MediaType, RtpSession, SessionHandle, SessionKey, SessionRegistry};
