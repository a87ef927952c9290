pub mod app;
pub mod bye;
pub mod compound;
pub mod feedback;
pub mod header;
pub mod packet;
pub mod receiver_report;
pub mod report_block;
pub mod sdes;
pub mod sender_report;
pub mod xr;

pub use app::App;
pub use bye::Goodbye;
pub use compound::CompoundPacket;
pub use feedback::{PsFb, PsFbKind, RtpFb, RtpFbKind};
pub use header::{Header, PacketType};
pub use packet::RtcpPacket;
pub use receiver_report::ReceiverReport;
pub use report_block::ReportBlock;
pub use sdes::{SdesChunk, SdesItem, SdesItemType, SourceDescription};
pub use sender_report::SenderReport;
pub use xr::{ExtendedReport, XrBlock};
