use std::any::Any;
use std::fmt::Debug;

use bytes::Bytes;
use ims_shared::Result;

/// Common behaviour of every RTCP packet type that can appear inside a
/// [`crate::compound::CompoundPacket`].
pub trait RtcpPacket: Debug {
    /// SSRCs this packet reports on or refers to.
    fn destination_ssrc(&self) -> Vec<u32>;
    fn marshal_size(&self) -> usize;
    fn marshal(&self) -> Result<Bytes>;
    fn equal(&self, other: &dyn RtcpPacket) -> bool;
    fn cloned(&self) -> Box<dyn RtcpPacket>;
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn RtcpPacket> {
    fn clone(&self) -> Self {
        self.cloned()
    }
}

impl PartialEq for Box<dyn RtcpPacket> {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other.as_ref())
    }
}
