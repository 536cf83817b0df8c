//! Packets and address parsing

pub mod addr;
pub mod packet;

pub use packet::{Packet, PacketId};
