//! Data plane components
//!
//! Route table, destination policies, the device model and the tick-driven
//! forwarding engine.

mod device;
mod forwarder;
mod network;
mod policy;
mod routing;

pub use device::{
    Device, DeviceKind, HistoryEntry, HistoryEvent, Interface, InterfaceId, LinkStatus,
    PacketHistory, RouterState,
};
pub use forwarder::{ForwardAction, Forwarder, Outcome, Relay, StatisticsSink, TickOutput};
pub use network::{Connection, LinkEnds, Network, TickSummary};
pub use policy::{Policy, PolicyEntry, PolicyResolver, PolicyTrie};
pub use routing::{
    Iter, RouteEntry, RouteKey, RouteTable, RouteTableStats, Rotation, RotationCounts,
};
