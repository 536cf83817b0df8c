//! Simulated packet
//!
//! Packets carry no wire format: only addressing, a payload string, the
//! remaining hop budget and the ordered trace of devices that relayed them.

use std::fmt;
use std::net::Ipv4Addr;

/// Stable packet identifier, unique within a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: PacketId,
    /// Address of the sending interface (None when it had no address)
    pub source: Option<Ipv4Addr>,
    pub destination: Ipv4Addr,
    pub payload: String,
    /// Remaining hop budget
    pub ttl: u32,
    /// Devices that relayed this packet, in order
    trace: Vec<String>,
}

impl Packet {
    pub fn new(
        id: PacketId,
        source: Option<Ipv4Addr>,
        destination: Ipv4Addr,
        payload: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            id,
            source,
            destination,
            payload: payload.into(),
            ttl,
            trace: Vec::new(),
        }
    }

    /// Append a relaying device to the trace
    pub fn add_hop(&mut self, device: impl Into<String>) {
        self.trace.push(device.into());
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Number of relays so far
    pub fn hop_count(&self) -> usize {
        self.trace.len()
    }

    /// Trace rendered as `A -> B -> C`
    pub fn trace_display(&self) -> String {
        self.trace.join(" -> ")
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(src) => write!(f, "{} {} -> {}", self.id, src, self.destination)?,
            None => write!(f, "{} ? -> {}", self.id, self.destination)?,
        }
        write!(f, " ttl={} \"{}\"", self.ttl, self.payload)
    }
}
