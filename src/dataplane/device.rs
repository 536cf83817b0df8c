//! Devices and interfaces
//!
//! Each interface carries two packet queues: the one being served this
//! tick and the one filled by neighbors for the next tick. The network
//! merges them at the end of every tick.

use crate::dataplane::forwarder::{Forwarder, StatisticsSink, TickOutput};
use crate::dataplane::{PolicyResolver, PolicyTrie, RouteTable};
use crate::protocol::Packet;
use crate::telemetry::DiagnosticSink;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::trace;

/// Position of an interface inside a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId {
    pub device: usize,
    pub interface: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    #[default]
    Down,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Up => write!(f, "up"),
            LinkStatus::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Router,
    Switch,
    Host,
    Firewall,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Router => "router",
            DeviceKind::Switch => "switch",
            DeviceKind::Host => "host",
            DeviceKind::Firewall => "firewall",
        };
        f.write_str(name)
    }
}

/// Network interface
#[derive(Debug)]
pub struct Interface {
    pub name: String,
    pub address: Option<Ipv4Addr>,
    pub status: LinkStatus,
    /// Connected interfaces, in connection order
    neighbors: Vec<InterfaceId>,
    /// Packets served this tick
    queue: VecDeque<Packet>,
    /// Packets arriving for the next tick
    next_queue: VecDeque<Packet>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            status: LinkStatus::Down,
            neighbors: Vec::new(),
            queue: VecDeque::new(),
            next_queue: VecDeque::new(),
        }
    }

    pub fn neighbors(&self) -> &[InterfaceId] {
        &self.neighbors
    }

    /// Relay target: the first connected neighbor
    pub fn first_neighbor(&self) -> Option<InterfaceId> {
        self.neighbors.first().copied()
    }

    pub(crate) fn add_neighbor(&mut self, id: InterfaceId) {
        if !self.neighbors.contains(&id) {
            self.neighbors.push(id);
        }
    }

    pub(crate) fn remove_neighbor(&mut self, id: InterfaceId) -> bool {
        let before = self.neighbors.len();
        self.neighbors.retain(|n| *n != id);
        before != self.neighbors.len()
    }

    /// Packets waiting in the current queue, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &Packet> {
        self.queue.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Packets queued for the next tick
    pub fn incoming_len(&self) -> usize {
        self.next_queue.len()
    }

    pub(crate) fn enqueue(&mut self, packet: Packet) {
        self.queue.push_back(packet);
    }

    pub(crate) fn dequeue(&mut self) -> Option<Packet> {
        self.queue.pop_front()
    }

    pub(crate) fn enqueue_next(&mut self, packet: Packet) {
        self.next_queue.push_back(packet);
    }

    /// Tick barrier: arrivals for the next tick join the current queue
    /// behind packets still waiting from earlier ticks.
    pub(crate) fn advance(&mut self) {
        let arrived = std::mem::take(&mut self.next_queue);
        self.queue.extend(arrived);
    }
}

/// What a device did with a packet it recorded in its history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    Delivered,
    Relayed,
    /// Relay had no neighbor to go to
    Absorbed,
}

impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryEvent::Delivered => write!(f, "delivered"),
            HistoryEvent::Relayed => write!(f, "relayed"),
            HistoryEvent::Absorbed => write!(f, "absorbed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub event: HistoryEvent,
    /// Packet as it was when recorded
    pub packet: Packet,
}

/// Append-only packet history
#[derive(Debug, Default)]
pub struct PacketHistory {
    entries: Vec<HistoryEntry>,
}

impl PacketHistory {
    pub fn push(&mut self, event: HistoryEvent, packet: Packet) {
        self.entries.push(HistoryEntry { event, packet });
    }

    /// Most recent first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Router-only state, created with the device
#[derive(Debug, Default)]
pub struct RouterState {
    pub routes: RouteTable,
    pub policies: PolicyTrie,
}

/// Simulated network device
#[derive(Debug)]
pub struct Device {
    pub name: String,
    pub kind: DeviceKind,
    pub online: bool,
    interfaces: Vec<Interface>,
    history: PacketHistory,
    router: Option<RouterState>,
}

impl Device {
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        let router = match kind {
            DeviceKind::Router => Some(RouterState::default()),
            _ => None,
        };
        Self {
            name: name.into(),
            kind,
            online: true,
            interfaces: Vec::new(),
            history: PacketHistory::default(),
            router,
        }
    }

    pub fn router(name: impl Into<String>) -> Self {
        Self::new(name, DeviceKind::Router)
    }

    /// Add an interface; returns its index. Existing names are reused.
    pub fn add_interface(&mut self, name: &str) -> usize {
        if let Some(index) = self.interface_index(name) {
            return index;
        }
        self.interfaces.push(Interface::new(name));
        self.interfaces.len() - 1
    }

    pub fn interface_index(&self, name: &str) -> Option<usize> {
        self.interfaces.iter().position(|i| i.name == name)
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn interface_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.name == name)
    }

    /// Interfaces in creation order
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub(crate) fn interface_at_mut(&mut self, index: usize) -> Option<&mut Interface> {
        self.interfaces.get_mut(index)
    }

    pub(crate) fn interfaces_mut(&mut self) -> &mut [Interface] {
        &mut self.interfaces
    }

    pub fn history(&self) -> &PacketHistory {
        &self.history
    }

    pub fn is_router(&self) -> bool {
        self.router.is_some()
    }

    pub fn route_table(&self) -> Option<&RouteTable> {
        self.router.as_ref().map(|r| &r.routes)
    }

    pub fn route_table_mut(&mut self) -> Option<&mut RouteTable> {
        self.router.as_mut().map(|r| &mut r.routes)
    }

    pub fn policies(&self) -> Option<&PolicyTrie> {
        self.router.as_ref().map(|r| &r.policies)
    }

    pub fn policies_mut(&mut self) -> Option<&mut PolicyTrie> {
        self.router.as_mut().map(|r| &mut r.policies)
    }

    /// Queue a packet on an interface for processing this tick
    pub fn receive(&mut self, packet: Packet, iface: &str) -> Result<()> {
        if !self.online {
            return Err(Error::DeviceOffline {
                name: self.name.clone(),
            });
        }
        let device = self.name.clone();
        let Some(interface) = self.interface_mut(iface) else {
            return Err(Error::InterfaceNotFound {
                device,
                name: iface.to_string(),
            });
        };

        trace!("{}: packet {} queued on {}", device, packet.id, iface);
        interface.enqueue(packet);
        Ok(())
    }

    /// Run one forwarding pass. Routers apply their policy trie first.
    pub fn tick(
        &mut self,
        stats: &mut dyn StatisticsSink,
        diag: &mut dyn DiagnosticSink,
    ) -> TickOutput {
        let Device {
            name,
            interfaces,
            history,
            router,
            ..
        } = self;
        let resolver = router
            .as_ref()
            .map(|r| &r.policies as &dyn PolicyResolver);

        Forwarder::new(name, resolver).tick(interfaces, history, stats, diag)
    }
}
