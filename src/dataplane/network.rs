//! Network topology and tick driver
//!
//! Devices are kept in registration order and ticked in that order. After
//! every online device has run, each interface's next-tick queue is merged
//! into its current queue, so a packet moves at most one hop per tick.

use crate::dataplane::device::{Device, DeviceKind, Interface, InterfaceId};
use crate::dataplane::forwarder::{ForwardAction, StatisticsSink};
use crate::protocol::{Packet, PacketId};
use crate::telemetry::DiagnosticSink;
use crate::{Error, Result};
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Per-tick totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub processed: usize,
    pub delivered: usize,
    pub relayed: usize,
    pub absorbed: usize,
    pub dropped_ttl: usize,
    pub dropped_policy: usize,
}

impl TickSummary {
    fn record(&mut self, action: ForwardAction) {
        self.processed += 1;
        match action {
            ForwardAction::Delivered => self.delivered += 1,
            ForwardAction::Duplicate => {}
            ForwardAction::Relayed { .. } => self.relayed += 1,
            ForwardAction::Absorbed => self.absorbed += 1,
            ForwardAction::TtlExpired => self.dropped_ttl += 1,
            ForwardAction::PolicyDrop(_) => self.dropped_policy += 1,
        }
    }

    pub fn merge(&mut self, other: TickSummary) {
        self.processed += other.processed;
        self.delivered += other.delivered;
        self.relayed += other.relayed;
        self.absorbed += other.absorbed;
        self.dropped_ttl += other.dropped_ttl;
        self.dropped_policy += other.dropped_policy;
    }
}

/// A link as seen from one of its ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub local_interface: String,
    pub peer_device: String,
    pub peer_interface: String,
}

/// Both ends of a link, as `(device, interface)` names
pub type LinkEnds<'a> = ((&'a str, &'a str), (&'a str, &'a str));

/// Simulated network
#[derive(Debug, Default)]
pub struct Network {
    devices: Vec<Device>,
    /// Links in the order they were made. Replaying them rebuilds every
    /// interface's neighbor order, and with it each relay target.
    links: Vec<(InterfaceId, InterfaceId)>,
    next_packet_id: u64,
    ticks: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device. Returns `false` when the name is taken.
    pub fn add_device(&mut self, device: Device) -> bool {
        if self.device(&device.name).is_some() {
            return false;
        }
        debug!("Added {} {}", device.kind, device.name);
        self.devices.push(device);
        true
    }

    /// Register a new device of `kind` unless the name exists
    pub fn ensure_device(&mut self, name: &str, kind: DeviceKind) -> &mut Device {
        let index = match self.device_index(name) {
            Some(index) => index,
            None => {
                self.devices.push(Device::new(name, kind));
                self.devices.len() - 1
            }
        };
        &mut self.devices[index]
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn device_mut(&mut self, name: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.name == name)
    }

    /// Device by name, or `DeviceNotFound`
    pub fn get(&self, name: &str) -> Result<&Device> {
        self.device(name).ok_or_else(|| Error::DeviceNotFound {
            name: name.to_string(),
        })
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Device> {
        self.device_mut(name).ok_or_else(|| Error::DeviceNotFound {
            name: name.to_string(),
        })
    }

    /// Devices in registration order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn device_index(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.name == name)
    }

    fn interface_id(&self, device: &str, iface: &str) -> Result<InterfaceId> {
        let device_index = self
            .device_index(device)
            .ok_or_else(|| Error::DeviceNotFound {
                name: device.to_string(),
            })?;
        let interface = self.devices[device_index]
            .interface_index(iface)
            .ok_or_else(|| Error::InterfaceNotFound {
                device: device.to_string(),
                name: iface.to_string(),
            })?;
        Ok(InterfaceId {
            device: device_index,
            interface,
        })
    }

    fn interface_by_id(&self, id: InterfaceId) -> Option<(&Device, &Interface)> {
        let device = self.devices.get(id.device)?;
        let iface = device.interfaces().get(id.interface)?;
        Some((device, iface))
    }

    fn interface_by_id_mut(&mut self, id: InterfaceId) -> Option<&mut Interface> {
        self.devices.get_mut(id.device)?.interface_at_mut(id.interface)
    }

    /// Link two interfaces in both directions. Reconnecting is a no-op.
    pub fn connect(&mut self, dev_a: &str, iface_a: &str, dev_b: &str, iface_b: &str) -> Result<()> {
        let a = self.interface_id(dev_a, iface_a)?;
        let b = self.interface_id(dev_b, iface_b)?;
        if self.link_index(a, b).is_some() {
            return Ok(());
        }

        if let Some(iface) = self.interface_by_id_mut(a) {
            iface.add_neighbor(b);
        }
        if let Some(iface) = self.interface_by_id_mut(b) {
            iface.add_neighbor(a);
        }
        self.links.push((a, b));
        debug!("Connected {}:{} <-> {}:{}", dev_a, iface_a, dev_b, iface_b);
        Ok(())
    }

    /// Remove a link. Returns `false` when the interfaces were not linked.
    pub fn disconnect(
        &mut self,
        dev_a: &str,
        iface_a: &str,
        dev_b: &str,
        iface_b: &str,
    ) -> Result<bool> {
        let a = self.interface_id(dev_a, iface_a)?;
        let b = self.interface_id(dev_b, iface_b)?;
        let Some(index) = self.link_index(a, b) else {
            return Ok(false);
        };

        self.links.remove(index);
        if let Some(iface) = self.interface_by_id_mut(a) {
            iface.remove_neighbor(b);
        }
        if let Some(iface) = self.interface_by_id_mut(b) {
            iface.remove_neighbor(a);
        }
        debug!("Disconnected {}:{} <-> {}:{}", dev_a, iface_a, dev_b, iface_b);
        Ok(true)
    }

    fn link_index(&self, a: InterfaceId, b: InterfaceId) -> Option<usize> {
        self.links
            .iter()
            .position(|&link| link == (a, b) || link == (b, a))
    }

    /// Every link once, in the order it was made
    pub fn links(&self) -> Vec<LinkEnds<'_>> {
        self.links
            .iter()
            .filter_map(|&(a, b)| {
                let (dev_a, iface_a) = self.interface_by_id(a)?;
                let (dev_b, iface_b) = self.interface_by_id(b)?;
                Some((
                    (dev_a.name.as_str(), iface_a.name.as_str()),
                    (dev_b.name.as_str(), iface_b.name.as_str()),
                ))
            })
            .collect()
    }

    /// Links of a device, in interface then connection order
    pub fn connections(&self, device: &str) -> Result<Vec<Connection>> {
        let dev = self.get(device)?;
        let mut out = Vec::new();
        for iface in dev.interfaces() {
            for peer in iface.neighbors() {
                if let Some((peer_dev, peer_iface)) = self.interface_by_id(*peer) {
                    out.push(Connection {
                        local_interface: iface.name.clone(),
                        peer_device: peer_dev.name.clone(),
                        peer_interface: peer_iface.name.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    pub fn set_device_status(&mut self, device: &str, online: bool) -> Result<()> {
        self.get_mut(device)?.online = online;
        Ok(())
    }

    /// Device and interface owning `addr`, first match in registration order
    pub fn find_interface_by_address(&self, addr: Ipv4Addr) -> Option<(&Device, &Interface)> {
        self.devices.iter().find_map(|dev| {
            dev.interfaces()
                .iter()
                .find(|i| i.address == Some(addr))
                .map(|i| (dev, i))
        })
    }

    /// Create a packet and queue it on the source interface for this tick.
    pub fn send_packet(
        &mut self,
        device: &str,
        iface: &str,
        destination: Ipv4Addr,
        payload: &str,
        ttl: u32,
    ) -> Result<PacketId> {
        let id = PacketId(self.next_packet_id);
        let dev = self.get_mut(device)?;
        let source = dev.interface(iface).and_then(|i| i.address);
        dev.receive(Packet::new(id, source, destination, payload, ttl), iface)?;

        self.next_packet_id += 1;
        info!("Packet {} queued at {}:{} for {}", id, device, iface, destination);
        Ok(id)
    }

    /// Advance the simulation by one tick.
    pub fn tick(
        &mut self,
        stats: &mut dyn StatisticsSink,
        diag: &mut dyn DiagnosticSink,
    ) -> TickSummary {
        let mut summary = TickSummary::default();

        for index in 0..self.devices.len() {
            if !self.devices[index].online {
                continue;
            }
            let output = self.devices[index].tick(stats, diag);
            for outcome in &output.outcomes {
                summary.record(outcome.action);
            }
            for relay in output.relays {
                if let Some(iface) = self.interface_by_id_mut(relay.target) {
                    iface.enqueue_next(relay.packet);
                }
            }
        }

        // Barrier: nothing forwarded this tick is visible until the next one
        for device in &mut self.devices {
            for iface in device.interfaces_mut() {
                iface.advance();
            }
        }

        self.ticks += 1;
        debug!("Tick {} done: {:?}", self.ticks, summary);
        summary
    }
}
