//! Packet forwarder
//!
//! Runs one tick of a device: every interface serves at most one queued
//! packet. A served packet is checked against the device's destination
//! policies (routers only), delivered when the device owns its
//! destination, and otherwise relayed to the first neighbor of the
//! interface it arrived on with its TTL decremented.
//!
//! Relayed packets are handed back to the network, which queues them for
//! the next tick.

use crate::dataplane::device::{HistoryEvent, Interface, InterfaceId, PacketHistory};
use crate::dataplane::{Policy, PolicyResolver};
use crate::protocol::{Packet, PacketId};
use crate::telemetry::{Diagnostic, DiagnosticKind, DiagnosticSink};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tracing::{debug, info, trace};

/// Receiver of forwarding statistics
pub trait StatisticsSink {
    /// A packet reached its destination after `hops` relays
    fn log_delivered(&mut self, hops: usize, device: &str);
    fn log_dropped_ttl(&mut self);
    fn log_dropped_policy(&mut self);
}

/// Result of a forwarding decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardAction {
    /// Destination is owned by this device
    Delivered,
    /// Already delivered by this device during the same pass
    Duplicate,
    /// Queued on a neighbor interface for the next tick
    Relayed { to: InterfaceId },
    /// TTL still positive but the interface has no neighbor
    Absorbed,
    /// Dropped by a destination policy
    PolicyDrop(Policy),
    /// TTL reached zero
    TtlExpired,
}

/// One packet handled during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub packet: PacketId,
    pub interface: String,
    pub action: ForwardAction,
}

/// Packet leaving a device toward a neighbor interface
#[derive(Debug, Clone)]
pub struct Relay {
    pub target: InterfaceId,
    pub packet: Packet,
}

#[derive(Debug, Default)]
pub struct TickOutput {
    pub outcomes: Vec<Outcome>,
    pub relays: Vec<Relay>,
}

/// Forwarding pass of a single device
pub struct Forwarder<'a> {
    device: &'a str,
    policy: Option<&'a dyn PolicyResolver>,
}

impl<'a> Forwarder<'a> {
    /// `policy` is present for routers and absent for every other device.
    pub fn new(device: &'a str, policy: Option<&'a dyn PolicyResolver>) -> Self {
        Self { device, policy }
    }

    /// Serve one packet per interface, in interface order.
    pub fn tick(
        &self,
        interfaces: &mut [Interface],
        history: &mut PacketHistory,
        stats: &mut dyn StatisticsSink,
        diag: &mut dyn DiagnosticSink,
    ) -> TickOutput {
        let local: Vec<Ipv4Addr> = interfaces.iter().filter_map(|i| i.address).collect();
        let mut delivered: HashSet<PacketId> = HashSet::new();
        let mut output = TickOutput::default();

        for iface in interfaces.iter_mut() {
            let Some(mut packet) = iface.dequeue() else {
                continue;
            };

            let id = packet.id;
            let is_local = local.contains(&packet.destination);
            let action = self.forward(&mut packet, is_local, iface.first_neighbor());
            let action = match action {
                ForwardAction::Delivered if !delivered.insert(id) => {
                    ForwardAction::Duplicate
                }
                other => other,
            };

            match action {
                ForwardAction::Delivered => {
                    info!(
                        "{}: packet {} delivered (TTL={})",
                        self.device, packet.id, packet.ttl
                    );
                    stats.log_delivered(packet.hop_count(), self.device);
                    history.push(HistoryEvent::Delivered, packet);
                }
                ForwardAction::Duplicate => {
                    debug!("{}: packet {} already delivered", self.device, packet.id);
                }
                ForwardAction::Relayed { to } => {
                    trace!(
                        "{}: packet {} forwarded from {} (TTL={})",
                        self.device,
                        packet.id,
                        iface.name,
                        packet.ttl
                    );
                    history.push(HistoryEvent::Relayed, packet.clone());
                    output.relays.push(Relay { target: to, packet });
                }
                ForwardAction::Absorbed => {
                    debug!(
                        "{}: packet {} absorbed, {} has no neighbor",
                        self.device, packet.id, iface.name
                    );
                    history.push(HistoryEvent::Absorbed, packet);
                }
                ForwardAction::PolicyDrop(policy) => {
                    stats.log_dropped_policy();
                    diag.record(
                        Diagnostic::new(
                            DiagnosticKind::PolicyDrop,
                            format!("packet dropped by policy {} on {}", policy, self.device),
                        )
                        .with_context(format!(
                            "dest={} ttl={}",
                            packet.destination, packet.ttl
                        )),
                    );
                }
                ForwardAction::TtlExpired => {
                    stats.log_dropped_ttl();
                    diag.record(
                        Diagnostic::new(
                            DiagnosticKind::TtlExpired,
                            format!("packet dropped on {}: TTL expired", self.device),
                        )
                        .with_context(format!("dest={} ttl=0", packet.destination)),
                    );
                }
            }

            output.outcomes.push(Outcome {
                packet: id,
                interface: iface.name.clone(),
                action,
            });
        }

        output
    }

    /// Decide what happens to a dequeued packet.
    ///
    /// Policy is checked before anything else. Delivery leaves the packet
    /// untouched; relaying decrements its TTL and appends this device to
    /// its trace.
    pub fn forward(
        &self,
        packet: &mut Packet,
        is_local: bool,
        neighbor: Option<InterfaceId>,
    ) -> ForwardAction {
        if let Some(policy) = self.policy.and_then(|p| p.resolve(packet.destination)) {
            if !policy.permits(packet.ttl) {
                return ForwardAction::PolicyDrop(policy);
            }
        }

        if is_local {
            return ForwardAction::Delivered;
        }

        packet.ttl = packet.ttl.saturating_sub(1);
        packet.add_hop(self.device);

        if packet.ttl == 0 {
            return ForwardAction::TtlExpired;
        }

        match neighbor {
            Some(to) => ForwardAction::Relayed { to },
            None => ForwardAction::Absorbed,
        }
    }
}
