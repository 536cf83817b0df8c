//! Configuration management
//!
//! Loads a topology file (TOML), builds a `Network` from it, and writes the
//! running network back out.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::dataplane::{Device, Network, Policy};
use crate::protocol::addr::{mask_from_len, parse_ipv4, parse_netmask};
use crate::protocol::PacketId;
use crate::telemetry::{Diagnostic, DiagnosticKind, DiagnosticSink, Statistics};
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Parse configuration from TOML text
pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

/// Write configuration to a TOML file
pub fn save<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let content = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(path.as_ref(), content)?;
    info!("Saved configuration to {}", path.as_ref().display());
    Ok(())
}

impl PolicyConfig {
    pub fn to_policy(&self) -> Result<Policy> {
        match self.action {
            PolicyAction::Block => Ok(Policy::Block),
            PolicyAction::TtlMin => self
                .ttl_min
                .map(Policy::MinTtl)
                .ok_or_else(|| Error::Config(format!("ttl-min policy on {} without ttl_min", self.prefix))),
        }
    }
}

impl Network {
    /// Build a network from a topology file.
    ///
    /// Unknown devices or interfaces and malformed addresses abort the
    /// build. Route and policy entries that the tables reject are recorded
    /// in `diag` and skipped.
    pub fn from_config(config: &Config, diag: &mut dyn DiagnosticSink) -> Result<Network> {
        let mut network = Network::new();

        for dev_cfg in &config.devices {
            let mut device = Device::new(dev_cfg.name.as_str(), dev_cfg.kind);
            device.online = dev_cfg.online;

            for iface_cfg in &dev_cfg.interfaces {
                let index = device.add_interface(&iface_cfg.name);
                let address = iface_cfg.address.as_deref().map(parse_ipv4).transpose()?;
                if let Some(iface) = device.interface_at_mut(index) {
                    iface.address = address;
                    iface.status = iface_cfg.status;
                }
            }

            if !dev_cfg.routes.is_empty() || !dev_cfg.policies.is_empty() {
                apply_router_tables(&mut device, dev_cfg, diag)?;
            }

            if !network.add_device(device) {
                return Err(Error::Config(format!("duplicate device '{}'", dev_cfg.name)));
            }
        }

        for link in &config.links {
            let ((dev_a, iface_a), (dev_b, iface_b)) = link
                .endpoints()
                .ok_or_else(|| Error::Config(format!("malformed link {} - {}", link.a, link.b)))?;
            network.connect(dev_a, iface_a, dev_b, iface_b)?;
        }

        info!(
            "Built network: {} devices, {} links",
            network.devices().len(),
            config.links.len()
        );
        Ok(network)
    }
}

fn apply_router_tables(
    device: &mut Device,
    dev_cfg: &DeviceConfig,
    diag: &mut dyn DiagnosticSink,
) -> Result<()> {
    let name = device.name.clone();
    let not_router = || Error::NotARouter { name: name.clone() };

    let routes = device.route_table_mut().ok_or_else(not_router)?;
    for route in &dev_cfg.routes {
        let result = parse_ipv4(&route.prefix).and_then(|prefix| {
            let next_hop = parse_ipv4(&route.next_hop)?;
            routes.insert(prefix, route.mask, next_hop, route.metric)
        });
        if let Err(e) = result {
            diag.record(
                Diagnostic::new(DiagnosticKind::InsertError, e.to_string())
                    .with_context(format!("{}: route {}/{}", name, route.prefix, route.mask)),
            );
        }
    }

    let policies = device.policies_mut().ok_or_else(not_router)?;
    for policy in &dev_cfg.policies {
        let result = parse_ipv4(&policy.prefix).and_then(|prefix| {
            let mask = parse_netmask(&policy.mask)?;
            policies.set_policy(prefix, mask, policy.to_policy()?)
        });
        if let Err(e) = result {
            diag.record(
                Diagnostic::new(DiagnosticKind::PolicyError, e.to_string())
                    .with_context(format!("{}: policy {}/{}", name, policy.prefix, policy.mask)),
            );
        }
    }

    debug!(
        "{}: {} routes, {} policies",
        name,
        dev_cfg.routes.len(),
        dev_cfg.policies.len()
    );
    Ok(())
}

impl Config {
    /// Snapshot of the running network
    pub fn from_network(network: &Network) -> Config {
        let mut config = Config::default();

        for device in network.devices() {
            let mut dev_cfg = DeviceConfig::new(device.name.as_str(), device.kind);
            dev_cfg.online = device.online;

            dev_cfg.interfaces = device
                .interfaces()
                .iter()
                .map(|iface| InterfaceConfig {
                    name: iface.name.clone(),
                    address: iface.address.map(|a| a.to_string()),
                    status: iface.status,
                })
                .collect();

            if let Some(routes) = device.route_table() {
                dev_cfg.routes = routes
                    .iter()
                    .map(|r| RouteConfig {
                        prefix: r.prefix.to_string(),
                        mask: r.mask,
                        next_hop: r.next_hop.to_string(),
                        metric: r.metric,
                    })
                    .collect();
            }

            if let Some(policies) = device.policies() {
                dev_cfg.policies = policies
                    .entries()
                    .into_iter()
                    .map(|entry| {
                        let (action, ttl_min) = match entry.policy {
                            Policy::Block => (PolicyAction::Block, None),
                            Policy::MinTtl(n) => (PolicyAction::TtlMin, Some(n)),
                        };
                        PolicyConfig {
                            prefix: entry.prefix.to_string(),
                            mask: mask_from_len(entry.prefix_len).to_string(),
                            action,
                            ttl_min,
                        }
                    })
                    .collect();
            }

            config.devices.push(dev_cfg);
        }

        // Connect order decides each interface's relay target
        config.links = network
            .links()
            .into_iter()
            .map(|((dev_a, iface_a), (dev_b, iface_b))| LinkConfig {
                a: format!("{}:{}", dev_a, iface_a),
                b: format!("{}:{}", dev_b, iface_b),
            })
            .collect();

        config
    }
}

/// Queue the configured packets and count them as sent
pub fn inject_packets(
    config: &Config,
    network: &mut Network,
    stats: &mut Statistics,
) -> Result<Vec<PacketId>> {
    let mut ids = Vec::with_capacity(config.packets.len());
    for packet in &config.packets {
        let (device, iface) = packet
            .source()
            .ok_or_else(|| Error::Config(format!("malformed packet source '{}'", packet.from)))?;
        let destination = parse_ipv4(&packet.destination)?;
        ids.push(network.send_packet(device, iface, destination, &packet.payload, packet.ttl)?);
        stats.log_sent();
    }
    Ok(ids)
}
