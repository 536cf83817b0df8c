//! Configuration types

use crate::dataplane::{DeviceKind, LinkStatus};
use crate::telemetry::LogConfig;
use serde::{Deserialize, Serialize};

/// Topology file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    /// Packets injected before the first tick
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packets: Vec<PacketConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: DeviceKind,
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<PolicyConfig>,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            online: true,
            interfaces: Vec::new(),
            routes: Vec::new(),
            policies: Vec::new(),
        }
    }
}

fn default_kind() -> DeviceKind {
    DeviceKind::Router
}

fn default_online() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    /// Dotted-quad address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub status: LinkStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    /// Prefix length
    pub mask: u8,
    pub next_hop: String,
    #[serde(default = "default_metric")]
    pub metric: u32,
}

fn default_metric() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyAction {
    Block,
    TtlMin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub prefix: String,
    /// Dotted mask or prefix length
    pub mask: String,
    pub action: PolicyAction,
    /// Threshold for `ttl-min`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_min: Option<u32>,
}

/// Link between two `DEVICE:INTERFACE` endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: String,
    pub b: String,
}

impl LinkConfig {
    /// Both endpoints split into (device, interface)
    pub fn endpoints(&self) -> Option<((&str, &str), (&str, &str))> {
        Some((split_endpoint(&self.a)?, split_endpoint(&self.b)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketConfig {
    /// Source `DEVICE:INTERFACE`
    pub from: String,
    pub destination: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl PacketConfig {
    pub fn source(&self) -> Option<(&str, &str)> {
        split_endpoint(&self.from)
    }
}

fn default_ttl() -> u32 {
    64
}

/// Split `DEVICE:INTERFACE`. Interface names may contain ':' themselves.
pub fn split_endpoint(s: &str) -> Option<(&str, &str)> {
    let (device, iface) = s.split_once(':')?;
    if device.is_empty() || iface.is_empty() {
        return None;
    }
    Some((device, iface))
}
