//! Configuration validation

use super::{split_endpoint, Config, DeviceConfig, PolicyAction};
use crate::dataplane::DeviceKind;
use crate::protocol::addr::{parse_ipv4, parse_netmask};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_devices(config, &mut result);
    validate_links(config, &mut result);
    validate_packets(config, &mut result);

    result
}

fn validate_devices(config: &Config, result: &mut ValidationResult) {
    let mut names = HashSet::new();
    let mut addresses: HashMap<String, String> = HashMap::new();

    for device in &config.devices {
        if device.name.is_empty() {
            result.error("devices: device with empty name");
            continue;
        }
        if !names.insert(device.name.as_str()) {
            result.error(format!("devices: duplicate device '{}'", device.name));
        }

        let mut iface_names = HashSet::new();
        for iface in &device.interfaces {
            let at = format!("{}:{}", device.name, iface.name);
            if !iface_names.insert(iface.name.as_str()) {
                result.error(format!("{}: duplicate interface", at));
            }
            match iface.address {
                Some(ref addr) => {
                    if parse_ipv4(addr).is_err() {
                        result.error(format!("{}: invalid address '{}'", at, addr));
                    } else if let Some(other) = addresses.insert(addr.clone(), at.clone()) {
                        result.warn(format!("{}: address {} also used by {}", at, addr, other));
                    }
                }
                None => result.warn(format!("{}: no address configured", at)),
            }
        }

        validate_routes(device, result);
        validate_policies(device, result);
    }
}

fn validate_routes(device: &DeviceConfig, result: &mut ValidationResult) {
    if device.kind != DeviceKind::Router && !device.routes.is_empty() {
        result.error(format!(
            "{}: routes configured on a {}",
            device.name, device.kind
        ));
    }

    for (i, route) in device.routes.iter().enumerate() {
        if parse_ipv4(&route.prefix).is_err() {
            result.error(format!(
                "{}.routes[{}]: invalid prefix '{}'",
                device.name, i, route.prefix
            ));
        }
        if route.mask > 32 {
            result.error(format!(
                "{}.routes[{}]: mask length {} out of range",
                device.name, i, route.mask
            ));
        }
        if parse_ipv4(&route.next_hop).is_err() {
            result.error(format!(
                "{}.routes[{}]: invalid next hop '{}'",
                device.name, i, route.next_hop
            ));
        }
    }
}

fn validate_policies(device: &DeviceConfig, result: &mut ValidationResult) {
    if device.kind != DeviceKind::Router && !device.policies.is_empty() {
        result.error(format!(
            "{}: policies configured on a {}",
            device.name, device.kind
        ));
    }

    for (i, policy) in device.policies.iter().enumerate() {
        let at = format!("{}.policies[{}]", device.name, i);
        if parse_ipv4(&policy.prefix).is_err() {
            result.error(format!("{}: invalid prefix '{}'", at, policy.prefix));
        }
        match parse_netmask(&policy.mask) {
            Ok(mask) if u32::from(mask) == 0 => {
                result.error(format!("{}: mask '{}' selects no bits", at, policy.mask));
            }
            Ok(_) => {}
            Err(_) => result.error(format!("{}: invalid mask '{}'", at, policy.mask)),
        }
        match (policy.action, policy.ttl_min) {
            (PolicyAction::TtlMin, None) => {
                result.error(format!("{}: ttl-min requires ttl_min", at));
            }
            (PolicyAction::Block, Some(_)) => {
                result.warn(format!("{}: ttl_min ignored for block", at));
            }
            _ => {}
        }
    }
}

fn endpoint_exists(config: &Config, device: &str, iface: &str) -> bool {
    config
        .devices
        .iter()
        .find(|d| d.name == device)
        .is_some_and(|d| d.interfaces.iter().any(|i| i.name == iface))
}

fn validate_links(config: &Config, result: &mut ValidationResult) {
    for (i, link) in config.links.iter().enumerate() {
        for endpoint in [&link.a, &link.b] {
            match split_endpoint(endpoint) {
                Some((device, iface)) => {
                    if !endpoint_exists(config, device, iface) {
                        result.error(format!(
                            "links[{}]: endpoint '{}' not defined",
                            i, endpoint
                        ));
                    }
                }
                None => result.error(format!(
                    "links[{}]: endpoint '{}' is not DEVICE:INTERFACE",
                    i, endpoint
                )),
            }
        }
        if link.a == link.b {
            result.warn(format!("links[{}]: '{}' linked to itself", i, link.a));
        }
    }
}

fn validate_packets(config: &Config, result: &mut ValidationResult) {
    for (i, packet) in config.packets.iter().enumerate() {
        match packet.source() {
            Some((device, iface)) if !endpoint_exists(config, device, iface) => {
                result.error(format!(
                    "packets[{}]: source '{}' not defined",
                    i, packet.from
                ));
            }
            Some(_) => {}
            None => result.error(format!(
                "packets[{}]: source '{}' is not DEVICE:INTERFACE",
                i, packet.from
            )),
        }
        if parse_ipv4(&packet.destination).is_err() {
            result.error(format!(
                "packets[{}]: invalid destination '{}'",
                i, packet.destination
            ));
        }
        if packet.ttl == 0 {
            result.warn(format!("packets[{}]: TTL 0 expires on the first hop", i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterfaceConfig, LinkConfig, PacketConfig, PolicyConfig, RouteConfig};
    use crate::dataplane::LinkStatus;

    fn iface(name: &str, address: &str) -> InterfaceConfig {
        InterfaceConfig {
            name: name.to_string(),
            address: Some(address.to_string()),
            status: LinkStatus::Up,
        }
    }

    fn make_config() -> Config {
        let mut r1 = DeviceConfig::new("R1", DeviceKind::Router);
        r1.interfaces.push(iface("g0/0", "10.0.12.1"));
        let mut r2 = DeviceConfig::new("R2", DeviceKind::Router);
        r2.interfaces.push(iface("g0/0", "10.0.12.2"));

        Config {
            devices: vec![r1, r2],
            links: vec![LinkConfig {
                a: "R1:g0/0".to_string(),
                b: "R2:g0/0".to_string(),
            }],
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_minimal_config() {
        let config = make_config();
        let result = validate(&config);
        assert!(!result.has_errors());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_names() {
        let mut config = make_config();
        config.devices[0].interfaces.push(iface("g0/0", "10.0.13.1"));
        config.devices.push(DeviceConfig::new("R2", DeviceKind::Host));

        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("duplicate device 'R2'")));
        assert!(result.errors.iter().any(|e| e.contains("R1:g0/0: duplicate interface")));
    }

    #[test]
    fn test_invalid_interface_address() {
        let mut config = make_config();
        config.devices[0].interfaces[0].address = Some("10.0.12.256".to_string());

        let result = validate(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("invalid address '10.0.12.256'")));
    }

    #[test]
    fn test_shared_address_warning() {
        let mut config = make_config();
        config.devices[1].interfaces[0].address = Some("10.0.12.1".to_string());

        let result = validate(&config);
        assert!(!result.has_errors());
        assert!(result.warnings.iter().any(|w| w.contains("also used by R1:g0/0")));
    }

    #[test]
    fn test_routes_on_host_rejected() {
        let mut config = make_config();
        let mut host = DeviceConfig::new("H1", DeviceKind::Host);
        host.routes.push(RouteConfig {
            prefix: "10.0.0.0".to_string(),
            mask: 8,
            next_hop: "10.0.12.1".to_string(),
            metric: 1,
        });
        config.devices.push(host);

        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("routes configured on a host")));
    }

    #[test]
    fn test_route_mask_out_of_range() {
        let mut config = make_config();
        config.devices[0].routes.push(RouteConfig {
            prefix: "10.0.0.0".to_string(),
            mask: 33,
            next_hop: "10.0.12.2".to_string(),
            metric: 1,
        });

        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("mask length 33 out of range")));
    }

    #[test]
    fn test_policy_checks() {
        let mut config = make_config();
        config.devices[0].policies = vec![
            PolicyConfig {
                prefix: "10.1.0.0".to_string(),
                mask: "255.255.0.0".to_string(),
                action: PolicyAction::TtlMin,
                ttl_min: None,
            },
            PolicyConfig {
                prefix: "10.0.0.0".to_string(),
                mask: "0.0.0.0".to_string(),
                action: PolicyAction::Block,
                ttl_min: None,
            },
            PolicyConfig {
                prefix: "10.0.0.0".to_string(),
                mask: "8".to_string(),
                action: PolicyAction::Block,
                ttl_min: Some(3),
            },
        ];

        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("ttl-min requires ttl_min")));
        assert!(result.errors.iter().any(|e| e.contains("selects no bits")));
        assert!(result.warnings.iter().any(|w| w.contains("ttl_min ignored")));
    }

    #[test]
    fn test_link_endpoints() {
        let mut config = make_config();
        config.links.push(LinkConfig {
            a: "R1:g0/9".to_string(),
            b: "R2".to_string(),
        });

        let result = validate(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("endpoint 'R1:g0/9' not defined")));
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("endpoint 'R2' is not DEVICE:INTERFACE")));
    }

    #[test]
    fn test_packet_checks() {
        let mut config = make_config();
        config.packets.push(PacketConfig {
            from: "R3:g0/0".to_string(),
            destination: "10.0.12".to_string(),
            payload: String::new(),
            ttl: 0,
        });

        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("source 'R3:g0/0' not defined")));
        assert!(result.errors.iter().any(|e| e.contains("invalid destination")));
        assert!(result.warnings.iter().any(|w| w.contains("TTL 0")));
    }
}
