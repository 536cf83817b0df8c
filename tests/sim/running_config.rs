//! Saving and reloading the running configuration

use super::lab::{ip, scratch_file, Lab};
use lansim::cli::Shell;
use lansim::config::{self, Config, PolicyAction};
use lansim::dataplane::{Network, Policy};
use lansim::telemetry::ErrorLog;

#[test]
fn test_shell_built_network_survives_save_and_load() {
    let path = scratch_file("running");
    let script = format!(
        "hostname R1
interface g0/0
ip address 10.0.12.1
no shutdown
exit
ip route add 10.0.0.0 8 via 10.0.12.2 metric 3
ip route add 172.16.0.0 12 via 10.0.12.2
policy set 10.1.0.0 255.255.0.0 ttl-min 5
policy set 192.168.0.0 16 block
exit
hostname R2
interface g0/0
ip address 10.0.12.2
exit
exit
connect R1 g0/0 R2 g0/0
set_device_status R2 offline
save running-config {}
",
        path.display()
    );

    let mut shell = Shell::new();
    let mut out = Vec::new();
    shell.run(script.as_bytes(), &mut out, false).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Saved running-config to"), "{}", out);

    let cfg = config::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(!config::validate(&cfg).has_errors());

    assert_eq!(cfg.devices.len(), 2);
    assert_eq!(cfg.links.len(), 1);
    assert!(!cfg.devices[1].online);
    assert_eq!(cfg.devices[0].routes.len(), 2);
    assert_eq!(cfg.devices[0].routes[0].metric, 3);
    let actions: Vec<PolicyAction> = cfg.devices[0].policies.iter().map(|p| p.action).collect();
    assert_eq!(actions, [PolicyAction::TtlMin, PolicyAction::Block]);

    let mut errors = ErrorLog::new();
    let network = Network::from_config(&cfg, &mut errors).unwrap();
    assert!(errors.is_empty());

    let r1 = network.get("R1").unwrap();
    let original = shell.network().get("R1").unwrap();
    assert_eq!(
        r1.route_table().unwrap().inorder(),
        original.route_table().unwrap().inorder()
    );
    assert_eq!(
        r1.policies().unwrap().entries(),
        original.policies().unwrap().entries()
    );
    assert_eq!(
        r1.policies().unwrap().get_policy(ip(192, 168, 3, 4)),
        Some(Policy::Block)
    );
}

#[test]
fn test_reload_keeps_relay_targets() {
    let path = scratch_file("relay");
    let script = format!(
        "hostname R1
interface g0/0
ip address 10.0.12.1
hostname R2
interface g0/0
ip address 10.0.12.2
hostname R3
interface g0/0
ip address 10.0.23.3
exit
exit
connect R2 g0/0 R3 g0/0
connect R1 g0/0 R2 g0/0
save running-config {}
",
        path.display()
    );

    let mut shell = Shell::new();
    let mut out = Vec::new();
    shell.run(script.as_bytes(), &mut out, false).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let mut lab = Lab::from_toml(&text);
    for name in ["R1", "R2", "R3"] {
        assert_eq!(
            lab.network.connections(name).unwrap(),
            shell.network().connections(name).unwrap(),
            "{}",
            name
        );
    }
    assert_eq!(lab.network.connections("R2").unwrap()[0].peer_device, "R3");

    // R2 still relays toward R3, its first link
    lab.send("R2", "g0/0", ip(8, 8, 8, 8), 5);
    lab.tick();
    assert_eq!(lab.queued("R3", "g0/0"), 1);
    assert_eq!(lab.queued("R1", "g0/0"), 0);
}

#[test]
fn test_snapshot_of_lab_topology() {
    let lab = Lab::from_toml(
        r#"
[[devices]]
name = "S1"
kind = "switch"
[[devices.interfaces]]
name = "p1"
address = "10.0.0.1"
[[devices.interfaces]]
name = "p2"
address = "10.0.0.2"

[[links]]
a = "S1:p1"
b = "S1:p2"
"#,
    );

    let snapshot = Config::from_network(&lab.network);
    assert_eq!(snapshot.devices[0].kind, lansim::dataplane::DeviceKind::Switch);
    assert!(snapshot.devices[0].routes.is_empty());
    // A link between two ports of the same device is still written once
    assert_eq!(snapshot.links.len(), 1);
    assert_eq!(snapshot.links[0].a, "S1:p1");
    assert_eq!(snapshot.links[0].b, "S1:p2");
}

#[test]
fn test_load_missing_file() {
    let path = scratch_file("missing");
    assert!(matches!(config::load(&path), Err(lansim::Error::Io(_))));
}
