//! Tick-driven forwarding over small topologies
//!
//! Topology used by most tests:
//! ```text
//! ┌──────────┐ g0/0      g0/0 ┌──────────┐ g0/1      g0/0 ┌──────────┐
//! │    R1    │────────────────│    R2    │────────────────│    R3    │
//! │10.0.12.1 │                │10.0.12.2 │                │10.0.23.3 │
//! └──────────┘                │10.0.23.2 │                └──────────┘
//!                             └──────────┘
//! ```
//! Packets always leave through the first neighbor of the interface they
//! arrived on, so traffic entering R2 on g0/0 goes back to R1.

use super::lab::{ip, Lab};
use lansim::dataplane::{HistoryEvent, Policy};
use lansim::telemetry::DiagnosticKind;

const CHAIN: &str = r#"
[[devices]]
name = "R1"
[[devices.interfaces]]
name = "g0/0"
address = "10.0.12.1"
status = "up"

[[devices]]
name = "R2"
[[devices.interfaces]]
name = "g0/0"
address = "10.0.12.2"
status = "up"
[[devices.interfaces]]
name = "g0/1"
address = "10.0.23.2"
status = "up"

[[devices]]
name = "R3"
[[devices.interfaces]]
name = "g0/0"
address = "10.0.23.3"
status = "up"

[[links]]
a = "R1:g0/0"
b = "R2:g0/0"

[[links]]
a = "R2:g0/1"
b = "R3:g0/0"
"#;

#[test]
fn test_delivered_on_second_tick() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.send("R1", "g0/0", ip(10, 0, 12, 2), 2);

    let first = lab.tick();
    assert_eq!(first.relayed, 1);
    assert_eq!(lab.stats.delivered(), 0);

    let second = lab.tick();
    assert_eq!(second.delivered, 1);
    assert_eq!(lab.stats.hop_counts(), [1]);
    assert_eq!(lab.stats.top_talker(), Some(("R2", 1)));

    let r2 = lab.network.get("R2").unwrap();
    let entry = r2.history().iter().next().unwrap();
    assert_eq!(entry.event, HistoryEvent::Delivered);
    assert_eq!(entry.packet.ttl, 1);
    assert_eq!(entry.packet.trace_display(), "R1");
}

#[test]
fn test_ttl_one_expires_at_first_router() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.send("R1", "g0/0", ip(10, 0, 12, 2), 1);

    let summary = lab.run(3);
    assert_eq!(summary.dropped_ttl, 1);
    assert_eq!(summary.delivered, 0);
    assert_eq!(lab.stats.dropped_ttl.get(), 1);
    assert_eq!(lab.errors.count(DiagnosticKind::TtlExpired), 1);
    assert_eq!(lab.queued("R2", "g0/0"), 0);
}

#[test]
fn test_unreachable_destination_bounces_until_ttl_runs_out() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.send("R1", "g0/0", ip(192, 168, 1, 1), 3);

    assert_eq!(lab.tick().relayed, 1); // R1 -> R2
    assert_eq!(lab.tick().relayed, 1); // R2 -> R1
    assert_eq!(lab.tick().dropped_ttl, 1);

    // Nothing left anywhere
    assert_eq!(lab.run(2).processed, 0);
}

#[test]
fn test_local_destination_delivered_without_hops() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.send("R1", "g0/0", ip(10, 0, 12, 1), 1);

    assert_eq!(lab.tick().delivered, 1);
    assert_eq!(lab.stats.hop_counts(), [0]);
    assert_eq!(lab.stats.average_hops(), 0.0);
}

#[test]
fn test_one_packet_per_interface_per_tick() {
    let mut lab = Lab::from_toml(CHAIN);
    for _ in 0..3 {
        lab.send("R1", "g0/0", ip(10, 0, 12, 2), 5);
    }

    lab.tick();
    assert_eq!(lab.queued("R1", "g0/0"), 2);
    assert_eq!(lab.queued("R2", "g0/0"), 1);

    // One delivery per tick from here on
    assert_eq!(lab.run(3).delivered, 3);
    assert_eq!(lab.stats.delivered(), 3);
}

#[test]
fn test_relay_is_not_processed_in_same_tick() {
    let mut lab = Lab::from_toml(CHAIN);
    // R2 runs after R1, but must not see R1's relay until the next tick
    lab.send("R1", "g0/0", ip(10, 0, 12, 2), 4);

    let summary = lab.tick();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.delivered, 0);
}

#[test]
fn test_third_router_reached_from_its_segment() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.send("R2", "g0/1", ip(10, 0, 23, 3), 3);

    assert_eq!(lab.run(2).delivered, 1);
    assert_eq!(lab.stats.activity("R3"), 1);
}

#[test]
fn test_block_policy_drops_before_delivery() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.network
        .get_mut("R2")
        .unwrap()
        .policies_mut()
        .unwrap()
        .set_policy(ip(10, 0, 12, 0), ip(255, 255, 255, 0), Policy::Block)
        .unwrap();

    lab.send("R1", "g0/0", ip(10, 0, 12, 2), 8);
    let summary = lab.run(3);

    assert_eq!(summary.dropped_policy, 1);
    assert_eq!(lab.stats.dropped_policy.get(), 1);
    assert_eq!(lab.stats.delivered(), 0);
    assert!(lab.network.get("R2").unwrap().history().is_empty());
    assert_eq!(lab.errors.count(DiagnosticKind::PolicyDrop), 1);
}

#[test]
fn test_min_ttl_policy_uses_arrival_ttl() {
    let policy = r#"
[[devices.policies]]
prefix = "10.0.12.2"
mask = "32"
action = "ttl-min"
ttl_min = 3
"#;
    // Attach the policy to R2, right before R3 is declared
    let topology = CHAIN.replacen(
        "[[devices]]\nname = \"R3\"",
        &format!("{}\n\n[[devices]]\nname = \"R3\"", policy.trim()),
        1,
    );
    let mut lab = Lab::from_toml(&topology);
    assert_eq!(
        lab.network.get("R2").unwrap().policies().unwrap().len(),
        1
    );

    // Arrives at R2 with TTL 2
    lab.send("R1", "g0/0", ip(10, 0, 12, 2), 3);
    // Arrives at R2 with TTL 3
    lab.send("R1", "g0/0", ip(10, 0, 12, 2), 4);

    let summary = lab.run(4);
    assert_eq!(summary.dropped_policy, 1);
    assert_eq!(summary.delivered, 1);
}

#[test]
fn test_unconnected_interface_absorbs() {
    let mut lab = Lab::from_toml(
        r#"
[[devices]]
name = "H1"
kind = "host"
[[devices.interfaces]]
name = "eth0"
address = "192.168.0.10"
"#,
    );
    lab.send("H1", "eth0", ip(8, 8, 8, 8), 5);

    let summary = lab.tick();
    assert_eq!(summary.absorbed, 1);
    let history = lab.network.get("H1").unwrap().history();
    let entry = history.iter().next().unwrap();
    assert_eq!(entry.event, HistoryEvent::Absorbed);
    assert_eq!(entry.event.to_string(), "absorbed");
    assert_eq!(entry.packet.ttl, 4);
}

#[test]
fn test_offline_router_holds_packets() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.send("R1", "g0/0", ip(10, 0, 12, 2), 4);
    lab.network.set_device_status("R2", false).unwrap();

    lab.run(3);
    assert_eq!(lab.queued("R2", "g0/0"), 1);
    assert_eq!(lab.stats.delivered(), 0);

    // Packets cannot be injected at an offline device
    assert!(lab
        .network
        .send_packet("R2", "g0/0", ip(10, 0, 12, 1), "x", 2)
        .is_err());

    lab.network.set_device_status("R2", true).unwrap();
    assert_eq!(lab.tick().delivered, 1);
}

#[test]
fn test_disconnect_while_in_flight() {
    let mut lab = Lab::from_toml(CHAIN);
    lab.send("R1", "g0/0", ip(172, 16, 0, 1), 6);
    lab.tick();

    assert!(lab.network.disconnect("R1", "g0/0", "R2", "g0/0").unwrap());
    // R2 has nowhere to send it back to
    assert_eq!(lab.tick().absorbed, 1);
    assert_eq!(lab.run(3).processed, 0);
}
