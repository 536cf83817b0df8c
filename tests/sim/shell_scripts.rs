//! Scripted shell sessions

use super::lab::scratch_file;
use lansim::cli::{Flow, Mode, Shell};
use lansim::config;
use lansim::dataplane::Network;
use lansim::telemetry::{DiagnosticKind, ErrorLog, Statistics};

fn run_script(shell: &mut Shell, script: &str) -> String {
    let mut out = Vec::new();
    shell.run(script.as_bytes(), &mut out, false).unwrap();
    String::from_utf8(out).unwrap()
}

const LAN: &str = "
# two routers and a host
hostname R1
interface g0/0
ip address 10.0.12.1
no shutdown
interface g0/1
ip address 192.168.1.1
no shutdown
exit
exit
hostname R2
interface g0/0
ip address 10.0.12.2
no shutdown
exit
exit
connect R1 g0/0 R2 g0/0
";

#[test]
fn test_full_session() {
    let mut shell = Shell::new();
    run_script(&mut shell, LAN);

    let out = run_script(
        &mut shell,
        "list_devices
show interfaces R1
send 10.0.12.1 10.0.12.2 first message 5
send 10.0.12.1 10.0.12.2 second message 5
send 10.0.12.1 10.9.9.9 lost 2
tick 4
show statistics
show history R2
",
    );

    assert!(out.contains("R1 (router) online, 2 interfaces"));
    assert!(out.contains("R2 (router) online, 1 interfaces"));
    assert!(out.contains("192.168.1.1"));
    assert!(out.contains("Packet pkt-2 queued for delivery."));
    assert!(out.contains("Packets sent:           3"));
    assert!(out.contains("Packets delivered:      2"));
    assert!(out.contains("Dropped (TTL expired):  1"));
    assert!(out.contains("Average hops:           1.00"));
    assert!(out.contains("Top talker:             R2 (2 delivered)"));
    assert!(out.contains("\"second message\""));

    // Most recent delivery first
    let first = out.find("\"second message\"").unwrap();
    let second = out.find("\"first message\"").unwrap();
    assert!(first < second);
}

#[test]
fn test_route_tree_rendering() {
    let mut shell = Shell::new();
    let out = run_script(
        &mut shell,
        "hostname R1
ip route add 10.0.0.0 8 via 1.1.1.1
ip route add 10.1.0.0 16 via 1.1.1.1
ip route add 10.2.0.0 16 via 1.1.1.1
show ip route-tree
",
    );

    assert!(out.contains("[10.1.0.0/16]\n"));
    assert!(out.contains("├── [10.0.0.0/8]"));
    assert!(out.contains("└── [10.2.0.0/16]"));
}

#[test]
fn test_routes_require_a_router() {
    let cfg = config::parse(
        r#"
[[devices]]
name = "H1"
kind = "host"
[[devices.interfaces]]
name = "eth0"
address = "192.168.1.10"
"#,
    )
    .unwrap();
    let mut errors = ErrorLog::new();
    let network = Network::from_config(&cfg, &mut errors).unwrap();
    let mut shell = Shell::with_network(network);

    let out = run_script(
        &mut shell,
        "hostname H1
ip route add 10.0.0.0 8 via 192.168.1.1
policy set 10.0.0.0 8 block
",
    );

    assert!(out.contains("Error: device H1 is not a router"));
    assert_eq!(shell.error_log().count(DiagnosticKind::InsertError), 1);
    assert_eq!(shell.error_log().count(DiagnosticKind::PolicyError), 1);
}

#[test]
fn test_usage_errors_are_syntax_errors() {
    let mut shell = Shell::new();
    let out = run_script(
        &mut shell,
        "connect R1 g0/0
set_device_status R1 sleeping
tick zero
show error-log
",
    );

    assert!(out.contains("Error: usage: connect <dev> <if> <dev> <if>"));
    assert_eq!(shell.error_log().count(DiagnosticKind::SyntaxError), 3);
    assert!(out.contains("| Command: tick zero"));
}

#[test]
fn test_execute_reports_quit() {
    let mut shell = Shell::new();
    let mut out = Vec::new();
    assert_eq!(shell.execute("help", &mut out).unwrap(), Flow::Continue);
    assert_eq!(shell.execute("quit", &mut out).unwrap(), Flow::Quit);
    assert!(String::from_utf8(out).unwrap().contains("send <src-ip> <dst-ip>"));
}

#[test]
fn test_privilege_modes() {
    let mut shell = Shell::new();
    let out = run_script(
        &mut shell,
        "enable
configure terminal
hostname R1
interface g0/0
ip address 10.0.12.1
exit
exit
",
    );
    assert!(out.is_empty(), "{}", out);
    assert!(shell.error_log().is_empty());
    assert_eq!(shell.mode(), Mode::Config);
    assert_eq!(shell.prompt(), "lansim(config)# ");

    run_script(&mut shell, "exit\n");
    assert_eq!(shell.prompt(), "lansim# ");
    run_script(&mut shell, "hostname R1\ndisable\n");
    assert_eq!(shell.prompt(), "lansim> ");

    let out = run_script(&mut shell, "configure\n");
    assert!(out.contains("Error: usage: configure terminal"));
}

const LOADABLE: &str = r#"
[[devices]]
name = "R1"
[[devices.interfaces]]
name = "g0/0"
address = "10.0.12.1"

[[devices]]
name = "R2"
[[devices.interfaces]]
name = "g0/0"
address = "10.0.12.2"

[[links]]
a = "R1:g0/0"
b = "R2:g0/0"

[[packets]]
from = "R1:g0/0"
destination = "10.0.12.2"
payload = "from file"
ttl = 3
"#;

#[test]
fn test_load_config_replaces_network() {
    let path = scratch_file("load");
    std::fs::write(&path, LOADABLE).unwrap();

    let mut shell = Shell::new();
    let out = run_script(
        &mut shell,
        &format!(
            "hostname OLD
load config {}
tick 2
show history R2
",
            path.display()
        ),
    );
    let _ = std::fs::remove_file(&path);

    assert!(out.contains("devices, 1 links, 1 packets queued"), "{}", out);
    assert!(shell.network().device("OLD").is_none());
    assert_eq!(shell.prompt(), "lansim> ");
    assert_eq!(shell.statistics().sent.get(), 1);
    assert_eq!(shell.statistics().delivered(), 1);
    assert!(out.contains("\"from file\""));
    assert!(shell.error_log().is_empty());
}

#[test]
fn test_failed_load_keeps_network() {
    let path = scratch_file("broken");
    std::fs::write(&path, LOADABLE.replace("10.0.12.2\"\n\n[[links]]", "10.0.12.256\"\n\n[[links]]"))
        .unwrap();

    let mut shell = Shell::new();
    let out = run_script(
        &mut shell,
        &format!("hostname R9\nload config {}\nload config\n", path.display()),
    );
    let _ = std::fs::remove_file(&path);

    assert!(out.contains("invalid address '10.0.12.256'"), "{}", out);
    assert!(out.contains("Error: usage: load config <path>"));
    assert!(shell.network().device("R9").is_some());
    assert_eq!(shell.error_log().count(DiagnosticKind::CommandError), 1);
    assert_eq!(shell.error_log().count(DiagnosticKind::SyntaxError), 1);
}

#[test]
fn test_shell_keeps_build_diagnostics() {
    let cfg = config::parse(&LOADABLE.replace(
        "address = \"10.0.12.1\"",
        "address = \"10.0.12.1\"\n[[devices.routes]]\nprefix = \"10.0.0.0\"\nmask = 40\nnext_hop = \"10.0.12.2\"",
    ))
    .unwrap();
    let mut errors = ErrorLog::new();
    let mut stats = Statistics::new();
    let mut network = Network::from_config(&cfg, &mut errors).unwrap();
    config::inject_packets(&cfg, &mut network, &mut stats).unwrap();

    let mut shell = Shell::with_state(network, stats, errors);
    let out = run_script(&mut shell, "show error-log\nshow statistics\n");

    assert!(out.contains("InsertError"), "{}", out);
    assert!(out.contains("R1: route 10.0.0.0/40"));
    assert!(out.contains("Packets sent:           1"));
}
