//! Administrative shell
//!
//! One command per line. Every rejected command is reported on the output
//! and recorded in the error log; the shell keeps going.

use crate::config::{self, Config};
use crate::dataplane::{
    Device, DeviceKind, Interface, LinkStatus, Network, Policy, PolicyTrie, RouteTable,
    TickSummary,
};
use crate::protocol::addr::{parse_ipv4, parse_netmask, parse_prefix_len};
use crate::telemetry::{Diagnostic, DiagnosticKind, DiagnosticSink, ErrorLog, Statistics};
use crate::Error;
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use tracing::debug;

const HELP: &str = "lansim shell

MODES:
    enable | disable | configure terminal    Change the prompt mode
    exit                                     Leave interface, device, then mode

DEVICE CONFIGURATION:
    hostname <name>                          Select a device, creating a router if needed
    interface <name>                         Select an interface, creating it if needed
    ip address <addr>                        Address the selected interface
    shutdown | no shutdown                   Bring the selected interface down / up
    connect <dev> <if> <dev> <if>            Link two interfaces
    disconnect <dev> <if> <dev> <if>         Remove a link
    list_devices
    set_device_status <dev> online|offline

ROUTES AND POLICIES (selected router):
    ip route add <prefix> <len> via <next-hop> [metric N]
    ip route del <prefix> <len>
    show ip route | show ip route-tree | show route avl-stats
    policy set <prefix> <mask> block
    policy set <prefix> <mask> ttl-min <N>
    policy unset <prefix> <mask>
    show ip prefix-tree

SIMULATION:
    send <src-ip> <dst-ip> <message...> <ttl>
    tick [count] | process
    show statistics
    show history|queue|interfaces|connections <dev>
    show error-log [n]
    save running-config <path>
    load config <path>                       Replace the network with a topology file
    help | quit";

/// Prompt mode. Modes only change the prompt; every command is accepted
/// in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    User,
    Privileged,
    Config,
}

/// Whether the shell should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{}", .0.message)]
    Rejected(Diagnostic),
}

fn reject(kind: DiagnosticKind, message: impl Display) -> ShellError {
    ShellError::Rejected(Diagnostic::new(kind, message.to_string()))
}

fn usage(text: &str) -> ShellError {
    reject(DiagnosticKind::SyntaxError, format!("usage: {}", text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyArg<'a> {
    Block,
    TtlMin(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Help,
    Quit,
    Exit,
    Enable,
    Disable,
    ConfigureTerminal,
    Hostname(&'a str),
    Interface(&'a str),
    IpAddress(&'a str),
    Shutdown,
    NoShutdown,
    Connect([&'a str; 4]),
    Disconnect([&'a str; 4]),
    ListDevices,
    SetDeviceStatus { device: &'a str, online: bool },
    RouteAdd {
        prefix: &'a str,
        len: &'a str,
        next_hop: &'a str,
        metric: Option<&'a str>,
    },
    RouteDel { prefix: &'a str, len: &'a str },
    ShowRoutes,
    ShowRouteTree,
    ShowAvlStats,
    PolicySet {
        prefix: &'a str,
        mask: &'a str,
        action: PolicyArg<'a>,
    },
    PolicyUnset { prefix: &'a str, mask: &'a str },
    ShowPrefixTree,
    Send {
        source: &'a str,
        destination: &'a str,
        message: String,
        ttl: &'a str,
    },
    Tick(&'a str),
    ShowStatistics,
    ShowHistory(&'a str),
    ShowQueue(&'a str),
    ShowInterfaces(&'a str),
    ShowConnections(&'a str),
    ShowErrorLog(Option<&'a str>),
    SaveRunningConfig(&'a str),
    LoadConfig(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Result<Self, ShellError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = match parts[..] {
            [] => Command::Empty,
            ["help"] => Command::Help,
            ["quit"] => Command::Quit,
            ["exit"] => Command::Exit,
            ["enable"] => Command::Enable,
            ["disable"] => Command::Disable,
            ["configure", "terminal"] => Command::ConfigureTerminal,
            ["configure", ..] => return Err(usage("configure terminal")),
            ["hostname", name] => Command::Hostname(name),
            ["hostname", ..] => return Err(usage("hostname <name>")),
            ["interface", name] => Command::Interface(name),
            ["interface", ..] => return Err(usage("interface <name>")),
            ["ip", "address", addr] => Command::IpAddress(addr),
            ["ip", "address", ..] => return Err(usage("ip address <addr>")),
            ["shutdown"] => Command::Shutdown,
            ["no", "shutdown"] => Command::NoShutdown,
            ["connect", a, b, c, d] => Command::Connect([a, b, c, d]),
            ["connect", ..] => return Err(usage("connect <dev> <if> <dev> <if>")),
            ["disconnect", a, b, c, d] => Command::Disconnect([a, b, c, d]),
            ["disconnect", ..] => return Err(usage("disconnect <dev> <if> <dev> <if>")),
            ["list_devices"] => Command::ListDevices,
            ["set_device_status", device, "online"] => Command::SetDeviceStatus {
                device,
                online: true,
            },
            ["set_device_status", device, "offline"] => Command::SetDeviceStatus {
                device,
                online: false,
            },
            ["set_device_status", ..] => {
                return Err(usage("set_device_status <dev> online|offline"))
            }
            ["ip", "route", "add", prefix, len, "via", next_hop] => Command::RouteAdd {
                prefix,
                len,
                next_hop,
                metric: None,
            },
            ["ip", "route", "add", prefix, len, "via", next_hop, "metric", metric] => {
                Command::RouteAdd {
                    prefix,
                    len,
                    next_hop,
                    metric: Some(metric),
                }
            }
            ["ip", "route", "del", prefix, len] => Command::RouteDel { prefix, len },
            ["ip", "route", ..] => {
                return Err(usage(
                    "ip route add <prefix> <len> via <next-hop> [metric N] | ip route del <prefix> <len>",
                ))
            }
            ["show", "ip", "route"] => Command::ShowRoutes,
            ["show", "ip", "route-tree"] => Command::ShowRouteTree,
            ["show", "route", "avl-stats"] => Command::ShowAvlStats,
            ["policy", "set", prefix, mask, "block"] => Command::PolicySet {
                prefix,
                mask,
                action: PolicyArg::Block,
            },
            ["policy", "set", prefix, mask, "ttl-min", n] => Command::PolicySet {
                prefix,
                mask,
                action: PolicyArg::TtlMin(n),
            },
            ["policy", "unset", prefix, mask] => Command::PolicyUnset { prefix, mask },
            ["policy", ..] => {
                return Err(usage(
                    "policy set <prefix> <mask> block|ttl-min <N> | policy unset <prefix> <mask>",
                ))
            }
            ["show", "ip", "prefix-tree"] => Command::ShowPrefixTree,
            ["send", source, destination, ref message @ .., ttl] if !message.is_empty() => {
                Command::Send {
                    source,
                    destination,
                    message: message.join(" "),
                    ttl,
                }
            }
            ["send", ..] => return Err(usage("send <src-ip> <dst-ip> <message...> <ttl>")),
            ["tick" | "process"] => Command::Tick("1"),
            ["tick" | "process", count] => Command::Tick(count),
            ["show", "statistics"] => Command::ShowStatistics,
            ["show", "history", device] => Command::ShowHistory(device),
            ["show", "queue", device] => Command::ShowQueue(device),
            ["show", "interfaces", device] => Command::ShowInterfaces(device),
            ["show", "connections", device] => Command::ShowConnections(device),
            ["show", what @ ("history" | "queue" | "interfaces" | "connections"), ..] => {
                return Err(usage(&format!("show {} <dev>", what)))
            }
            ["show", "error-log"] => Command::ShowErrorLog(None),
            ["show", "error-log", n] => Command::ShowErrorLog(Some(n)),
            ["save", "running-config", path] => Command::SaveRunningConfig(path),
            ["save", ..] => return Err(usage("save running-config <path>")),
            ["load", "config", path] => Command::LoadConfig(path),
            ["load", ..] => return Err(usage("load config <path>")),
            _ => {
                return Err(reject(
                    DiagnosticKind::CommandError,
                    "unrecognized or incomplete command",
                ))
            }
        };
        Ok(cmd)
    }
}

/// Command shell over a network, its statistics and its error log
#[derive(Debug, Default)]
pub struct Shell {
    network: Network,
    stats: Statistics,
    errors: ErrorLog,
    mode: Mode,
    device: Option<String>,
    interface: Option<String>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Start from a network together with the sinks it was built with
    pub fn with_state(network: Network, stats: Statistics, errors: ErrorLog) -> Self {
        Self {
            network,
            stats,
            errors,
            ..Self::default()
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn statistics_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Prompt for the current selection and mode
    pub fn prompt(&self) -> String {
        match (&self.device, &self.interface, self.mode) {
            (Some(dev), Some(_), _) => format!("{}(config-if)# ", dev),
            (Some(dev), None, _) => format!("{}(config)# ", dev),
            (None, _, Mode::User) => "lansim> ".to_string(),
            (None, _, Mode::Privileged) => "lansim# ".to_string(),
            (None, _, Mode::Config) => "lansim(config)# ".to_string(),
        }
    }

    /// Run commands from `input` until it ends or `quit` is read.
    ///
    /// Blank lines and lines starting with `#` are skipped. With `echo_prompt`
    /// the prompt is written before each line is read.
    pub fn run<R: BufRead>(
        &mut self,
        input: R,
        out: &mut dyn Write,
        echo_prompt: bool,
    ) -> io::Result<()> {
        let mut lines = input.lines();
        loop {
            if echo_prompt {
                write!(out, "{}", self.prompt())?;
                out.flush()?;
            }
            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;
            if line.trim_start().starts_with('#') {
                continue;
            }
            if self.execute(&line, out)? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Execute one command line.
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        let result = Command::parse(line).and_then(|cmd| self.dispatch(cmd, out));
        match result {
            Ok(flow) => Ok(flow),
            Err(ShellError::Io(e)) => Err(e),
            Err(ShellError::Rejected(diagnostic)) => {
                writeln!(out, "Error: {}", diagnostic.message)?;
                self.errors.record(diagnostic.with_context(line.trim()));
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch(&mut self, cmd: Command<'_>, out: &mut dyn Write) -> Result<Flow, ShellError> {
        debug!("Shell command: {:?}", cmd);
        match cmd {
            Command::Empty => {}
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => {
                writeln!(out, "Bye.")?;
                return Ok(Flow::Quit);
            }
            Command::Exit => {
                if self.interface.take().is_none() && self.device.take().is_none() {
                    self.mode = match self.mode {
                        Mode::Config => Mode::Privileged,
                        Mode::Privileged | Mode::User => Mode::User,
                    };
                }
            }
            Command::Enable => {
                if self.mode == Mode::User {
                    self.mode = Mode::Privileged;
                }
            }
            Command::Disable => {
                self.mode = Mode::User;
                self.device = None;
                self.interface = None;
            }
            Command::ConfigureTerminal => self.mode = Mode::Config,
            Command::Hostname(name) => {
                self.network.ensure_device(name, DeviceKind::Router);
                self.device = Some(name.to_string());
                self.interface = None;
            }
            Command::Interface(name) => {
                let device = self.selected_device(DiagnosticKind::ConnectionError)?;
                device.add_interface(name);
                self.interface = Some(name.to_string());
            }
            Command::IpAddress(addr) => {
                let addr = parse_ipv4(addr).map_err(|e| reject(DiagnosticKind::SyntaxError, e))?;
                self.selected_interface()?.address = Some(addr);
            }
            Command::Shutdown => {
                self.selected_interface()?.status = LinkStatus::Down;
            }
            Command::NoShutdown => {
                self.selected_interface()?.status = LinkStatus::Up;
            }
            Command::Connect([dev_a, iface_a, dev_b, iface_b]) => {
                self.network
                    .connect(dev_a, iface_a, dev_b, iface_b)
                    .map_err(|e| reject(DiagnosticKind::ConnectionError, e))?;
                writeln!(out, "Connected {}:{} <-> {}:{}", dev_a, iface_a, dev_b, iface_b)?;
            }
            Command::Disconnect([dev_a, iface_a, dev_b, iface_b]) => {
                let removed = self
                    .network
                    .disconnect(dev_a, iface_a, dev_b, iface_b)
                    .map_err(|e| reject(DiagnosticKind::ConnectionError, e))?;
                if removed {
                    writeln!(out, "Disconnected {}:{} <-> {}:{}", dev_a, iface_a, dev_b, iface_b)?;
                } else {
                    writeln!(out, "{}:{} and {}:{} are not connected", dev_a, iface_a, dev_b, iface_b)?;
                }
            }
            Command::ListDevices => self.list_devices(out)?,
            Command::SetDeviceStatus { device, online } => {
                self.network
                    .set_device_status(device, online)
                    .map_err(|e| reject(DiagnosticKind::CommandError, e))?;
                let state = if online { "online" } else { "offline" };
                writeln!(out, "{} is now {}", device, state)?;
            }
            Command::RouteAdd {
                prefix,
                len,
                next_hop,
                metric,
            } => self.route_add(prefix, len, next_hop, metric, out)?,
            Command::RouteDel { prefix, len } => {
                let kind = DiagnosticKind::DeleteError;
                let prefix = parse_ipv4(prefix).map_err(|e| reject(kind, e))?;
                let len = parse_prefix_len(len).map_err(|e| reject(kind, e))?;
                let removed = self
                    .selected_routes(kind)?
                    .delete(prefix, len)
                    .map_err(|e| reject(kind, e))?;
                if removed {
                    writeln!(out, "Route removed: {}/{}", prefix, len)?;
                } else {
                    writeln!(out, "Route {}/{} not found", prefix, len)?;
                }
            }
            Command::ShowRoutes => {
                let routes = self.selected_routes(DiagnosticKind::FindError)?;
                if routes.is_empty() {
                    writeln!(out, "Routing table empty.")?;
                } else {
                    for route in routes.iter() {
                        writeln!(out, "{}", route)?;
                    }
                }
            }
            Command::ShowRouteTree => {
                let routes = self.selected_routes(DiagnosticKind::FindError)?;
                if routes.is_empty() {
                    writeln!(out, "Routing table empty.")?;
                } else {
                    write!(out, "{}", routes.render_tree())?;
                }
            }
            Command::ShowAvlStats => {
                let stats = self.selected_routes(DiagnosticKind::FindError)?.stats();
                writeln!(out, "{}", stats)?;
            }
            Command::PolicySet {
                prefix,
                mask,
                action,
            } => self.policy_set(prefix, mask, action, out)?,
            Command::PolicyUnset { prefix, mask } => {
                let kind = DiagnosticKind::PolicyError;
                let prefix = parse_ipv4(prefix).map_err(|e| reject(kind, e))?;
                let mask = parse_netmask(mask).map_err(|e| reject(kind, e))?;
                let removed = self
                    .selected_policies(kind)?
                    .unset_policy(prefix, mask)
                    .map_err(|e| reject(kind, e))?;
                if removed {
                    writeln!(out, "Policy removed from {}/{}", prefix, mask)?;
                } else {
                    writeln!(out, "No policy found for {}/{}", prefix, mask)?;
                }
            }
            Command::ShowPrefixTree => {
                let entries = self
                    .selected_policies(DiagnosticKind::PolicyError)?
                    .entries();
                if entries.is_empty() {
                    writeln!(out, "Prefix tree empty.")?;
                } else {
                    for entry in entries {
                        writeln!(out, "{}", entry)?;
                    }
                }
            }
            Command::Send {
                source,
                destination,
                message,
                ttl,
            } => self.send(source, destination, &message, ttl, out)?,
            Command::Tick(count) => self.tick(count, out)?,
            Command::ShowStatistics => write!(out, "{}", self.stats)?,
            Command::ShowHistory(name) => {
                let device = self.lookup(name)?;
                if device.history().is_empty() {
                    writeln!(out, "No packets in history.")?;
                }
                for entry in device.history().iter() {
                    let trace = entry.packet.trace_display();
                    let trace = if trace.is_empty() { "-".to_string() } else { trace };
                    writeln!(out, "{} {} via {}", entry.event, entry.packet, trace)?;
                }
            }
            Command::ShowQueue(name) => {
                let device = self.lookup(name)?;
                for iface in device.interfaces() {
                    writeln!(
                        out,
                        "{}: {} queued, {} arriving",
                        iface.name,
                        iface.pending_len(),
                        iface.incoming_len()
                    )?;
                    for packet in iface.pending() {
                        writeln!(out, "    {}", packet)?;
                    }
                }
            }
            Command::ShowInterfaces(name) => {
                let device = self.lookup(name)?;
                if device.interfaces().is_empty() {
                    writeln!(out, "No interfaces.")?;
                }
                for iface in device.interfaces() {
                    let addr = iface
                        .address
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "unassigned".to_string());
                    writeln!(out, "{:<12} {:<16} {}", iface.name, addr, iface.status)?;
                }
            }
            Command::ShowConnections(name) => {
                let connections = self
                    .network
                    .connections(name)
                    .map_err(|e| reject(DiagnosticKind::ConnectionError, e))?;
                if connections.is_empty() {
                    writeln!(out, "No connections.")?;
                }
                for conn in connections {
                    writeln!(
                        out,
                        "{} -> {}:{}",
                        conn.local_interface, conn.peer_device, conn.peer_interface
                    )?;
                }
            }
            Command::ShowErrorLog(limit) => {
                let limit = limit
                    .map(|n| n.parse::<usize>())
                    .transpose()
                    .map_err(|_| usage("show error-log [n]"))?;
                if self.errors.is_empty() {
                    writeln!(out, "No errors logged.")?;
                }
                for entry in self.errors.entries(limit) {
                    writeln!(out, "{}", entry)?;
                }
            }
            Command::SaveRunningConfig(path) => {
                config::save(&Config::from_network(&self.network), path)
                    .map_err(|e| reject(DiagnosticKind::CommandError, e))?;
                writeln!(out, "Saved running-config to {}", path)?;
            }
            Command::LoadConfig(path) => self.load_config(path, out)?,
        }
        Ok(Flow::Continue)
    }

    fn selected_device(&mut self, kind: DiagnosticKind) -> Result<&mut Device, ShellError> {
        let name = self
            .device
            .as_deref()
            .ok_or_else(|| reject(kind, "no device selected, use 'hostname <name>' first"))?;
        self.network.get_mut(name).map_err(|e| reject(kind, e))
    }

    fn selected_interface(&mut self) -> Result<&mut Interface, ShellError> {
        let kind = DiagnosticKind::ConnectionError;
        let iface = self
            .interface
            .clone()
            .ok_or_else(|| reject(kind, "no interface selected, use 'interface <name>' first"))?;
        let device = self.selected_device(kind)?;
        let name = device.name.clone();
        device.interface_mut(&iface).ok_or_else(|| {
            reject(
                kind,
                Error::InterfaceNotFound {
                    device: name,
                    name: iface.clone(),
                },
            )
        })
    }

    fn selected_routes(&mut self, kind: DiagnosticKind) -> Result<&mut RouteTable, ShellError> {
        let device = self.selected_device(kind)?;
        let name = device.name.clone();
        device
            .route_table_mut()
            .ok_or_else(|| reject(kind, Error::NotARouter { name }))
    }

    fn selected_policies(&mut self, kind: DiagnosticKind) -> Result<&mut PolicyTrie, ShellError> {
        let device = self.selected_device(kind)?;
        let name = device.name.clone();
        device
            .policies_mut()
            .ok_or_else(|| reject(kind, Error::NotARouter { name }))
    }

    fn lookup(&self, name: &str) -> Result<&Device, ShellError> {
        self.network
            .get(name)
            .map_err(|e| reject(DiagnosticKind::CommandError, e))
    }

    fn list_devices(&self, out: &mut dyn Write) -> Result<(), ShellError> {
        if self.network.devices().is_empty() {
            writeln!(out, "No devices.")?;
        }
        for device in self.network.devices() {
            let state = if device.online { "online" } else { "offline" };
            writeln!(
                out,
                "{} ({}) {}, {} interfaces",
                device.name,
                device.kind,
                state,
                device.interfaces().len()
            )?;
        }
        Ok(())
    }

    fn route_add(
        &mut self,
        prefix: &str,
        len: &str,
        next_hop: &str,
        metric: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(), ShellError> {
        let kind = DiagnosticKind::InsertError;
        let prefix = parse_ipv4(prefix).map_err(|e| reject(kind, e))?;
        let len = parse_prefix_len(len).map_err(|e| reject(kind, e))?;
        let next_hop = parse_ipv4(next_hop).map_err(|e| reject(kind, e))?;
        let metric = match metric {
            Some(m) => m
                .parse::<u32>()
                .map_err(|_| reject(kind, format!("invalid metric '{}'", m)))?,
            None => 1,
        };

        let created = self
            .selected_routes(kind)?
            .insert(prefix, len, next_hop, metric)
            .map_err(|e| reject(kind, e))?;
        let verb = if created { "added" } else { "updated" };
        writeln!(
            out,
            "Route {}: {}/{} via {} metric {}",
            verb, prefix, len, next_hop, metric
        )?;
        Ok(())
    }

    fn policy_set(
        &mut self,
        prefix: &str,
        mask: &str,
        action: PolicyArg<'_>,
        out: &mut dyn Write,
    ) -> Result<(), ShellError> {
        let kind = DiagnosticKind::PolicyError;
        let prefix = parse_ipv4(prefix).map_err(|e| reject(kind, e))?;
        let mask = parse_netmask(mask).map_err(|e| reject(kind, e))?;
        let policy = match action {
            PolicyArg::Block => Policy::Block,
            PolicyArg::TtlMin(n) => n
                .parse::<u32>()
                .map(Policy::MinTtl)
                .map_err(|_| reject(kind, format!("TTL must be an integer, got '{}'", n)))?,
        };

        self.selected_policies(kind)?
            .set_policy(prefix, mask, policy)
            .map_err(|e| reject(kind, e))?;
        writeln!(out, "Policy {} applied to {}/{}", policy, prefix, mask)?;
        Ok(())
    }

    fn send(
        &mut self,
        source: &str,
        destination: &str,
        message: &str,
        ttl: &str,
        out: &mut dyn Write,
    ) -> Result<(), ShellError> {
        let kind = DiagnosticKind::CommandError;
        let source = parse_ipv4(source).map_err(|e| reject(DiagnosticKind::SyntaxError, e))?;
        let destination =
            parse_ipv4(destination).map_err(|e| reject(DiagnosticKind::SyntaxError, e))?;
        let ttl = ttl
            .parse::<u32>()
            .map_err(|_| reject(DiagnosticKind::SyntaxError, format!("invalid TTL '{}'", ttl)))?;

        let (device, iface) = self
            .network
            .find_interface_by_address(source)
            .map(|(d, i)| (d.name.clone(), i.name.clone()))
            .ok_or_else(|| reject(kind, format!("no interface owns {}", source)))?;

        let id = self
            .network
            .send_packet(&device, &iface, destination, message, ttl)
            .map_err(|e| reject(kind, e))?;
        self.stats.log_sent();
        writeln!(out, "Packet {} queued for delivery.", id)?;
        Ok(())
    }

    /// Replace the network with a topology file. The running network is
    /// kept when the file cannot be loaded.
    fn load_config(&mut self, path: &str, out: &mut dyn Write) -> Result<(), ShellError> {
        let kind = DiagnosticKind::CommandError;
        let cfg = config::load(path).map_err(|e| reject(kind, e))?;
        let validation = config::validate(&cfg);
        if let Some(first) = validation.errors.first() {
            return Err(reject(
                kind,
                format!("{} has {} errors, first: {}", path, validation.errors.len(), first),
            ));
        }

        let mut network =
            Network::from_config(&cfg, &mut self.errors).map_err(|e| reject(kind, e))?;
        let mut scratch = Statistics::new();
        let sent = config::inject_packets(&cfg, &mut network, &mut scratch)
            .map_err(|e| reject(kind, e))?;
        for _ in &sent {
            self.stats.log_sent();
        }
        self.network = network;
        self.device = None;
        self.interface = None;

        writeln!(
            out,
            "Loaded {}: {} devices, {} links, {} packets queued",
            path,
            cfg.devices.len(),
            cfg.links.len(),
            sent.len()
        )?;
        Ok(())
    }

    fn tick(&mut self, count: &str, out: &mut dyn Write) -> Result<(), ShellError> {
        let count = match count.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => return Err(usage("tick [count]")),
        };

        let mut total = TickSummary::default();
        for _ in 0..count {
            let summary = self.network.tick(&mut self.stats, &mut self.errors);
            writeln!(
                out,
                "Tick {}: delivered={} relayed={} absorbed={} dropped_ttl={} dropped_policy={}",
                self.network.ticks(),
                summary.delivered,
                summary.relayed,
                summary.absorbed,
                summary.dropped_ttl,
                summary.dropped_policy
            )?;
            total.merge(summary);
        }
        debug!("Ran {} ticks: {:?}", count, total);
        Ok(())
    }
}
