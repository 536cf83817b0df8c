//! Simulation test helpers

use lansim::config::{self, Config};
use lansim::dataplane::{Network, TickSummary};
use lansim::protocol::PacketId;
use lansim::telemetry::{ErrorLog, Statistics};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique scratch file names
static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Network plus the sinks a tick writes to
pub struct Lab {
    pub network: Network,
    pub stats: Statistics,
    pub errors: ErrorLog,
}

impl Lab {
    /// Build from topology TOML; panics on invalid topologies
    pub fn from_toml(text: &str) -> Self {
        let cfg: Config = config::parse(text).expect("Failed to parse topology");
        let validation = config::validate(&cfg);
        assert!(
            !validation.has_errors(),
            "Topology has errors: {:?}",
            validation.errors
        );

        let mut errors = ErrorLog::new();
        let network = Network::from_config(&cfg, &mut errors).expect("Failed to build network");
        Self {
            network,
            stats: Statistics::new(),
            errors,
        }
    }

    pub fn send(&mut self, device: &str, iface: &str, dst: Ipv4Addr, ttl: u32) -> PacketId {
        let id = self
            .network
            .send_packet(device, iface, dst, "test", ttl)
            .expect("Failed to send packet");
        self.stats.log_sent();
        id
    }

    pub fn tick(&mut self) -> TickSummary {
        self.network.tick(&mut self.stats, &mut self.errors)
    }

    /// Run `n` ticks and return the combined summary
    pub fn run(&mut self, n: usize) -> TickSummary {
        let mut total = TickSummary::default();
        for _ in 0..n {
            total.merge(self.tick());
        }
        total
    }

    pub fn queued(&self, device: &str, iface: &str) -> usize {
        self.network
            .get(device)
            .ok()
            .and_then(|d| d.interface(iface))
            .map(|i| i.pending_len())
            .unwrap_or(0)
    }
}

/// Unique path in the system temp directory (PID + counter based)
pub fn scratch_file(stem: &str) -> PathBuf {
    let count = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("lansim-{}-{}-{}.toml", stem, std::process::id(), count))
}

pub fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}
