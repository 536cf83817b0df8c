//! Forwarding statistics.
//!
//! Global counters for the simulation plus the per-device delivery
//! activity used to pick the busiest device.

use crate::dataplane::StatisticsSink;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Resets the counter to zero.
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Simulation-wide packet statistics.
#[derive(Debug, Default)]
pub struct Statistics {
    /// Packets injected into the network.
    pub sent: Counter,
    /// Packets that reached their destination.
    pub delivered: Counter,
    /// Packets dropped because their TTL ran out.
    pub dropped_ttl: Counter,
    /// Packets dropped by a destination policy.
    pub dropped_policy: Counter,
    /// Hop count of every delivered packet, in delivery order.
    hop_counts: Vec<usize>,
    /// Deliveries per device.
    device_activity: BTreeMap<String, u64>,
}

impl Statistics {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a packet injected into the network.
    pub fn log_sent(&mut self) {
        self.sent.inc();
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.get()
    }

    pub fn hop_counts(&self) -> &[usize] {
        &self.hop_counts
    }

    /// Mean hop count of delivered packets, rounded to two decimals.
    ///
    /// Returns 0 when nothing has been delivered.
    pub fn average_hops(&self) -> f64 {
        if self.hop_counts.is_empty() {
            return 0.0;
        }
        let total: usize = self.hop_counts.iter().sum();
        let mean = total as f64 / self.hop_counts.len() as f64;
        (mean * 100.0).round() / 100.0
    }

    /// Device with the most deliveries. Ties go to the smallest name.
    pub fn top_talker(&self) -> Option<(&str, u64)> {
        self.device_activity
            .iter()
            .fold(None, |best: Option<(&str, u64)>, (name, &count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((name.as_str(), count)),
            })
    }

    /// Deliveries recorded for `device`.
    pub fn activity(&self, device: &str) -> u64 {
        self.device_activity.get(device).copied().unwrap_or(0)
    }

    /// Clears every counter and the recorded activity.
    pub fn reset(&mut self) {
        self.sent.reset();
        self.delivered.reset();
        self.dropped_ttl.reset();
        self.dropped_policy.reset();
        self.hop_counts.clear();
        self.device_activity.clear();
    }

    /// Exports all counters as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("packets_sent".into(), self.sent.get()),
            ("packets_delivered".into(), self.delivered.get()),
            ("packets_dropped_ttl".into(), self.dropped_ttl.get()),
            ("packets_dropped_policy".into(), self.dropped_policy.get()),
        ];

        for (name, count) in &self.device_activity {
            result.push((format!("{}_delivered", name), *count));
        }

        result
    }
}

/// Human-readable summary, one counter per line.
impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Packets sent:           {}", self.sent.get())?;
        writeln!(f, "Packets delivered:      {}", self.delivered.get())?;
        writeln!(f, "Dropped (TTL expired):  {}", self.dropped_ttl.get())?;
        writeln!(f, "Dropped (policy):       {}", self.dropped_policy.get())?;
        writeln!(f, "Average hops:           {:.2}", self.average_hops())?;
        match self.top_talker() {
            Some((name, count)) => {
                writeln!(f, "Top talker:             {} ({} delivered)", name, count)
            }
            None => writeln!(f, "Top talker:             none"),
        }
    }
}

impl StatisticsSink for Statistics {
    fn log_delivered(&mut self, hops: usize, device: &str) {
        self.delivered.inc();
        self.hop_counts.push(hops);
        *self.device_activity.entry(device.to_string()).or_insert(0) += 1;
    }

    fn log_dropped_ttl(&mut self) {
        self.dropped_ttl.inc();
    }

    fn log_dropped_policy(&mut self) {
        self.dropped_policy.inc();
    }
}
