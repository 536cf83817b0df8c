//! lansim - LAN simulator
//!
//! Simulates router-style packet forwarding over a discrete tick clock.
//! Routers keep an AVL route table and a prefix trie of destination
//! policies; packets move one hop per tick with TTL accounting.

pub mod cli;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};
