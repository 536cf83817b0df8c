//! Simulation tests over complete topologies
//!
//! Run with: cargo test --test sim

mod forwarding;
mod lab;
mod running_config;
mod shell_scripts;
