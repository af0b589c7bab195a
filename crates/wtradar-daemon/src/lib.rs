//! wtradar-daemon: runs one reconciler per telemetry feed, hands snapshots
//! to the presentation layer, and wires configuration and the telemetry
//! stream into the process.

pub mod config;
pub mod identity;
pub mod presenter;
pub mod source;
pub mod supervisor;

pub use wtradar_core::types;
