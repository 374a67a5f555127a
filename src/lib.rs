//! netgauge - sustained network throughput measurement
//!
//! This library measures how fast a TCP path really is by streaming
//! fixed-size buffers in one direction for as long as the connection lives.
//! Buffer memory is recycled through a bounded pool so the hot loop never
//! allocates, and live windowed statistics are reported once a second.
//!
//! # Features
//!
//! - Upload and download measurement against a long-running server
//! - Zero-allocation transfer loop over a recycled block pool
//! - Windowed throughput reports off the critical path
//! - Asynchronous I/O using tokio

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod pool;
pub mod reporter;
pub mod server;
pub mod stats;

pub use client::Client;
pub use config::{Config, Role};
pub use error::{Error, Result};
pub use pool::BlockPool;
pub use server::Server;
pub use stats::TransferStats;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
