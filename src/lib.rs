//! # Linkmesh - Redundant Multi-Link Cluster Messaging Transport
//!
//! Linkmesh moves messages between cluster nodes over several redundant
//! links at once, with per-link liveness tracking, payload encryption, and
//! pluggable payload compression. This crate ships the compression
//! subsystem in depth: a process-wide dispatcher of compression back-ends
//! with lazy, reference-counted library loading and hardening against
//! hostile wire input.
//!
//! ## Compression overview
//!
//! Each transport handle selects one model by name; payloads above the
//! handle's size threshold are compressed on the send path and the packet
//! carries the producing model's one-byte wire id. On the receive path the
//! id picks the decoder, loading its back-end on demand. Because that id is
//! chosen by the remote peer, receive-path library loads are rate limited
//! after failures so a crafted packet stream cannot grind the process
//! through endless load attempts.
//!
//! | Concern | Behavior |
//! |---------|----------|
//! | Back-end loading | Lazy, on first use by any handle |
//! | Lifetime | Reference counted; unloaded when the last handle tears down |
//! | Concurrency | Transforms run under a shared lock; load/unload serialized |
//! | Hostile input | Unknown/not-built-in ids rejected; load retries throttled |
//! | Missing codecs | Placeholder rows keep wire ids stable across builds |
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use linkmesh::compress::{CompressConfig, CompressEngine};
//!
//! let engine = CompressEngine::new();
//! engine.configure(&CompressConfig {
//!     model: "lz4".into(),
//!     level: 1,
//!     threshold: 0,
//! })?;
//!
//! if payload.len() > engine.threshold() as usize {
//!     let compressed = engine.compress(&payload)?;
//!     // frame `compressed` tagged with engine.model().id()
//! }
//! ```
//!
//! ## Modules
//!
//! - [`compress`]: model table, back-end registry, and the per-handle engine
//! - [`config`]: TOML/environment configuration loading
//! - [`error`]: error types and result alias

pub mod compress;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use compress::{CompressConfig, CompressEngine, CompressStatsSnapshot, Model, ModelInfo};
pub use config::Config;
pub use error::{LinkmeshError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum payload size the transport frames into a single packet.
pub const MAX_PACKET_SIZE: usize = 65536;
