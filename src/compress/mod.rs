//! Pluggable payload compression for the transport send and receive paths.
//!
//! Outgoing payloads larger than the handle's threshold are compressed with
//! the model the operator configured; each compressed packet carries the
//! producing model's one-byte wire id so the receiver can pick the matching
//! decoder. Back-ends load lazily on first use and are reference-counted
//! across handles, so a codec library is resident only while some handle
//! actually uses it.
//!
//! # Models
//!
//! | id | name  | meaning |
//! |----|-------|---------|
//! | 0  | none  | identity / not compressed |
//! | 1  | zlib  | deflate stream |
//! | 2  | lz4   | lz4 block |
//! | 3  | lz4hc | lz4 high-compression block (decoded by lz4) |
//! | 4  | lzo2  | lzo2 block |
//! | 5  | lzma  | lzma stream |
//! | 6  | bzip2 | bzip2 stream |
//!
//! Ids are append-only; 255 is a reserved sentinel that never appears on the
//! wire.
//!
//! # Usage
//!
//! ```rust,ignore
//! use linkmesh::compress::{CompressConfig, CompressEngine};
//!
//! let engine = CompressEngine::new();
//! engine.configure(&CompressConfig {
//!     model: "zlib".into(),
//!     level: 6,
//!     threshold: 0, // 0 selects the default
//! })?;
//!
//! let wire = engine.compress(payload)?;
//! let restored = engine.decompress(1, &wire)?;
//! assert_eq!(restored, payload);
//! ```
//!
//! The caller owns the threshold comparison: payloads at or below
//! [`CompressEngine::threshold`] bytes skip [`CompressEngine::compress`]
//! entirely and travel untagged.

mod backend;
mod codecs;
mod model;
pub mod registry;
mod stats;

pub use backend::{CompressBackend, HandleState};
pub use model::{list_models, Model, ModelInfo, RESERVED_MODEL_ID};
pub use registry::{CompressRegistry, MAX_COMPRESS_METHODS};
pub use stats::CompressStatsSnapshot;

use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::compress::backend::Charge;
use crate::compress::stats::CompressStats;
use crate::error::{LinkmeshError, Result};
use crate::MAX_PACKET_SIZE;

/// Default minimum payload size before compression is attempted, used when a
/// threshold of zero is configured.
pub const DEFAULT_COMPRESS_THRESHOLD: u32 = 100;

/// Single-call compression configuration for a transport handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressConfig {
    /// Model name ("none" disables compression).
    #[serde(default = "default_model")]
    pub model: String,

    /// Back-end specific compression level.
    #[serde(default)]
    pub level: i32,

    /// Minimum payload size in bytes before the transport compresses;
    /// zero selects [`DEFAULT_COMPRESS_THRESHOLD`].
    #[serde(default)]
    pub threshold: u32,
}

fn default_model() -> String {
    "none".to_string()
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            level: 0,
            threshold: 0,
        }
    }
}

/// Committed per-handle compression state.
struct ActiveConfig {
    model_id: u8,
    level: i32,
    threshold: u32,
}

/// Per-handle compression dispatcher.
///
/// One engine lives inside each transport handle. Multiple worker threads of
/// the handle call [`compress`](Self::compress) and
/// [`decompress`](Self::decompress) concurrently; reconfiguration can happen
/// at any time from the control path. Dropping the engine releases every
/// back-end reference the handle charged.
pub struct CompressEngine {
    registry: Arc<CompressRegistry>,
    cfg: RwLock<ActiveConfig>,
    charges: Mutex<Vec<Charge>>,
    stats: CompressStats,
}

impl Default for CompressEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressEngine {
    /// Create an engine bound to the process-wide registry.
    pub fn new() -> Self {
        Self::with_registry(registry::shared())
    }

    /// Create an engine over a caller-supplied registry (isolated tests,
    /// embedding).
    pub fn with_registry(registry: Arc<CompressRegistry>) -> Self {
        let mut charges = Vec::new();
        charges.resize_with(registry.slot_count(), || Charge::None);
        Self {
            registry,
            cfg: RwLock::new(ActiveConfig {
                model_id: Model::None.id(),
                level: 0,
                threshold: DEFAULT_COMPRESS_THRESHOLD,
            }),
            charges: Mutex::new(charges),
            stats: CompressStats::default(),
        }
    }

    /// Currently configured model.
    pub fn model(&self) -> Model {
        self.cfg
            .read()
            .ok()
            .and_then(|cfg| Model::from_wire(cfg.model_id))
            .unwrap_or(Model::None)
    }

    /// Currently configured compression level.
    pub fn level(&self) -> i32 {
        self.cfg.read().map(|cfg| cfg.level).unwrap_or(0)
    }

    /// Effective compression threshold in bytes.
    pub fn threshold(&self) -> u32 {
        self.cfg
            .read()
            .map(|cfg| cfg.threshold)
            .unwrap_or(DEFAULT_COMPRESS_THRESHOLD)
    }

    /// Snapshot of this handle's compression counters.
    pub fn stats(&self) -> CompressStatsSnapshot {
        self.stats.snapshot()
    }

    /// Registry this engine charges against.
    pub fn registry(&self) -> &Arc<CompressRegistry> {
        &self.registry
    }

    /// Validate and commit a compression configuration for this handle.
    ///
    /// On success the chosen back-end is loaded, initialized for this
    /// handle, and charged one reference. On any failure the handle's
    /// previous configuration stays in place and no new reference is held.
    pub fn configure(&self, config: &CompressConfig) -> Result<()> {
        tracing::debug!(
            "configuring compress module [{}/{}/{}]",
            config.model,
            config.level,
            config.threshold
        );

        let row = self
            .registry
            .descriptor_by_name(&config.model)
            .ok_or_else(|| {
                tracing::error!("compress model {} not supported", config.model);
                LinkmeshError::InvalidArgument(format!(
                    "compress model {} not supported",
                    config.model
                ))
            })?;

        if row.id == Model::None.id() {
            // Disables compression for the handle; previously charged
            // back-ends stay referenced until teardown.
            let mut cfg = self.cfg.write().map_err(|_| LinkmeshError::Lock)?;
            cfg.model_id = row.id;
            cfg.level = config.level;
            return Ok(());
        }

        if !row.built_in {
            tracing::error!(
                "compress model {} support has not been built in, contact your \
                 vendor or fix the build",
                row.name
            );
            return Err(LinkmeshError::InvalidArgument(format!(
                "compress model {} not built in",
                row.name
            )));
        }

        let outcome = self
            .registry
            .ensure_init(&self.charges, row.id, false)
            .map_err(|err| {
                tracing::error!(
                    "unable to load/init back-end for model {}: {err}",
                    row.name
                );
                err
            })?;

        let validated = self.validate_config(&outcome, row.id, row.name, config);
        let threshold = match validated {
            Ok(threshold) => threshold,
            Err(err) => {
                self.registry.rollback_charge(outcome, &self.charges, row.id);
                return Err(err);
            }
        };

        drop(outcome);

        let mut cfg = self.cfg.write().map_err(|_| LinkmeshError::Lock)?;
        cfg.model_id = row.id;
        cfg.level = config.level;
        cfg.threshold = threshold;
        Ok(())
    }

    fn validate_config(
        &self,
        outcome: &registry::EnsureOutcome<'_>,
        model_id: u8,
        model_name: &'static str,
        config: &CompressConfig,
    ) -> Result<u32> {
        outcome
            .guard
            .backend(model_id)
            .validate_level(config.level)
            .map_err(|err| {
                tracing::error!(
                    "compress level {} not supported for model {model_name}: {err}",
                    config.level
                );
                err
            })?;

        if config.threshold > MAX_PACKET_SIZE as u32 {
            tracing::error!(
                "compress threshold cannot be higher than {MAX_PACKET_SIZE}"
            );
            return Err(LinkmeshError::InvalidArgument(format!(
                "compress threshold {} exceeds maximum packet size",
                config.threshold
            )));
        }

        if config.threshold == 0 {
            tracing::debug!(
                "resetting compression threshold to default ({DEFAULT_COMPRESS_THRESHOLD})"
            );
            Ok(DEFAULT_COMPRESS_THRESHOLD)
        } else {
            Ok(config.threshold)
        }
    }

    /// Compress a payload with the configured model (send path).
    ///
    /// The caller compares the payload length against
    /// [`threshold`](Self::threshold) first and skips this call for small
    /// payloads; the dispatcher itself does not enforce the threshold.
    pub fn compress(&self, src: &[u8]) -> Result<Vec<u8>> {
        let (model_id, level) = {
            let cfg = self.cfg.read().map_err(|_| LinkmeshError::Lock)?;
            (cfg.model_id, cfg.level)
        };
        if model_id == Model::None.id() {
            return Err(LinkmeshError::InvalidArgument(
                "no compression model configured".into(),
            ));
        }

        let model_name = self
            .registry
            .descriptor_by_id(model_id)
            .map(|row| row.name)
            .unwrap_or("unknown");
        let outcome = self
            .registry
            .ensure_init(&self.charges, model_id, false)
            .map_err(|err| {
                tracing::error!(
                    "unable to load/init back-end (compress) for model {model_name}: {err}"
                );
                err
            })?;

        let result = outcome.guard.backend(model_id).compress(src, level);
        drop(outcome);

        let out = result?;
        self.stats.record_compress(src.len(), out.len());
        Ok(out)
    }

    /// Decompress a received payload tagged with `model_id` (receive path).
    ///
    /// The id is sender-controlled, so load attempts through this path are
    /// rate limited after failures.
    pub fn decompress(&self, model_id: u8, src: &[u8]) -> Result<Vec<u8>> {
        if model_id > self.registry.max_model() {
            tracing::error!("received packet with unknown compress model {model_id}");
            return Err(LinkmeshError::InvalidArgument(format!(
                "unknown compress model {model_id}"
            )));
        }

        let row = self.registry.descriptor_by_id(model_id);
        let row = match row {
            Some(row) if row.built_in => row,
            Some(row) => {
                tracing::error!(
                    "received packet compressed with {} but support is not built in \
                     this version, contact your vendor or fix the build",
                    row.name
                );
                return Err(LinkmeshError::InvalidArgument(format!(
                    "compress model {} not built in",
                    row.name
                )));
            }
            None => {
                tracing::error!("received packet with unknown compress model {model_id}");
                return Err(LinkmeshError::InvalidArgument(format!(
                    "unknown compress model {model_id}"
                )));
            }
        };

        let outcome = self
            .registry
            .ensure_init(&self.charges, model_id, true)
            .map_err(|err| {
                tracing::error!(
                    "unable to load/init back-end (decompress) for model {}: {err}",
                    row.name
                );
                err
            })?;

        let result = outcome
            .guard
            .backend(model_id)
            .decompress(src, MAX_PACKET_SIZE);
        drop(outcome);

        let out = result?;
        self.stats.record_decompress(src.len(), out.len());
        Ok(out)
    }
}

impl Drop for CompressEngine {
    fn drop(&mut self) {
        self.registry.release_charges(&self.charges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::model::ModelDescriptor;

    struct EchoBackend;

    impl CompressBackend for EchoBackend {
        fn validate_level(&self, level: i32) -> Result<()> {
            if (1..=5).contains(&level) {
                Ok(())
            } else {
                Err(LinkmeshError::InvalidArgument(format!(
                    "echo level {level} out of range (1-5)"
                )))
            }
        }

        fn compress(&self, src: &[u8], _level: i32) -> Result<Vec<u8>> {
            Ok(src.to_vec())
        }

        fn decompress(&self, src: &[u8], _max_out: usize) -> Result<Vec<u8>> {
            Ok(src.to_vec())
        }
    }

    fn load_echo() -> Result<Box<dyn CompressBackend>> {
        Ok(Box::new(EchoBackend))
    }

    static ENGINE_TABLE: [ModelDescriptor; 3] = [
        ModelDescriptor::placeholder("none", 0),
        ModelDescriptor {
            name: "echo",
            id: 1,
            built_in: true,
            loader: Some(load_echo),
        },
        ModelDescriptor::placeholder("missing", 2),
    ];

    fn engine() -> CompressEngine {
        let registry = CompressRegistry::with_table(&ENGINE_TABLE).unwrap();
        CompressEngine::with_registry(Arc::new(registry))
    }

    fn cfg(model: &str, level: i32, threshold: u32) -> CompressConfig {
        CompressConfig {
            model: model.to_string(),
            level,
            threshold,
        }
    }

    #[test]
    fn test_configure_commits_state() {
        let engine = engine();
        engine.configure(&cfg("echo", 3, 2048)).unwrap();
        assert_eq!(engine.level(), 3);
        assert_eq!(engine.threshold(), 2048);
        assert_eq!(engine.registry().libref_of(1), 1);
    }

    #[test]
    fn test_configure_zero_threshold_selects_default() {
        let engine = engine();
        engine.configure(&cfg("echo", 1, 0)).unwrap();
        assert_eq!(engine.threshold(), DEFAULT_COMPRESS_THRESHOLD);
    }

    #[test]
    fn test_configure_unknown_model() {
        let engine = engine();
        let err = engine.configure(&cfg("zstd", 1, 0)).unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
    }

    #[test]
    fn test_configure_non_built_in_leaves_state_unchanged() {
        let engine = engine();
        engine.configure(&cfg("echo", 2, 512)).unwrap();

        let err = engine.configure(&cfg("missing", 1, 0)).unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
        assert_eq!(engine.level(), 2);
        assert_eq!(engine.threshold(), 512);
        assert_eq!(engine.registry().libref_of(2), 0);
    }

    #[test]
    fn test_configure_bad_level_charges_nothing() {
        let engine = engine();
        let err = engine.configure(&cfg("echo", 99, 0)).unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
        assert_eq!(engine.registry().libref_of(1), 0);
    }

    #[test]
    fn test_configure_threshold_above_packet_size() {
        let engine = engine();
        let err = engine
            .configure(&cfg("echo", 1, MAX_PACKET_SIZE as u32 + 1))
            .unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
        assert_eq!(engine.registry().libref_of(1), 0);
    }

    #[test]
    fn test_reconfigure_same_model_keeps_single_charge() {
        let engine = engine();
        engine.configure(&cfg("echo", 1, 0)).unwrap();
        engine.configure(&cfg("echo", 5, 4096)).unwrap();
        assert_eq!(engine.registry().libref_of(1), 1);
        assert_eq!(engine.level(), 5);

        // A rejected reconfiguration must not drop the existing charge.
        let _ = engine.configure(&cfg("echo", 99, 0)).unwrap_err();
        assert_eq!(engine.registry().libref_of(1), 1);
        assert_eq!(engine.level(), 5);
    }

    #[test]
    fn test_configure_none_disables_compression() {
        let engine = engine();
        engine.configure(&cfg("echo", 1, 0)).unwrap();
        engine.configure(&cfg("none", 0, 0)).unwrap();
        assert_eq!(engine.model(), Model::None);
        let err = engine.compress(b"payload").unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
        // The old charge is only released at teardown.
        assert_eq!(engine.registry().libref_of(1), 1);
    }

    #[test]
    fn test_compress_without_configuration_is_rejected() {
        let engine = engine();
        let err = engine.compress(b"payload").unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
    }

    #[test]
    fn test_decompress_unknown_id_changes_nothing() {
        let engine = engine();
        let err = engine.decompress(200, b"junk").unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
        assert_eq!(engine.registry().libref_of(1), 0);
        assert_eq!(engine.stats().rx_packets, 0);
    }

    #[test]
    fn test_decompress_non_built_in_id() {
        let engine = engine();
        let err = engine.decompress(2, b"junk").unwrap_err();
        assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
    }

    #[test]
    fn test_decompress_charges_lazily() {
        let engine = engine();
        assert_eq!(engine.registry().libref_of(1), 0);
        let out = engine.decompress(1, b"tagged payload").unwrap();
        assert_eq!(out, b"tagged payload");
        assert_eq!(engine.registry().libref_of(1), 1);
        assert_eq!(engine.stats().rx_packets, 1);
    }

    #[test]
    fn test_drop_releases_charges() {
        let registry = Arc::new(CompressRegistry::with_table(&ENGINE_TABLE).unwrap());
        let engine = CompressEngine::with_registry(Arc::clone(&registry));
        engine.configure(&cfg("echo", 1, 0)).unwrap();
        assert_eq!(registry.libref_of(1), 1);

        drop(engine);
        assert_eq!(registry.libref_of(1), 0);
        assert!(!registry.loaded_of(1));
    }

    #[test]
    fn test_stats_accumulate_across_transforms() {
        let engine = engine();
        engine.configure(&cfg("echo", 1, 0)).unwrap();
        engine.compress(b"0123456789").unwrap();
        engine.compress(b"0123456789").unwrap();
        let snap = engine.stats();
        assert_eq!(snap.tx_packets, 2);
        assert_eq!(snap.tx_in_bytes, 20);
    }
}
