//! Back-end adapter interface for compression models.
//!
//! Every codec the dispatcher can drive implements [`CompressBackend`]. The
//! trait deliberately stays small: whole-buffer transforms only, one level
//! validator, and an optional per-handle state hook for codecs that keep
//! working memory per transport handle. Process-wide preparation (the
//! dynamic-library load of the original design) is the [`LoaderFn`] slot in
//! the model table; unloading is dropping the boxed back-end.

use crate::error::Result;

/// One-time process-wide preparation for a back-end.
///
/// Called lazily, under the registry write lock, the first time any handle
/// needs the model. A failure here is recorded for rate limiting on the
/// decompress path.
pub type LoaderFn = fn() -> Result<Box<dyn CompressBackend>>;

/// Uniform operation set each codec implements.
pub trait CompressBackend: Send + Sync {
    /// Accept or reject a requested compression level.
    fn validate_level(&self, level: i32) -> Result<()>;

    /// Allocate per-handle state.
    ///
    /// Back-ends that keep no state per handle return `Ok(None)`; the
    /// dispatcher still records that the handle charged a reference. Must be
    /// idempotent: a race of two first-users may call it twice for the same
    /// handle.
    fn init_handle(&self) -> Result<Option<Box<dyn HandleState>>> {
        Ok(None)
    }

    /// Whole-buffer compression of `src` at `level`.
    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>>;

    /// Whole-buffer decompression of `src`.
    ///
    /// Output longer than `max_out` is an error: the bound is the maximum
    /// packet size, and a sender-controlled payload must not expand past it.
    fn decompress(&self, src: &[u8], max_out: usize) -> Result<Vec<u8>>;
}

/// Opaque per-handle back-end state, released on drop.
pub trait HandleState: Send {}

/// Per-(handle, model) charge record.
///
/// Replaces the sentinel-pointer bookkeeping of the original design with an
/// explicit state: a handle that charged a reference against a back-end
/// holds either a bare marker or the back-end's own per-handle state.
pub(crate) enum Charge {
    /// No reference charged.
    None,
    /// Reference charged; the back-end keeps no per-handle state.
    Marked,
    /// Reference charged, with back-end-owned state.
    State(#[allow(dead_code)] Box<dyn HandleState>),
}

impl Charge {
    pub(crate) fn is_charged(&self) -> bool {
        !matches!(self, Charge::None)
    }
}
