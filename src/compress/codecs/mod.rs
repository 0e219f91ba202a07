//! Built-in codec back-ends.
//!
//! One module per codec crate. Each is compiled only when its feature is
//! enabled; the model table swaps the row to a placeholder otherwise.

#[cfg(feature = "bzip2")]
pub(crate) mod bzip2;
#[cfg(feature = "lz4")]
pub(crate) mod lz4;
#[cfg(feature = "lzma")]
pub(crate) mod lzma;
#[cfg(feature = "zlib")]
pub(crate) mod zlib;
