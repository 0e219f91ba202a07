//! LZ4 block back-ends, wire ids 2 (fast) and 3 (high compression).
//!
//! Both rows share one block decoder: an lz4hc encoding is a valid lz4
//! block, so packets tagged with either id decode through the same path.

use lz4::block::{compress as block_compress, decompress as block_decompress, CompressionMode};

use crate::compress::backend::CompressBackend;
use crate::error::{LinkmeshError, Result};

/// LZ4 "level" is an acceleration factor; 1 is the reference speed.
const MAX_ACCELERATION: i32 = 65537;

/// Highest level the HC encoder accepts.
const MAX_HC_LEVEL: i32 = 12;

pub(crate) fn load() -> Result<Box<dyn CompressBackend>> {
    Ok(Box::new(Lz4Backend))
}

pub(crate) fn load_hc() -> Result<Box<dyn CompressBackend>> {
    Ok(Box::new(Lz4hcBackend))
}

fn decompress_block(src: &[u8], max_out: usize) -> Result<Vec<u8>> {
    // The bound doubles as the decompression-bomb guard: a block that
    // expands past it fails instead of allocating more.
    block_decompress(src, Some(max_out as i32)).map_err(|e| LinkmeshError::Codec(e.to_string()))
}

struct Lz4Backend;

impl CompressBackend for Lz4Backend {
    fn validate_level(&self, level: i32) -> Result<()> {
        if !(1..=MAX_ACCELERATION).contains(&level) {
            return Err(LinkmeshError::InvalidArgument(format!(
                "lz4 acceleration {level} out of range (1-{MAX_ACCELERATION})"
            )));
        }
        Ok(())
    }

    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>> {
        block_compress(src, Some(CompressionMode::FAST(level)), false)
            .map_err(|e| LinkmeshError::Codec(e.to_string()))
    }

    fn decompress(&self, src: &[u8], max_out: usize) -> Result<Vec<u8>> {
        decompress_block(src, max_out)
    }
}

struct Lz4hcBackend;

impl CompressBackend for Lz4hcBackend {
    fn validate_level(&self, level: i32) -> Result<()> {
        if !(1..=MAX_HC_LEVEL).contains(&level) {
            return Err(LinkmeshError::InvalidArgument(format!(
                "lz4hc level {level} out of range (1-{MAX_HC_LEVEL})"
            )));
        }
        Ok(())
    }

    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>> {
        block_compress(src, Some(CompressionMode::HIGHCOMPRESSION(level)), false)
            .map_err(|e| LinkmeshError::Codec(e.to_string()))
    }

    fn decompress(&self, src: &[u8], max_out: usize) -> Result<Vec<u8>> {
        decompress_block(src, max_out)
    }
}
