//! Bzip2 stream back-end, wire id 6.

use std::io::{Read, Write};

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::compress::backend::CompressBackend;
use crate::error::{LinkmeshError, Result};

pub(crate) fn load() -> Result<Box<dyn CompressBackend>> {
    Ok(Box::new(Bzip2Backend))
}

struct Bzip2Backend;

impl CompressBackend for Bzip2Backend {
    fn validate_level(&self, level: i32) -> Result<()> {
        if !(1..=9).contains(&level) {
            return Err(LinkmeshError::InvalidArgument(format!(
                "bzip2 level {level} out of range (1-9)"
            )));
        }
        Ok(())
    }

    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::new(level as u32));
        encoder
            .write_all(src)
            .map_err(|e| LinkmeshError::Codec(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| LinkmeshError::Codec(e.to_string()))
    }

    fn decompress(&self, src: &[u8], max_out: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut decoder = BzDecoder::new(src).take(max_out as u64 + 1);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| LinkmeshError::Codec(e.to_string()))?;
        if out.len() > max_out {
            return Err(LinkmeshError::Codec(
                "decompressed payload exceeds maximum packet size".into(),
            ));
        }
        Ok(out)
    }
}
