//! LZMA (xz stream) back-end, wire id 5.

use std::io::{Read, Write};

use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::compress::backend::CompressBackend;
use crate::error::{LinkmeshError, Result};

pub(crate) fn load() -> Result<Box<dyn CompressBackend>> {
    Ok(Box::new(LzmaBackend))
}

struct LzmaBackend;

impl CompressBackend for LzmaBackend {
    fn validate_level(&self, level: i32) -> Result<()> {
        if !(0..=9).contains(&level) {
            return Err(LinkmeshError::InvalidArgument(format!(
                "lzma preset {level} out of range (0-9)"
            )));
        }
        Ok(())
    }

    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>> {
        let mut encoder = XzEncoder::new(Vec::new(), level as u32);
        encoder
            .write_all(src)
            .map_err(|e| LinkmeshError::Codec(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| LinkmeshError::Codec(e.to_string()))
    }

    fn decompress(&self, src: &[u8], max_out: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut decoder = XzDecoder::new(src).take(max_out as u64 + 1);
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
