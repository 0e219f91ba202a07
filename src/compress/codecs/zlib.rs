//! Zlib (deflate stream) back-end, wire id 1.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::compress::backend::CompressBackend;
use crate::error::{LinkmeshError, Result};

pub(crate) fn load() -> Result<Box<dyn CompressBackend>> {
    Ok(Box::new(ZlibBackend))
}

struct ZlibBackend;

impl CompressBackend for ZlibBackend {
    fn validate_level(&self, level: i32) -> Result<()> {
        if !(0..=9).contains(&level) {
            return Err(LinkmeshError::InvalidArgument(format!(
                "zlib level {level} out of range (0-9)"
            )));
        }
        if level == 0 {
            tracing::warn!("zlib level 0 stores payloads uncompressed");
        }
        Ok(())
    }

    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level as u32));
        encoder
            .write_all(src)
            .map_err(|e| LinkmeshError::Codec(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| LinkmeshError::Codec(e.to_string()))
    }

    fn decompress(&self, src: &[u8], max_out: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut decoder = ZlibDecoder::new(src).take(max_out as u64 + 1);
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

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"linkmesh zlib round trip data for testing";

    #[test]
    fn test_round_trip() {
        let backend = ZlibBackend;
        let compressed = backend.compress(SAMPLE, 6).expect("zlib compress");
        let restored = backend
            .decompress(&compressed, 65536)
            .expect("zlib decompress");
        assert_eq!(restored, SAMPLE);
    }

    #[test]
    fn test_compressible_payload_shrinks() {
        let backend = ZlibBackend;
        let zeros = vec![0u8; 4096];
        let compressed = backend.compress(&zeros, 6).unwrap();
        assert!(compressed.len() < zeros.len());
    }

    #[test]
    fn test_level_bounds() {
        let backend = ZlibBackend;
        assert!(backend.validate_level(0).is_ok());
        assert!(backend.validate_level(9).is_ok());
        assert!(backend.validate_level(-1).is_err());
        assert!(backend.validate_level(10).is_err());
    }

    #[test]
    fn test_output_bound_is_enforced() {
        let backend = ZlibBackend;
        let zeros = vec![0u8; 4096];
        let compressed = backend.compress(&zeros, 6).unwrap();
        let err = backend.decompress(&compressed, 1024).unwrap_err();
        assert!(matches!(err, LinkmeshError::Codec(_)));
    }
}
