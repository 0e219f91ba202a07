//! Compression model identifiers and the static model table.
//!
//! Every model carries a stable one-byte id that travels on the wire in the
//! packet header of compressed payloads. Ids are allocated append-only: once
//! published, an id is never reused or reassigned, even when the codec behind
//! it is compiled out of a build. Compiled-out codecs keep a placeholder row
//! so that peers selecting them get a clean "not built in" error instead of a
//! misdecoded payload.

use serde::{Deserialize, Serialize};

use crate::compress::backend::LoaderFn;
use crate::compress::registry::MAX_COMPRESS_METHODS;

/// Wire-stable compression model identifiers.
///
/// `None` means the payload was not compressed; the transport elides the tag
/// for such packets, so `0` never appears on the wire from this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Model {
    /// No compression (passthrough)
    #[default]
    None = 0,
    /// Deflate stream
    Zlib = 1,
    /// LZ4 block
    Lz4 = 2,
    /// LZ4 high-compression block (decoded by the lz4 decoder)
    Lz4hc = 3,
    /// LZO2 block
    Lzo2 = 4,
    /// LZMA stream
    Lzma = 5,
    /// Bzip2 stream
    Bzip2 = 6,
}

/// Reserved sentinel id, never valid on the wire.
pub const RESERVED_MODEL_ID: u8 = 255;

impl Model {
    /// Wire id of this model.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Model::None => "none",
            Model::Zlib => "zlib",
            Model::Lz4 => "lz4",
            Model::Lz4hc => "lz4hc",
            Model::Lzo2 => "lzo2",
            Model::Lzma => "lzma",
            Model::Bzip2 => "bzip2",
        }
    }

    /// Parse from a configuration string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Model::None),
            "zlib" => Some(Model::Zlib),
            "lz4" => Some(Model::Lz4),
            "lz4hc" => Some(Model::Lz4hc),
            "lzo2" => Some(Model::Lzo2),
            "lzma" => Some(Model::Lzma),
            "bzip2" => Some(Model::Bzip2),
            _ => None,
        }
    }

    /// Resolve a wire id received from a peer.
    ///
    /// Unknown ids and the reserved sentinel resolve to `None`; the caller
    /// decides how loudly to reject them.
    pub fn from_wire(id: u8) -> Option<Self> {
        match id {
            0 => Some(Model::None),
            1 => Some(Model::Zlib),
            2 => Some(Model::Lz4),
            3 => Some(Model::Lz4hc),
            4 => Some(Model::Lzo2),
            5 => Some(Model::Lzma),
            6 => Some(Model::Bzip2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One row of the model table.
///
/// `loader` is the one-time process-wide preparation slot; rows without a
/// loader are placeholders that exist purely to keep wire ids stable.
pub(crate) struct ModelDescriptor {
    pub name: &'static str,
    pub id: u8,
    pub built_in: bool,
    pub loader: Option<LoaderFn>,
}

impl ModelDescriptor {
    pub(crate) const fn placeholder(name: &'static str, id: u8) -> Self {
        Self {
            name,
            id,
            built_in: false,
            loader: None,
        }
    }
}

// The "none" row is never dispatched through a back-end; selecting it
// disables compression for the handle.
const NONE_ROW: ModelDescriptor = ModelDescriptor::placeholder("none", 0);

#[cfg(feature = "zlib")]
const ZLIB_ROW: ModelDescriptor = ModelDescriptor {
    name: "zlib",
    id: 1,
    built_in: true,
    loader: Some(crate::compress::codecs::zlib::load),
};
#[cfg(not(feature = "zlib"))]
const ZLIB_ROW: ModelDescriptor = ModelDescriptor::placeholder("zlib", 1);

#[cfg(feature = "lz4")]
const LZ4_ROW: ModelDescriptor = ModelDescriptor {
    name: "lz4",
    id: 2,
    built_in: true,
    loader: Some(crate::compress::codecs::lz4::load),
};
#[cfg(not(feature = "lz4"))]
const LZ4_ROW: ModelDescriptor = ModelDescriptor::placeholder("lz4", 2);

#[cfg(feature = "lz4")]
const LZ4HC_ROW: ModelDescriptor = ModelDescriptor {
    name: "lz4hc",
    id: 3,
    built_in: true,
    loader: Some(crate::compress::codecs::lz4::load_hc),
};
#[cfg(not(feature = "lz4"))]
const LZ4HC_ROW: ModelDescriptor = ModelDescriptor::placeholder("lz4hc", 3);

// No lzo2 back-end is wired up in this build; the row preserves wire id 4.
const LZO2_ROW: ModelDescriptor = ModelDescriptor::placeholder("lzo2", 4);

#[cfg(feature = "lzma")]
const LZMA_ROW: ModelDescriptor = ModelDescriptor {
    name: "lzma",
    id: 5,
    built_in: true,
    loader: Some(crate::compress::codecs::lzma::load),
};
#[cfg(not(feature = "lzma"))]
const LZMA_ROW: ModelDescriptor = ModelDescriptor::placeholder("lzma", 5);

#[cfg(feature = "bzip2")]
const BZIP2_ROW: ModelDescriptor = ModelDescriptor {
    name: "bzip2",
    id: 6,
    built_in: true,
    loader: Some(crate::compress::codecs::bzip2::load),
};
#[cfg(not(feature = "bzip2"))]
const BZIP2_ROW: ModelDescriptor = ModelDescriptor::placeholder("bzip2", 6);

/// The static model table, ordered by wire id.
///
/// Add new rows at the end with a fresh id; never renumber existing rows or
/// on-wire compatibility with peers will break.
pub(crate) const MODEL_TABLE: [ModelDescriptor; 7] = [
    NONE_ROW, ZLIB_ROW, LZ4_ROW, LZ4HC_ROW, LZO2_ROW, LZMA_ROW, BZIP2_ROW,
];

const _: () = assert!(
    MODEL_TABLE.len() <= MAX_COMPRESS_METHODS,
    "too many compress methods defined"
);

/// Public description of one model table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// Configuration name and log label.
    pub name: &'static str,
    /// Wire id.
    pub id: u8,
    /// Whether this build can actually drive the codec.
    pub built_in: bool,
}

/// Enumerate the models this build knows about, placeholders included.
pub fn list_models() -> Vec<ModelInfo> {
    MODEL_TABLE
        .iter()
        .map(|row| ModelInfo {
            name: row.name,
            id: row.id,
            built_in: row.built_in,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_ids_are_stable() {
        // On-wire values; renumbering any of these is a protocol break.
        assert_eq!(Model::None.id(), 0);
        assert_eq!(Model::Zlib.id(), 1);
        assert_eq!(Model::Lz4.id(), 2);
        assert_eq!(Model::Lz4hc.id(), 3);
        assert_eq!(Model::Lzo2.id(), 4);
        assert_eq!(Model::Lzma.id(), 5);
        assert_eq!(Model::Bzip2.id(), 6);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Model::parse("zlib"), Some(Model::Zlib));
        assert_eq!(Model::parse("LZ4HC"), Some(Model::Lz4hc));
        assert_eq!(Model::parse("none"), Some(Model::None));
        assert_eq!(Model::parse("snappy"), None);
    }

    #[test]
    fn test_from_wire_rejects_unknown_and_sentinel() {
        assert_eq!(Model::from_wire(3), Some(Model::Lz4hc));
        assert_eq!(Model::from_wire(200), None);
        assert_eq!(Model::from_wire(RESERVED_MODEL_ID), None);
    }

    #[test]
    fn test_table_matches_enum() {
        for info in list_models() {
            let model = Model::from_wire(info.id).expect("table row has a wire id");
            assert_eq!(model.name(), info.name);
        }
    }

    #[test]
    fn test_none_row_is_never_built_in() {
        let none = &MODEL_TABLE[0];
        assert!(!none.built_in);
        assert!(none.loader.is_none());
    }
}
