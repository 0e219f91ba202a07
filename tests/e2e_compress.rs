//! End-to-end compression dispatch tests.
//!
//! These exercise the public engine API against the real codec back-ends.
//! Every test runs over an isolated registry so that load-state and
//! reference-count observations do not interfere across tests.

use std::sync::Arc;

use linkmesh::compress::{
    list_models, CompressConfig, CompressEngine, CompressRegistry, Model,
    DEFAULT_COMPRESS_THRESHOLD,
};
use linkmesh::{LinkmeshError, MAX_PACKET_SIZE};

fn isolated_engine() -> CompressEngine {
    CompressEngine::with_registry(Arc::new(CompressRegistry::new()))
}

fn config(model: &str, level: i32, threshold: u32) -> CompressConfig {
    CompressConfig {
        model: model.to_string(),
        level,
        threshold,
    }
}

/// A level each built-in model accepts.
fn working_level(name: &str) -> i32 {
    match name {
        "lz4" => 1,
        "lz4hc" => 9,
        _ => 6,
    }
}

#[test]
fn test_zlib_compresses_zero_page_and_recovers() {
    let engine = isolated_engine();
    engine.configure(&config("zlib", 6, 0)).unwrap();
    assert_eq!(engine.threshold(), DEFAULT_COMPRESS_THRESHOLD);

    let payload = vec![0u8; 4096];
    let compressed = engine.compress(&payload).unwrap();
    assert!(compressed.len() < payload.len());

    let restored = engine.decompress(Model::Zlib.id(), &compressed).unwrap();
    assert_eq!(restored, payload);
}

#[test]
fn test_lz4hc_payload_decodes_with_lz4_id() {
    let engine = isolated_engine();
    engine.configure(&config("lz4hc", 9, 1024)).unwrap();

    // 512 bytes is under the configured threshold; the threshold belongs to
    // the caller, so the dispatcher still compresses when asked.
    let payload: Vec<u8> = b"multi-link transport payload "
        .iter()
        .cycle()
        .take(512)
        .copied()
        .collect();
    let compressed = engine.compress(&payload).unwrap();

    // lz4 (id 2) shares the decoder with lz4hc (id 3).
    let restored = engine.decompress(Model::Lz4.id(), &compressed).unwrap();
    assert_eq!(restored, payload);
}

#[test]
fn test_every_built_in_model_round_trips() {
    let payloads: Vec<Vec<u8>> = vec![
        b"x".to_vec(),
        b"short cluster heartbeat payload".to_vec(),
        vec![0u8; 4096],
        (0..=255u8).cycle().take(16384).collect(),
    ];

    for info in list_models() {
        if !info.built_in {
            continue;
        }
        let engine = isolated_engine();
        engine
            .configure(&config(info.name, working_level(info.name), 0))
            .unwrap();

        for payload in &payloads {
            let compressed = engine.compress(payload).unwrap();
            let restored = engine.decompress(info.id, &compressed).unwrap();
            assert_eq!(&restored, payload, "round trip failed for {}", info.name);
        }
    }
}

#[test]
fn test_compress_with_none_configured_is_rejected() {
    // The transport elides the tag for uncompressed payloads; this layer
    // never produces a wire tag of 0.
    let engine = isolated_engine();
    let err = engine.compress(b"payload").unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));

    engine.configure(&config("none", 0, 0)).unwrap();
    let err = engine.compress(b"payload").unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
}

#[test]
fn test_decompress_unknown_model_id() {
    let engine = isolated_engine();
    let err = engine.decompress(200, b"crafted").unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));

    // Nothing was loaded or charged by the rejected packet.
    for info in list_models() {
        if let Some(model) = Model::from_wire(info.id) {
            assert_eq!(engine.registry().libref(model), 0);
            assert!(!engine.registry().is_loaded(model));
        }
    }
}

#[test]
fn test_decompress_not_built_in_model_id() {
    // lzo2 (id 4) is registered but carries no back-end in this build.
    let engine = isolated_engine();
    let err = engine.decompress(Model::Lzo2.id(), b"crafted").unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
}

#[test]
fn test_configure_not_built_in_model_leaves_state() {
    let engine = isolated_engine();
    engine.configure(&config("zlib", 6, 512)).unwrap();

    let err = engine.configure(&config("lzo2", 1, 0)).unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
    assert_eq!(engine.model(), Model::Zlib);
    assert_eq!(engine.threshold(), 512);
}

#[test]
fn test_configure_unknown_model_name() {
    let engine = isolated_engine();
    let err = engine.configure(&config("zstd", 3, 0)).unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
}

#[test]
fn test_threshold_above_packet_size_is_rejected() {
    let engine = isolated_engine();
    let err = engine
        .configure(&config("zlib", 6, MAX_PACKET_SIZE as u32 + 1))
        .unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
    assert_eq!(engine.model(), Model::None);
}

#[test]
fn test_bzip2_invalid_level_charges_nothing() {
    let engine = isolated_engine();
    let err = engine.configure(&config("bzip2", 0, 0)).unwrap_err();
    assert!(matches!(err, LinkmeshError::InvalidArgument(_)));
    assert_eq!(engine.registry().libref(Model::Bzip2), 0);
    assert_eq!(engine.model(), Model::None);
}

#[test]
fn test_model_list_is_wire_stable() {
    let models = list_models();
    let ids: Vec<u8> = models.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);

    let lzo2 = models.iter().find(|m| m.name == "lzo2").unwrap();
    assert!(!lzo2.built_in);
}

#[test]
fn test_stats_track_both_directions() {
    let engine = isolated_engine();
    engine.configure(&config("zlib", 6, 0)).unwrap();

    let payload = vec![7u8; 2048];
    let compressed = engine.compress(&payload).unwrap();
    engine.decompress(Model::Zlib.id(), &compressed).unwrap();

    let snap = engine.stats();
    assert_eq!(snap.tx_packets, 1);
    assert_eq!(snap.tx_in_bytes, 2048);
    assert_eq!(snap.rx_packets, 1);
    assert_eq!(snap.rx_out_bytes, 2048);
    assert!(snap.tx_ratio().unwrap() < 1.0);
}
