//! Cumulative compression counters for a transport handle.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters updated on every successful transform.
#[derive(Debug, Default)]
pub(crate) struct CompressStats {
    tx_packets: AtomicU64,
    tx_in_bytes: AtomicU64,
    tx_out_bytes: AtomicU64,
    rx_packets: AtomicU64,
    rx_in_bytes: AtomicU64,
    rx_out_bytes: AtomicU64,
}

impl CompressStats {
    pub(crate) fn record_compress(&self, original: usize, compressed: usize) {
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
        self.tx_in_bytes
            .fetch_add(original as u64, Ordering::Relaxed);
        self.tx_out_bytes
            .fetch_add(compressed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_decompress(&self, compressed: usize, restored: usize) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_in_bytes
            .fetch_add(compressed as u64, Ordering::Relaxed);
        self.rx_out_bytes
            .fetch_add(restored as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CompressStatsSnapshot {
        CompressStatsSnapshot {
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_in_bytes: self.tx_in_bytes.load(Ordering::Relaxed),
            tx_out_bytes: self.tx_out_bytes.load(Ordering::Relaxed),
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_in_bytes: self.rx_in_bytes.load(Ordering::Relaxed),
            rx_out_bytes: self.rx_out_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of a handle's compression counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressStatsSnapshot {
    /// Payloads compressed on the send path.
    pub tx_packets: u64,
    /// Bytes handed to the send-path compressor.
    pub tx_in_bytes: u64,
    /// Bytes produced by the send-path compressor.
    pub tx_out_bytes: u64,
    /// Payloads decompressed on the receive path.
    pub rx_packets: u64,
    /// Compressed bytes handed to the receive-path decompressor.
    pub rx_in_bytes: u64,
    /// Bytes recovered by the receive-path decompressor.
    pub rx_out_bytes: u64,
}

impl CompressStatsSnapshot {
    /// Overall send-path compression ratio (`out / in`).
    ///
    /// Returns `None` before any payload was compressed.
    pub fn tx_ratio(&self) -> Option<f64> {
        if self.tx_in_bytes > 0 {
            Some(self.tx_out_bytes as f64 / self.tx_in_bytes as f64)
        } else {
            None
        }
    }

    /// Total bytes the send path saved.
    pub fn tx_bytes_saved(&self) -> u64 {
        self.tx_in_bytes.saturating_sub(self.tx_out_bytes)
    }
}
