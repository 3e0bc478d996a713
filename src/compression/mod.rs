//! Zstd compression backend for large dictionary blobs.
//!
//! Small blobs are stored raw; only dictionary blobs above the store's size
//! threshold pass through this codec. The algorithm identity is fixed and the
//! transform is deterministic, so readers need no codec negotiation.

use crate::error::{GindexError, Result};

/// Compression level (1-22 for zstd)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(pub i32);

impl CompressionLevel {
    /// Fast compression (level 1)
    pub const FAST: Self = Self(1);
    /// Default compression (level 3)
    pub const DEFAULT: Self = Self(3);
    /// Better compression (level 9)
    pub const BETTER: Self = Self(9);
    /// Best compression (level 19)
    pub const BEST: Self = Self(19);
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Compress data using Zstd
pub fn compress(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    zstd::encode_all(data, level.0)
        .map_err(|e| GindexError::storage(format!("zstd compression failed: {e}")))
}

/// Decompress data using Zstd
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data)
        .map_err(|e| GindexError::storage(format!("zstd decompression failed: {e}")))
}
