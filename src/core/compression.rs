//! Cluster compression
//!
//! Clusters are compressed as a whole. The low nibble of the cluster info byte
//! names the method:
//! - `0`, `1`: stored uncompressed
//! - `2`, `3`, `4`: zlib, bzip2, lzma (recognized, not supported)
//! - `5`: Zstd (slower, better ratio)
//! - `6`: LZ4 (fast, moderate ratio)

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};

/// Compression method for clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// No compression
    None,
    /// LZ4 compression (fast, moderate ratio)
    Lz4,
    /// Zstd compression (slower, better ratio)
    #[default]
    Zstd,
}

impl CompressionMethod {
    /// Decode the low nibble of a cluster info byte
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag & 0x0F {
            0 | 1 => Ok(CompressionMethod::None),
            5 => Ok(CompressionMethod::Zstd),
            6 => Ok(CompressionMethod::Lz4),
            other => Err(ArchiveError::UnsupportedCompression(other)),
        }
    }

    /// Tag written into the cluster info byte
    pub fn tag(self) -> u8 {
        match self {
            CompressionMethod::None => 1,
            CompressionMethod::Zstd => 5,
            CompressionMethod::Lz4 => 6,
        }
    }

    pub fn is_compressed(self) -> bool {
        !matches!(self, CompressionMethod::None)
    }
}

/// Compress data using the specified method
///
/// `level` only applies to Zstd.
pub fn compress(data: &[u8], method: CompressionMethod, level: i32) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionMethod::Zstd => zstd::bulk::compress(data, level)
            .map_err(|e| ArchiveError::Compression(format!("Zstd compression failed: {}", e))),
    }
}

/// Decompress a cluster payload
///
/// A payload that does not decode is reported as corruption.
pub fn decompress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| ArchiveError::Corrupted(format!("LZ4 decompression failed: {}", e))),
        CompressionMethod::Zstd => zstd::stream::decode_all(data)
            .map_err(|e| ArchiveError::Corrupted(format!("Zstd decompression failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_tag_conversion() {
        assert_eq!(CompressionMethod::from_tag(0).unwrap(), CompressionMethod::None);
        assert_eq!(CompressionMethod::from_tag(1).unwrap(), CompressionMethod::None);
        assert_eq!(CompressionMethod::from_tag(5).unwrap(), CompressionMethod::Zstd);
        assert_eq!(CompressionMethod::from_tag(6).unwrap(), CompressionMethod::Lz4);
        // Extended-offset flag lives in the high nibble
        assert_eq!(CompressionMethod::from_tag(0x15).unwrap(), CompressionMethod::Zstd);

        for tag in [2u8, 3, 4, 7] {
            assert!(matches!(
                CompressionMethod::from_tag(tag),
                Err(ArchiveError::UnsupportedCompression(t)) if t == tag
            ));
        }
    }

    #[test]
    fn test_tag_roundtrip() {
        for method in [CompressionMethod::None, CompressionMethod::Lz4, CompressionMethod::Zstd] {
            assert_eq!(CompressionMethod::from_tag(method.tag()).unwrap(), method);
        }
    }

    #[test]
    fn test_lz4_compression() {
        let data = b"Hello, World! ".repeat(100);
        let compressed = compress(&data, CompressionMethod::Lz4, 0).unwrap();
        let decompressed = decompress(&compressed, CompressionMethod::Lz4).unwrap();

        assert_eq!(data.as_slice(), decompressed.as_slice());
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn test_zstd_compression() {
        let data = b"Zstandard compression test data! ".repeat(100);
        let compressed = compress(&data, CompressionMethod::Zstd, 3).unwrap();
        let decompressed = decompress(&compressed, CompressionMethod::Zstd).unwrap();

        assert_eq!(data.as_slice(), decompressed.as_slice());
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn test_no_compression() {
        let data = b"Test data";
        let compressed = compress(data, CompressionMethod::None, 0).unwrap();
        let decompressed = decompress(&compressed, CompressionMethod::None).unwrap();

        assert_eq!(data, compressed.as_slice());
        assert_eq!(data, decompressed.as_slice());
    }

    #[test]
    fn test_garbage_is_corruption() {
        let garbage = [0xAAu8; 64];
        assert!(matches!(
            decompress(&garbage, CompressionMethod::Zstd),
            Err(ArchiveError::Corrupted(_))
        ));
        // 16 byte size prefix, then a literal run that overruns the input
        let truncated_lz4 = [16u8, 0, 0, 0, 0xF0];
        assert!(matches!(
            decompress(&truncated_lz4, CompressionMethod::Lz4),
            Err(ArchiveError::Corrupted(_))
        ));
    }
}
