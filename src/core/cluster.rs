//! Clusters and blobs
//!
//! A cluster groups the content of several entries so they compress together.
//!
//! ```text
//! info byte     low nibble: compression, bit 0x10: 64-bit offsets
//! payload       compressed as a whole unless the method is none
//!   offsets     N+1 offsets (u32 or u64) relative to the payload start
//!   blob data   blob i = payload[offset[i]..offset[i+1]]
//! ```
//!
//! Decoded clusters are shared through `Arc` so a `Blob` stays valid after the
//! cluster has left the cache.

use crate::bytes::{read_u32, read_u64};
use crate::compression::{compress, decompress, CompressionMethod};
use crate::error::{ArchiveError, Result};
use std::ops::{Deref, Range};
use std::sync::Arc;

/// Info byte flag for 64-bit offsets
pub const EXTENDED_FLAG: u8 = 0x10;

/// Decompressed cluster
#[derive(Debug)]
pub struct Cluster {
    compression: CompressionMethod,
    extended: bool,
    offsets: Vec<u64>,
    payload: Vec<u8>,
}

impl Cluster {
    /// Decode a cluster from its stored bytes (info byte included)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let info = *bytes.first().ok_or_else(|| ArchiveError::eof("cluster info"))?;
        let compression = CompressionMethod::from_tag(info)?;
        let extended = info & EXTENDED_FLAG != 0;

        let payload = decompress(&bytes[1..], compression)?;
        let offsets = parse_offsets(&payload, extended)?;

        Ok(Cluster {
            compression,
            extended,
            offsets,
            payload,
        })
    }

    /// Number of blobs
    pub fn count(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Decompressed payload size, offset table included
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    fn range(&self, index: u32) -> Result<Range<usize>> {
        let i = index as usize;
        if i + 1 >= self.offsets.len() {
            return Err(ArchiveError::NotFound(format!(
                "blob {} (cluster holds {})",
                index,
                self.count()
            )));
        }
        Ok(self.offsets[i] as usize..self.offsets[i + 1] as usize)
    }

    pub fn blob_size(&self, index: u32) -> Result<u64> {
        let range = self.range(index)?;
        Ok((range.end - range.start) as u64)
    }

    /// Borrow blob `index` without copying
    pub fn blob(self: &Arc<Self>, index: u32) -> Result<Blob> {
        let range = self.range(index)?;
        Ok(Blob {
            cluster: Arc::clone(self),
            range,
        })
    }
}

fn parse_offsets(payload: &[u8], extended: bool) -> Result<Vec<u64>> {
    let width = if extended { 8 } else { 4 };
    let read = |at: usize| -> Result<u64> {
        if extended {
            read_u64(payload, at)
        } else {
            read_u32(payload, at).map(u64::from)
        }
    };

    let first = read(0).map_err(|_| ArchiveError::Corrupted("cluster offset table".into()))?;
    if first < width as u64 || first % width as u64 != 0 || first > payload.len() as u64 {
        return Err(ArchiveError::Corrupted(format!(
            "invalid first blob offset {}",
            first
        )));
    }

    let count = first as usize / width;
    let mut offsets = Vec::with_capacity(count);
    offsets.push(first);
    for i in 1..count {
        let offset = read(i * width)?;
        let previous = offsets[i - 1];
        if offset < previous || offset > payload.len() as u64 {
            return Err(ArchiveError::Corrupted(format!(
                "blob offset {} out of order or beyond payload ({} bytes)",
                offset,
                payload.len()
            )));
        }
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Shared slice of a decompressed cluster
#[derive(Debug, Clone)]
pub struct Blob {
    cluster: Arc<Cluster>,
    range: Range<usize>,
}

impl Blob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.cluster.payload[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.end - self.range.start
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Copy the blob out of its cluster
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Accumulates blobs and encodes them as one cluster
#[derive(Debug)]
pub struct ClusterBuilder {
    compression: CompressionMethod,
    level: i32,
    blobs: Vec<Vec<u8>>,
    data_size: usize,
}

impl ClusterBuilder {
    pub fn new(compression: CompressionMethod, level: i32) -> Self {
        ClusterBuilder {
            compression,
            level,
            blobs: Vec::new(),
            data_size: 0,
        }
    }

    /// Append a blob, returning its index inside the cluster
    pub fn add_blob(&mut self, data: Vec<u8>) -> u32 {
        self.data_size += data.len();
        self.blobs.push(data);
        (self.blobs.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Blob bytes added so far, offset table excluded
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    pub fn set_compression(&mut self, compression: CompressionMethod) {
        self.compression = compression;
    }

    /// Encode info byte and payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let narrow_table = 4 * (self.blobs.len() + 1);
        let extended = (narrow_table + self.data_size) as u64 > u32::MAX as u64;
        let width = if extended { 8 } else { 4 };

        let table_len = width * (self.blobs.len() + 1);
        let mut payload = Vec::with_capacity(table_len + self.data_size);

        let mut offset = table_len as u64;
        let push_offset = |payload: &mut Vec<u8>, offset: u64| {
            if extended {
                payload.extend_from_slice(&offset.to_le_bytes());
            } else {
                payload.extend_from_slice(&(offset as u32).to_le_bytes());
            }
        };
        push_offset(&mut payload, offset);
        for blob in &self.blobs {
            offset += blob.len() as u64;
            push_offset(&mut payload, offset);
        }
        for blob in &self.blobs {
            payload.extend_from_slice(blob);
        }

        let mut info = self.compression.tag();
        if extended {
            info |= EXTENDED_FLAG;
        }

        let body = compress(&payload, self.compression, self.level)?;
        let mut bytes = Vec::with_capacity(1 + body.len());
        bytes.push(info);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(method: CompressionMethod, blobs: &[&[u8]]) -> Vec<u8> {
        let mut builder = ClusterBuilder::new(method, 3);
        for blob in blobs {
            builder.add_blob(blob.to_vec());
        }
        builder.encode().unwrap()
    }

    #[test]
    fn test_uncompressed_cluster() {
        let bytes = build(CompressionMethod::None, &[b"hello", b"", b"world!"]);
        assert_eq!(bytes[0], 1);
        // 4 offsets then data
        assert_eq!(&bytes[1..5], &16u32.to_le_bytes());

        let cluster = Arc::new(Cluster::decode(&bytes).unwrap());
        assert_eq!(cluster.count(), 3);
        assert_eq!(cluster.blob_size(0).unwrap(), 5);
        assert_eq!(cluster.blob_size(1).unwrap(), 0);
        assert_eq!(&*cluster.blob(0).unwrap(), b"hello");
        assert!(cluster.blob(1).unwrap().is_empty());
        assert_eq!(cluster.blob(2).unwrap().to_vec(), b"world!".to_vec());
        assert!(cluster.blob(3).is_err());
    }

    #[test]
    fn test_compressed_clusters() {
        let text = b"<html><body>repetitive text body</body></html>".repeat(50);
        for method in [CompressionMethod::Zstd, CompressionMethod::Lz4] {
            let bytes = build(method, &[text.as_slice(), b"tail"]);
            assert!(bytes.len() < text.len());

            let cluster = Arc::new(Cluster::decode(&bytes).unwrap());
            assert_eq!(cluster.compression(), method);
            assert!(!cluster.is_extended());
            assert_eq!(cluster.blob(0).unwrap().as_bytes(), text.as_slice());
            assert_eq!(&*cluster.blob(1).unwrap(), b"tail");
        }
    }

    #[test]
    fn test_extended_offsets_decode() {
        // Hand-built extended cluster with two blobs
        let mut payload = Vec::new();
        payload.extend_from_slice(&24u64.to_le_bytes());
        payload.extend_from_slice(&26u64.to_le_bytes());
        payload.extend_from_slice(&29u64.to_le_bytes());
        payload.extend_from_slice(b"abxyz");

        let mut bytes = vec![1 | EXTENDED_FLAG];
        bytes.extend_from_slice(&payload);

        let cluster = Arc::new(Cluster::decode(&bytes).unwrap());
        assert!(cluster.is_extended());
        assert_eq!(cluster.count(), 2);
        assert_eq!(&*cluster.blob(1).unwrap(), b"xyz");
    }

    #[test]
    fn test_blob_outlives_cluster_handle() {
        let bytes = build(CompressionMethod::None, &[b"kept"]);
        let blob = {
            let cluster = Arc::new(Cluster::decode(&bytes).unwrap());
            cluster.blob(0).unwrap()
        };
        assert_eq!(&*blob, b"kept");
    }

    #[test]
    fn test_unsupported_compression() {
        let mut bytes = build(CompressionMethod::None, &[b"x"]);
        bytes[0] = 4;
        assert!(matches!(
            Cluster::decode(&bytes),
            Err(ArchiveError::UnsupportedCompression(4))
        ));
    }

    #[test]
    fn test_corrupt_offsets() {
        let mut bytes = build(CompressionMethod::None, &[b"abc", b"def"]);
        // Second offset beyond the payload
        bytes[5..9].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            Cluster::decode(&bytes),
            Err(ArchiveError::Corrupted(_))
        ));

        let mut bytes = build(CompressionMethod::None, &[b"abc"]);
        bytes[1..5].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            Cluster::decode(&bytes),
            Err(ArchiveError::Corrupted(_))
        ));
    }

    #[test]
    fn test_garbage_compressed_payload() {
        let bytes = vec![5u8, 0xde, 0xad, 0xbe, 0xef];
        assert!(matches!(
            Cluster::decode(&bytes),
            Err(ArchiveError::Corrupted(_))
        ));
    }
}
