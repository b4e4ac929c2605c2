//! Tunables for reading and writing archives
//!
//! Every struct deserializes with per-field defaults, so a TOML file only
//! needs the keys it changes:
//!
//! ```toml
//! entry_cache_size = 1024
//! cluster_cache_size = 32
//! ```

use crate::compression::CompressionMethod;
use crate::error::{ArchiveError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load a configuration struct from TOML
pub trait FromToml: DeserializeOwned {
    fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ArchiveError::Config(e.to_string()))
    }

    fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

/// Read-side cache sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Decoded directory entries kept in memory
    pub entry_cache_size: usize,
    /// Decompressed clusters kept in memory
    pub cluster_cache_size: usize,
    /// Segment files kept open at once
    pub open_file_limit: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            entry_cache_size: 512,
            cluster_cache_size: 16,
            open_file_limit: 5,
        }
    }
}

impl FromToml for ArchiveConfig {}

/// Write-side settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// A cluster is closed once adding the next blob would exceed this size
    pub min_chunk_size: usize,
    /// Method for clusters holding compressible content
    pub compression: CompressionMethod,
    /// Zstd level
    pub compression_level: i32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            min_chunk_size: 1024 * 1024,
            compression: CompressionMethod::Zstd,
            compression_level: 3,
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_chunk_size == 0 {
            return Err(ArchiveError::Config(
                "min_chunk_size must be positive".to_string(),
            ));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(ArchiveError::Config(format!(
                "compression_level {} outside 1..=22",
                self.compression_level
            )));
        }
        Ok(())
    }
}

impl FromToml for WriterConfig {}
