//! Mime type table
//!
//! Stored right after the header as NUL-terminated strings, closed by an
//! empty string. Directory entries refer to a type by its position; the top
//! three indices are reserved as entry-kind sentinels.

use crate::bytes::read_cstr;
use crate::error::{ArchiveError, Result};
use std::collections::HashMap;

/// Mime index marking a redirect entry
pub const REDIRECT_MIME: u16 = 0xFFFF;
/// Mime index marking a link target entry
pub const LINKTARGET_MIME: u16 = 0xFFFE;
/// Mime index marking a deleted entry
pub const DELETED_MIME: u16 = 0xFFFD;
/// Highest index a real mime type may occupy
pub const MAX_MIME_INDEX: u16 = 0xFFFC;

/// Ordered list of unique mime type strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeTypeTable {
    types: Vec<String>,
    index: HashMap<String, u16>,
}

impl MimeTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a table from the start of `bytes`
    ///
    /// Returns the table and the number of bytes consumed, terminator
    /// included.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut table = MimeTypeTable::new();
        let mut offset = 0;
        loop {
            let (value, next) = read_cstr(bytes, offset)?;
            offset = next;
            if value.is_empty() {
                break;
            }
            if table.types.len() > MAX_MIME_INDEX as usize {
                return Err(ArchiveError::Corrupted(format!(
                    "mime type list has more than {} entries",
                    MAX_MIME_INDEX as usize + 1
                )));
            }
            table.index.entry(value.clone()).or_insert(table.types.len() as u16);
            table.types.push(value);
        }
        Ok((table, offset))
    }

    /// Encoded form, empty-string terminator included
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        for mime in &self.types {
            bytes.extend_from_slice(mime.as_bytes());
            bytes.push(0);
        }
        bytes.push(0);
        bytes
    }

    pub fn encoded_len(&self) -> usize {
        self.types.iter().map(|m| m.len() + 1).sum::<usize>() + 1
    }

    /// Mime type string for a regular index
    pub fn get(&self, index: u16) -> Result<&str> {
        self.types
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| ArchiveError::NotFound(format!("mime type index {}", index)))
    }

    /// Index of `mime`, adding it when new
    pub fn intern(&mut self, mime: &str) -> Result<u16> {
        if let Some(&pos) = self.index.get(mime) {
            return Ok(pos);
        }
        if mime.is_empty() {
            return Err(ArchiveError::InvalidArticle(
                "mime type must not be empty".to_string(),
            ));
        }
        if self.types.len() > MAX_MIME_INDEX as usize {
            return Err(ArchiveError::InvalidArticle(format!(
                "too many mime types (limit {})",
                MAX_MIME_INDEX as usize + 1
            )));
        }
        let pos = self.types.len() as u16;
        self.types.push(mime.to_string());
        self.index.insert(mime.to_string(), pos);
        Ok(pos)
    }

    pub fn position(&self, mime: &str) -> Option<u16> {
        self.index.get(mime).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }
}
