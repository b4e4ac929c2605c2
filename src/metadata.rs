//! Archive metadata (`M` namespace) and the `Counter` record

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conventional metadata keys
pub const TITLE: &str = "Title";
pub const DESCRIPTION: &str = "Description";
/// Older archives store the description here
pub const SUBTITLE: &str = "Subtitle";
pub const LANGUAGE: &str = "Language";
pub const DATE: &str = "Date";
pub const CREATOR: &str = "Creator";
pub const PUBLISHER: &str = "Publisher";
pub const COUNTER: &str = "Counter";

/// Mime types counted as media by [`MimeCounter::media_count`]
pub const MEDIA_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/gif", "image/png"];

/// Parsed `Counter` value: `mime=count;mime=count;...`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeCounter {
    counts: BTreeMap<String, u32>,
}

impl MimeCounter {
    /// Parse a counter record
    ///
    /// Items without a mime type or with a non-numeric count are skipped.
    pub fn parse(value: &str) -> Self {
        let mut counts = BTreeMap::new();
        for item in value.split(';') {
            let mut parts = item.splitn(2, '=');
            let mime = parts.next().unwrap_or("").trim();
            let count = parts.next().unwrap_or("").trim();
            if mime.is_empty() || count.is_empty() {
                continue;
            }
            if let Ok(count) = count.parse::<u32>() {
                counts.insert(mime.to_string(), count);
            }
        }
        MimeCounter { counts }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn get(&self, mime_type: &str) -> Option<u32> {
        self.counts.get(mime_type).copied()
    }

    /// Number of `text/html` documents, 0 when not listed
    pub fn article_count(&self) -> u32 {
        self.get("text/html").unwrap_or(0)
    }

    /// Sum of the common image types
    pub fn media_count(&self) -> u32 {
        MEDIA_MIME_TYPES
            .iter()
            .filter_map(|mime| self.get(mime))
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(mime, count)| (mime.as_str(), *count))
    }
}

/// Snapshot of an archive's descriptive metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub date: String,
    pub creator: String,
    pub publisher: String,
    pub article_count: u32,
    pub media_count: u32,
    pub global_count: u32,
    /// Size in bytes across all segments
    pub file_size: u64,
    pub has_checksum: bool,
    pub main_page: Option<String>,
}

impl ArchiveMetadata {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counter() {
        let counter = MimeCounter::parse("text/html=120;image/png=30;image/jpeg=12;text/css=2");
        assert_eq!(counter.article_count(), 120);
        assert_eq!(counter.media_count(), 42);
        assert_eq!(counter.get("text/css"), Some(2));
        assert_eq!(counter.get("image/gif"), None);
    }

    #[test]
    fn test_parse_counter_skips_bad_items() {
        let counter = MimeCounter::parse("=3;text/html=;image/png=x;;image/gif=4");
        assert_eq!(counter.iter().collect::<Vec<_>>(), vec![("image/gif", 4)]);
        assert_eq!(counter.article_count(), 0);
        assert!(MimeCounter::parse("").is_empty());
    }

    #[test]
    fn test_metadata_json() {
        let metadata = ArchiveMetadata {
            title: "Fruit".to_string(),
            article_count: 3,
            ..ArchiveMetadata::default()
        };
        let json = metadata.to_json().unwrap();
        let back: ArchiveMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }
}
