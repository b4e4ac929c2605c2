//! Read access to an archive file
//!
//! `Archive` resolves entries through the header's pointer tables:
//! - URL pointer table: entry index -> dirent offset (URL order)
//! - Title index: title rank -> entry index
//! - Cluster pointer table: cluster index -> cluster offset
//!
//! Decoded entries and decompressed clusters are cached. Methods that may fill
//! a cache take `&mut self`; share a handle across threads behind a lock or
//! open one handle per thread.

use crate::cache::{AdaptiveCache, CacheStats};
use crate::cluster::{Blob, Cluster};
use crate::config::ArchiveConfig;
use crate::dirent::DirectoryEntry;
use crate::error::{ArchiveError, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::mimetypes::MimeTypeTable;
use crate::stream::SegmentedStream;
use md5::{Digest, Md5};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// First read window for a directory entry; doubled on short reads
const DIRENT_WINDOW: usize = 512;

/// Chunk size for checksum computation
const CHECKSUM_CHUNK: usize = 64 * 1024;

/// Cache statistics for one archive handle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchiveCacheStats {
    pub entries: CacheStats,
    pub clusters: CacheStats,
    pub files: CacheStats,
}

/// Open archive handle
pub struct Archive {
    stream: SegmentedStream,
    header: Header,
    mime_types: MimeTypeTable,
    entries: AdaptiveCache<u32, DirectoryEntry>,
    /// Keyed by cluster byte offset
    clusters: AdaptiveCache<u64, Arc<Cluster>>,
    namespaces: HashMap<char, Range<u32>>,
}

fn compare_key(namespace: char, text: &str, other_ns: char, other_text: &str) -> Ordering {
    (namespace as u32)
        .cmp(&(other_ns as u32))
        .then_with(|| text.as_bytes().cmp(other_text.as_bytes()))
}

impl Archive {
    /// Open an archive with default cache sizes
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, &ArchiveConfig::default())
    }

    /// Open an archive, validating its header and loading the mime table
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &ArchiveConfig) -> Result<Self> {
        let mut stream = SegmentedStream::open_with_limit(path.as_ref(), config.open_file_limit)?;
        let size = stream.size();

        if size < HEADER_SIZE as u64 {
            return Err(ArchiveError::InvalidFormat(format!(
                "file too small for a header ({} bytes)",
                size
            )));
        }

        let header = Header::from_bytes(&stream.read_vec(0, HEADER_SIZE)?)?;
        check_table_bounds(&header, size)?;

        let mime_len = (header.url_ptr_pos - header.mime_list_pos) as usize;
        let mime_bytes = stream.read_vec(header.mime_list_pos, mime_len)?;
        let (mime_types, _) = MimeTypeTable::decode(&mime_bytes).map_err(|e| {
            if e.is_unexpected_eof() {
                ArchiveError::Corrupted("mime type list is not terminated".to_string())
            } else {
                e
            }
        })?;

        info!(
            "Opened archive {} ({} entries, {} clusters, {} segment(s))",
            path.as_ref().display(),
            header.article_count,
            header.cluster_count,
            stream.segment_count()
        );

        Ok(Archive {
            stream,
            header,
            mime_types,
            entries: AdaptiveCache::new(config.entry_cache_size),
            clusters: AdaptiveCache::new(config.cluster_cache_size),
            namespaces: HashMap::new(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> &Path {
        self.stream.path()
    }

    /// Total size over all segments
    pub fn size(&self) -> u64 {
        self.stream.size()
    }

    /// Number of files the archive is split over
    pub fn segment_count(&self) -> usize {
        self.stream.segment_count()
    }

    pub fn mtime(&self) -> SystemTime {
        self.stream.mtime()
    }

    pub fn uuid(&self) -> [u8; 16] {
        self.header.uuid
    }

    pub fn article_count(&self) -> u32 {
        self.header.article_count
    }

    pub fn cluster_count(&self) -> u32 {
        self.header.cluster_count
    }

    pub fn mime_types(&self) -> &MimeTypeTable {
        &self.mime_types
    }

    pub fn mime_type(&self, index: u16) -> Result<&str> {
        self.mime_types.get(index)
    }

    /// Mime type of a content entry
    pub fn dirent_mime_type(&self, dirent: &DirectoryEntry) -> Result<&str> {
        if !dirent.has_content() {
            return Err(ArchiveError::NotFound(format!(
                "mime type of {} (no content)",
                dirent.long_url()
            )));
        }
        self.mime_types.get(dirent.mime_type)
    }

    fn read_u32_at(&mut self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.stream.read_at(&mut buf, offset)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_at(&mut self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.stream.read_at(&mut buf, offset)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Directory entry by URL-order index
    pub fn get_dirent(&mut self, index: u32) -> Result<DirectoryEntry> {
        if index >= self.header.article_count {
            return Err(ArchiveError::NotFound(format!(
                "entry {} (archive has {})",
                index, self.header.article_count
            )));
        }

        if let Some(dirent) = self.entries.get(&index) {
            return Ok(dirent.clone());
        }

        let offset = self.read_u64_at(self.header.url_ptr_pos + 8 * index as u64)?;
        let dirent = self.read_dirent_at(offset)?;
        debug!("Loaded entry {} ({})", index, dirent.long_url());

        self.entries.put(index, dirent.clone());
        Ok(dirent)
    }

    fn read_dirent_at(&mut self, offset: u64) -> Result<DirectoryEntry> {
        let remaining = self.stream.size().saturating_sub(offset) as usize;
        let mut window = DIRENT_WINDOW;
        loop {
            let bytes = self.stream.read_up_to(offset, window)?;
            match DirectoryEntry::decode(&bytes) {
                Ok(dirent) => return Ok(dirent),
                Err(e) if e.is_unexpected_eof() && bytes.len() < remaining => {
                    window *= 2;
                }
                Err(e) if e.is_unexpected_eof() => {
                    return Err(ArchiveError::Corrupted(format!(
                        "directory entry at {} runs past end of archive",
                        offset
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Entry index stored at `rank` in the title index
    pub fn title_index(&mut self, rank: u32) -> Result<u32> {
        if rank >= self.header.article_count {
            return Err(ArchiveError::NotFound(format!("title rank {}", rank)));
        }
        let index = self.read_u32_at(self.header.title_idx_pos + 4 * rank as u64)?;
        if index >= self.header.article_count {
            return Err(ArchiveError::Corrupted(format!(
                "title rank {} points at entry {}",
                rank, index
            )));
        }
        Ok(index)
    }

    pub fn get_dirent_by_title_rank(&mut self, rank: u32) -> Result<DirectoryEntry> {
        let index = self.title_index(rank)?;
        self.get_dirent(index)
    }

    /// Byte offset of cluster `index`
    pub fn cluster_offset(&mut self, index: u32) -> Result<u64> {
        if index >= self.header.cluster_count {
            return Err(ArchiveError::NotFound(format!(
                "cluster {} (archive has {})",
                index, self.header.cluster_count
            )));
        }
        self.read_u64_at(self.header.cluster_ptr_pos + 8 * index as u64)
    }

    fn cluster_end(&mut self, index: u32) -> Result<u64> {
        if index + 1 < self.header.cluster_count {
            self.cluster_offset(index + 1)
        } else {
            Ok(self
                .header
                .checksum_pos()
                .unwrap_or_else(|| self.stream.size()))
        }
    }

    /// Decompressed cluster, shared with the cache
    pub fn get_cluster(&mut self, index: u32) -> Result<Arc<Cluster>> {
        let offset = self.cluster_offset(index)?;
        if let Some(cluster) = self.clusters.get(&offset) {
            return Ok(Arc::clone(cluster));
        }

        let end = self.cluster_end(index)?;
        if end <= offset || end > self.stream.size() {
            return Err(ArchiveError::Corrupted(format!(
                "cluster {} spans {}..{}",
                index, offset, end
            )));
        }

        let bytes = self.stream.read_vec(offset, (end - offset) as usize)?;
        let cluster = Arc::new(Cluster::decode(&bytes)?);
        debug!(
            "Decoded cluster {} ({} blobs, {:?})",
            index,
            cluster.count(),
            cluster.compression()
        );

        self.clusters.put(offset, Arc::clone(&cluster));
        Ok(cluster)
    }

    pub fn get_blob(&mut self, cluster: u32, blob: u32) -> Result<Blob> {
        self.get_cluster(cluster)?.blob(blob)
    }

    /// Content of an entry, `None` for redirects and other non-content kinds
    pub fn dirent_content(&mut self, dirent: &DirectoryEntry) -> Result<Option<Blob>> {
        match dirent.content_location() {
            Some((cluster, blob)) => self.get_blob(cluster, blob).map(Some),
            None => Ok(None),
        }
    }

    fn namespace_begin(&mut self, namespace: u32) -> Result<u32> {
        let mut low = 0;
        let mut high = self.header.article_count;
        while low < high {
            let mid = low + (high - low) / 2;
            if (self.get_dirent(mid)?.namespace as u32) < namespace {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low)
    }

    /// URL-order index range holding namespace `ns`
    pub fn namespace_range(&mut self, ns: char) -> Result<Range<u32>> {
        if let Some(range) = self.namespaces.get(&ns) {
            return Ok(range.clone());
        }
        let begin = self.namespace_begin(ns as u32)?;
        let end = self.namespace_begin(ns as u32 + 1)?;
        debug!("Namespace '{}' spans {}..{}", ns, begin, end);
        self.namespaces.insert(ns, begin..end);
        Ok(begin..end)
    }

    pub fn namespace_count(&mut self, ns: char) -> Result<u32> {
        let range = self.namespace_range(ns)?;
        Ok(range.end - range.start)
    }

    pub fn has_namespace(&mut self, ns: char) -> Result<bool> {
        Ok(self.namespace_count(ns)? > 0)
    }

    /// Every namespace present, in URL order
    pub fn namespaces(&mut self) -> Result<String> {
        let mut found = String::new();
        let mut index = 0;
        while index < self.header.article_count {
            let ns = self.get_dirent(index)?.namespace;
            found.push(ns);
            index = self.namespace_range(ns)?.end;
        }
        Ok(found)
    }

    /// First URL-order index whose `(namespace, url)` is not less than the key
    pub fn lower_bound_by_url(&mut self, ns: char, url: &str) -> Result<u32> {
        let mut low = 0;
        let mut high = self.header.article_count;
        while low < high {
            let mid = low + (high - low) / 2;
            let dirent = self.get_dirent(mid)?;
            if compare_key(dirent.namespace, &dirent.url, ns, url) == Ordering::Less {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low)
    }

    /// Entry index for an exact `(namespace, url)`
    pub fn find_by_url(&mut self, ns: char, url: &str) -> Result<Option<u32>> {
        let index = self.lower_bound_by_url(ns, url)?;
        if index < self.header.article_count {
            let dirent = self.get_dirent(index)?;
            if dirent.namespace == ns && dirent.url == url {
                return Ok(Some(index));
            }
        }
        debug!("No entry for {}/{}", ns, url);
        Ok(None)
    }

    /// Look up `"A/some/url"` (a leading slash is ignored)
    pub fn find_by_long_url(&mut self, long_url: &str) -> Result<Option<u32>> {
        let trimmed = long_url.strip_prefix('/').unwrap_or(long_url);
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(ns), Some('/')) => self.find_by_url(ns, chars.as_str()),
            _ => Ok(None),
        }
    }

    /// First title rank whose `(namespace, title)` is not less than the key
    pub fn lower_bound_by_title(&mut self, ns: char, title: &str) -> Result<u32> {
        let mut low = 0;
        let mut high = self.header.article_count;
        while low < high {
            let mid = low + (high - low) / 2;
            let dirent = self.get_dirent_by_title_rank(mid)?;
            if compare_key(dirent.namespace, &dirent.title, ns, title) == Ordering::Less {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low)
    }

    /// Title rank for an exact `(namespace, title)`
    pub fn find_by_title(&mut self, ns: char, title: &str) -> Result<Option<u32>> {
        let rank = self.lower_bound_by_title(ns, title)?;
        if rank < self.header.article_count {
            let dirent = self.get_dirent_by_title_rank(rank)?;
            if dirent.namespace == ns && dirent.title == title {
                return Ok(Some(rank));
            }
        }
        Ok(None)
    }

    /// Follow redirects from `index`, allowing at most `max_hops` of them
    ///
    /// Returns `None` when the chain is longer (or loops).
    pub fn resolve_redirects(
        &mut self,
        index: u32,
        max_hops: usize,
    ) -> Result<Option<(u32, DirectoryEntry)>> {
        let mut current = index;
        for _ in 0..=max_hops {
            let dirent = self.get_dirent(current)?;
            match dirent.redirect_index() {
                Some(target) => current = target,
                None => return Ok(Some((current, dirent))),
            }
        }
        debug!(
            "Redirect chain from entry {} exceeds {} hops",
            index, max_hops
        );
        Ok(None)
    }

    pub fn has_checksum(&self) -> bool {
        self.header.has_checksum()
    }

    /// Stored MD5 digest
    pub fn checksum(&mut self) -> Result<Option<[u8; 16]>> {
        match self.header.checksum_pos() {
            Some(pos) => {
                let mut digest = [0u8; 16];
                self.stream.read_at(&mut digest, pos)?;
                Ok(Some(digest))
            }
            None => Ok(None),
        }
    }

    /// MD5 over every byte before the checksum position
    pub fn compute_checksum(&mut self) -> Result<Option<[u8; 16]>> {
        let end = match self.header.checksum_pos() {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; CHECKSUM_CHUNK];
        let mut offset = 0u64;
        while offset < end {
            let n = (end - offset).min(CHECKSUM_CHUNK as u64) as usize;
            self.stream.read_at(&mut buf[..n], offset)?;
            hasher.update(&buf[..n]);
            offset += n as u64;
        }

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&hasher.finalize());
        Ok(Some(digest))
    }

    /// Compare the stored and computed digests
    pub fn check_integrity(&mut self) -> Result<()> {
        let stored = self
            .checksum()?
            .ok_or_else(|| ArchiveError::NotFound("archive has no checksum".to_string()))?;
        let computed = self.compute_checksum()?.unwrap_or_default();
        if stored != computed {
            warn!("Checksum mismatch for {}", self.path().display());
            return Err(ArchiveError::Corrupted("checksum mismatch".to_string()));
        }
        Ok(())
    }

    /// True only when a checksum exists and matches
    pub fn verify(&mut self) -> bool {
        self.check_integrity().is_ok()
    }

    /// Entries in URL order
    pub fn entries(&mut self) -> Entries<'_> {
        let end = self.header.article_count;
        Entries {
            archive: self,
            next: 0,
            end,
            by_title: false,
        }
    }

    /// Entries in title order
    pub fn entries_by_title(&mut self) -> Entries<'_> {
        let end = self.header.article_count;
        Entries {
            archive: self,
            next: 0,
            end,
            by_title: true,
        }
    }

    pub fn cache_stats(&self) -> ArchiveCacheStats {
        ArchiveCacheStats {
            entries: self.entries.stats(),
            clusters: self.clusters.stats(),
            files: self.stream.handle_stats(),
        }
    }

    /// Release the handle and its caches
    pub fn close(self) {
        debug!("Closing archive {}", self.path().display());
    }
}

fn check_table_bounds(header: &Header, size: u64) -> Result<()> {
    let tables = [
        ("url pointer table", header.url_ptr_pos, 8 * header.article_count as u64),
        ("title index", header.title_idx_pos, 4 * header.article_count as u64),
        ("cluster pointer table", header.cluster_ptr_pos, 8 * header.cluster_count as u64),
    ];
    for (name, pos, len) in tables {
        if pos.saturating_add(len) > size {
            return Err(ArchiveError::Corrupted(format!(
                "{} ({} bytes at {}) exceeds archive size {}",
                name, len, pos, size
            )));
        }
    }
    if let Some(pos) = header.checksum_pos() {
        if pos.saturating_add(16) > size {
            return Err(ArchiveError::Corrupted(format!(
                "checksum at {} exceeds archive size {}",
                pos, size
            )));
        }
    }
    Ok(())
}

/// Iterator over directory entries in URL or title order
pub struct Entries<'a> {
    archive: &'a mut Archive,
    next: u32,
    end: u32,
    by_title: bool,
}

impl Iterator for Entries<'_> {
    type Item = Result<DirectoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let position = self.next;
        self.next += 1;
        Some(if self.by_title {
            self.archive.get_dirent_by_title_rank(position)
        } else {
            self.archive.get_dirent(position)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionMethod;
    use crate::config::WriterConfig;
    use crate::writer::{ArchiveWriter, MemorySource};
    use tempfile::TempDir;

    fn sample(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("sample.zim");
        let mut source = MemorySource::new();
        source.add_html('A', "Apple", "Apple", "<p>apple</p>");
        source.add_html('A', "Banana", "Banana", "<p>banana</p>");
        source.add_redirect('A', "Banane", "Banane", "A/Banana");
        source.add_content('I', "logo.png", "", "image/png", vec![0x89, b'P', b'N', b'G']);
        source.add_content('M', "Title", "", "text/plain", b"Fruit".to_vec());
        source.set_main_page("A/Apple");

        let config = WriterConfig {
            compression: CompressionMethod::Lz4,
            ..WriterConfig::default()
        };
        ArchiveWriter::new(config).create(&path, &mut source).unwrap();
        path
    }

    #[test]
    fn test_open_and_lookup() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        assert_eq!(archive.article_count(), 5);
        assert!(archive.has_checksum());

        let index = archive.find_by_url('A', "Banana").unwrap().unwrap();
        let dirent = archive.get_dirent(index).unwrap();
        assert_eq!(dirent.title, "Banana");
        let blob = archive.dirent_content(&dirent).unwrap().unwrap();
        assert_eq!(&*blob, b"<p>banana</p>");
        assert_eq!(archive.dirent_mime_type(&dirent).unwrap(), "text/html");

        assert!(archive.find_by_url('A', "Cherry").unwrap().is_none());
        assert_eq!(archive.find_by_long_url("/I/logo.png").unwrap(), Some(3));
    }

    #[test]
    fn test_namespaces() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        assert_eq!(archive.namespaces().unwrap(), "AIM");
        assert_eq!(archive.namespace_range('A').unwrap(), 0..3);
        assert_eq!(archive.namespace_count('I').unwrap(), 1);
        assert!(!archive.has_namespace('X').unwrap());
    }

    #[test]
    fn test_redirect_resolution() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        let index = archive.find_by_url('A', "Banane").unwrap().unwrap();
        let (target, dirent) = archive.resolve_redirects(index, 42).unwrap().unwrap();
        assert_eq!(dirent.url, "Banana");
        assert_eq!(archive.find_by_url('A', "Banana").unwrap(), Some(target));
        assert!(archive.resolve_redirects(index, 0).unwrap().is_none());
    }

    #[test]
    fn test_title_order() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        let titles: Vec<String> = archive
            .entries_by_title()
            .map(|d| d.unwrap().title)
            .collect();
        assert_eq!(titles, vec!["Apple", "Banana", "Banane", "logo.png", "Title"]);

        let rank = archive.find_by_title('A', "Banane").unwrap().unwrap();
        assert_eq!(rank, 2);
        assert_eq!(archive.lower_bound_by_title('A', "B").unwrap(), 1);
    }

    #[test]
    fn test_checksum() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        assert_eq!(archive.checksum().unwrap(), archive.compute_checksum().unwrap());
        assert!(archive.check_integrity().is_ok());
        assert!(archive.verify());
    }

    #[test]
    fn test_out_of_range() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        assert!(matches!(archive.get_dirent(99), Err(ArchiveError::NotFound(_))));
        assert!(matches!(archive.get_cluster(99), Err(ArchiveError::NotFound(_))));
        assert!(matches!(archive.title_index(5), Err(ArchiveError::NotFound(_))));
    }

    #[test]
    fn test_caches_fill() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        for dirent in archive.entries().collect::<Result<Vec<_>>>().unwrap() {
            archive.dirent_content(&dirent).unwrap();
        }
        archive.get_dirent(0).unwrap();

        let stats = archive.cache_stats();
        assert!(stats.entries.hits >= 1);
        assert!(stats.clusters.len >= 1);
        archive.close();
    }

    #[test]
    fn test_cluster_decoded_once_and_shared() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(sample(&dir)).unwrap();

        let apple = archive.find_by_url('A', "Apple").unwrap().unwrap();
        let apple = archive.get_dirent(apple).unwrap();
        let banana = archive.find_by_url('A', "Banana").unwrap().unwrap();
        let banana = archive.get_dirent(banana).unwrap();
        let (apple_cluster, _) = apple.content_location().unwrap();
        let (banana_cluster, _) = banana.content_location().unwrap();
        assert_eq!(apple_cluster, banana_cluster);

        let first = archive.dirent_content(&apple).unwrap().unwrap();
        let second = archive.dirent_content(&banana).unwrap().unwrap();
        assert_eq!(&*first, b"<p>apple</p>");
        assert_eq!(&*second, b"<p>banana</p>");

        let a = archive.get_cluster(apple_cluster).unwrap();
        let b = archive.get_cluster(apple_cluster).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let stats = archive.cache_stats().clusters;
        assert_eq!(stats.misses, 1);
        assert!(stats.hits >= 3);
        assert_eq!(stats.len, 1);
    }
}
