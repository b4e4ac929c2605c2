//! Segmented archive I/O
//!
//! Large archives are sometimes split into `name.zimaa`, `name.zimab`, ...
//! for filesystems with file size limits. `SegmentedStream` presents the parts
//! as one logical byte range and keeps a bounded set of them open.

use crate::cache::{AdaptiveCache, CacheStats};
use crate::error::{ArchiveError, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Default number of segment files kept open
pub const DEFAULT_OPEN_FILES: usize = 5;

/// One physical part of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub path: PathBuf,
    /// Logical offset of the first byte
    pub start: u64,
    pub size: u64,
}

/// Logical read-only stream over one or more segment files
pub struct SegmentedStream {
    path: PathBuf,
    segments: Vec<Segment>,
    files: AdaptiveCache<PathBuf, File>,
    size: u64,
    mtime: SystemTime,
    position: u64,
}

/// Strip the `aa` suffix of a first segment so it names the whole archive
///
/// `wiki.zimaa` becomes `wiki.zim`; shorter paths are returned unchanged.
pub fn canonical_archive_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let text = path.as_ref().to_string_lossy();
    if text.len() > 5 && text.ends_with("aa") {
        PathBuf::from(&text[..text.len() - 2])
    } else {
        path.as_ref().to_path_buf()
    }
}

fn segment_suffixes() -> impl Iterator<Item = String> {
    ('a'..='z').flat_map(|first| ('a'..='z').map(move |second| format!("{}{}", first, second)))
}

impl SegmentedStream {
    /// Open an archive, discovering split parts when `path` itself is missing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_limit(path, DEFAULT_OPEN_FILES)
    }

    /// Open keeping at most `open_files` handles alive
    ///
    /// A first-segment path such as `wiki.zimaa` opens the whole split archive.
    pub fn open_with_limit<P: AsRef<Path>>(path: P, open_files: usize) -> Result<Self> {
        let path = canonical_archive_path(path);

        let candidates: Vec<PathBuf> = if path.is_file() {
            vec![path.clone()]
        } else {
            let base = path.as_os_str().to_string_lossy().into_owned();
            segment_suffixes()
                .map(|suffix| PathBuf::from(format!("{}{}", base, suffix)))
                .take_while(|candidate| candidate.is_file())
                .collect()
        };

        if candidates.is_empty() {
            return Err(ArchiveError::NotFound(format!(
                "archive {} (no file or split parts)",
                path.display()
            )));
        }

        let mut segments = Vec::with_capacity(candidates.len());
        let mut start = 0u64;
        let mut mtime = SystemTime::UNIX_EPOCH;
        for candidate in candidates {
            let metadata = std::fs::metadata(&candidate)?;
            if let Ok(modified) = metadata.modified() {
                mtime = mtime.max(modified);
            }
            debug!(
                "Segment {} at offset {} ({} bytes)",
                candidate.display(),
                start,
                metadata.len()
            );
            segments.push(Segment {
                path: candidate,
                start,
                size: metadata.len(),
            });
            start += metadata.len();
        }

        Ok(SegmentedStream {
            path,
            segments,
            files: AdaptiveCache::new(open_files),
            size: start,
            mtime,
            position: 0,
        })
    }

    /// Path the stream was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total logical size
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Latest modification time over all segments
    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Open-handle cache statistics
    pub fn handle_stats(&self) -> CacheStats {
        self.files.stats()
    }

    fn segment_index(&self, offset: u64) -> usize {
        self.segments
            .partition_point(|segment| segment.start <= offset)
            .saturating_sub(1)
    }

    fn read_segment(&mut self, index: usize, local: u64, buf: &mut [u8]) -> Result<()> {
        let path = &self.segments[index].path;
        if let Some(file) = self.files.get_mut(path) {
            file.seek(SeekFrom::Start(local))?;
            file.read_exact(buf)?;
            return Ok(());
        }

        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(local))?;
        file.read_exact(buf)?;
        self.files.put(path.clone(), file);
        Ok(())
    }

    /// Fill `buf` from logical `offset`, crossing segment boundaries
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<()> {
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= self.size)
            .ok_or_else(|| {
                ArchiveError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "read of {} bytes at {} past end of archive ({} bytes)",
                        buf.len(),
                        offset,
                        self.size
                    ),
                ))
            })?;

        let mut done = 0usize;
        let mut current = offset;
        while current < end {
            let index = self.segment_index(current);
            let segment = &self.segments[index];
            let local = current - segment.start;
            let available = (segment.size - local).min(end - current) as usize;
            if available == 0 {
                return Err(ArchiveError::eof("segment data"));
            }
            self.read_segment(index, local, &mut buf[done..done + available])?;
            done += available;
            current += available as u64;
        }
        Ok(())
    }

    /// Read `len` bytes at `offset` into a fresh buffer
    pub fn read_vec(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Read at most `len` bytes at `offset`, stopping at the end of the stream
    pub fn read_up_to(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let available = self.size.saturating_sub(offset).min(len as u64) as usize;
        self.read_vec(offset, available)
    }
}

impl Read for SegmentedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.position);
        let n = (buf.len() as u64).min(remaining) as usize;
        if n == 0 {
            return Ok(0);
        }
        let position = self.position;
        self.read_at(&mut buf[..n], position).map_err(|e| match e {
            ArchiveError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        })?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for SegmentedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of archive",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("single.zim");
        let data = pattern(300, 1);
        fs::write(&path, &data).unwrap();

        let mut stream = SegmentedStream::open(&path).unwrap();
        assert_eq!(stream.segment_count(), 1);
        assert_eq!(stream.size(), 300);
        assert_eq!(stream.read_vec(10, 5).unwrap(), data[10..15].to_vec());
    }

    #[test]
    fn test_split_parts_are_discovered() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("split.zim");
        let first = pattern(100, 3);
        let second = pattern(50, 9);
        fs::write(dir.path().join("split.zimaa"), &first).unwrap();
        fs::write(dir.path().join("split.zimab"), &second).unwrap();
        // Gap in the sequence ends discovery
        fs::write(dir.path().join("split.zimad"), b"ignored").unwrap();

        let mut stream = SegmentedStream::open(&base).unwrap();
        assert_eq!(stream.segment_count(), 2);
        assert_eq!(stream.size(), 150);
        assert_eq!(stream.segments()[1].start, 100);

        let across = stream.read_vec(95, 10).unwrap();
        assert_eq!(&across[..5], &first[95..]);
        assert_eq!(&across[5..], &second[..5]);
    }

    #[test]
    fn test_read_past_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.zim");
        fs::write(&path, pattern(20, 0)).unwrap();

        let mut stream = SegmentedStream::open(&path).unwrap();
        assert!(stream.read_vec(15, 10).unwrap_err().is_unexpected_eof());
        assert_eq!(stream.read_up_to(15, 10).unwrap().len(), 5);
    }

    #[test]
    fn test_missing_archive() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SegmentedStream::open(dir.path().join("absent.zim")),
            Err(ArchiveError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_and_seek() {
        let dir = TempDir::new().unwrap();
        let data = pattern(64, 5);
        fs::write(dir.path().join("rs.zimaa"), &data[..40]).unwrap();
        fs::write(dir.path().join("rs.zimab"), &data[40..]).unwrap();

        let mut stream = SegmentedStream::open(dir.path().join("rs.zim")).unwrap();
        stream.seek(SeekFrom::Start(30)).unwrap();
        let mut buf = [0u8; 20];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, &data[30..50]);

        stream.seek(SeekFrom::End(-4)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, data[60..].to_vec());

        assert!(stream.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_handle_cache_is_bounded() {
        let dir = TempDir::new().unwrap();
        for suffix in ["aa", "ab", "ac", "ad"] {
            fs::write(dir.path().join(format!("many.zim{}", suffix)), pattern(10, 0)).unwrap();
        }

        let mut stream = SegmentedStream::open_with_limit(dir.path().join("many.zim"), 2).unwrap();
        stream.read_vec(0, 40).unwrap();
        stream.read_vec(0, 40).unwrap();
        assert!(stream.handle_stats().len <= 2);
    }

    #[test]
    fn test_canonical_archive_path() {
        assert_eq!(
            canonical_archive_path("wiki.zimaa"),
            PathBuf::from("wiki.zim")
        );
        assert_eq!(canonical_archive_path("wiki.zim"), PathBuf::from("wiki.zim"));
        assert_eq!(canonical_archive_path("a.aa"), PathBuf::from("a.aa"));
    }
}
