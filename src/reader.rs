//! High-level read API
//!
//! [`Reader`] wraps an [`Archive`] with the policies a content viewer needs:
//! content-path lookup with redirect following, main/random page selection,
//! metadata, counters, favicon discovery and title suggestions.
//!
//! ```rust,no_run
//! use zimkit::{Reader, Result};
//!
//! # fn main() -> Result<()> {
//! let mut reader = Reader::open("wikipedia.zim")?;
//!
//! if let Some(page) = reader.content_by_url("/A/Paris")? {
//!     println!("{} ({} bytes, {})", page.title, page.article_size, page.mime_type);
//! }
//!
//! reader.search_suggestions_smart("par", 10)?;
//! while let Some(suggestion) = reader.next_suggestion() {
//!     println!("{} -> {}", suggestion.title, suggestion.url);
//! }
//! # Ok(())
//! # }
//! ```

use crate::archive::Archive;
use crate::config::{ArchiveConfig, FromToml};
use crate::dirent::DirectoryEntry;
use crate::error::{ArchiveError, Result};
use crate::metadata::{self, ArchiveMetadata, MimeCounter};
use crate::suggestions::{Suggestion, SuggestionBuffer};
use crate::text::{DefaultNormalizer, TextNormalizer};
use crate::url::{long_url, parse_content_path, url_decode};
use crate::varint;
use crate::writer::CATEGORY_LIST_NAMESPACE;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Icon locations tried by [`Reader::favicon`], in order
pub const FAVICON_URLS: [&str; 4] = ["/-/favicon.png", "/I/favicon.png", "/I/favicon", "/-/favicon"];

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Reader policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub archive: ArchiveConfig,
    /// Namespace of displayable pages
    pub content_namespace: char,
    pub media_namespace: char,
    pub metadata_namespace: char,
    /// Longer redirect chains are treated as missing pages
    pub max_redirect_hops: usize,
    /// Draws before [`Reader::random_page_url`] settles for the main page
    pub random_page_attempts: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            archive: ArchiveConfig::default(),
            content_namespace: 'A',
            media_namespace: 'I',
            metadata_namespace: 'M',
            max_redirect_hops: 42,
            random_page_attempts: 64,
        }
    }
}

impl FromToml for ReaderConfig {}

/// A document returned by content lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// Payload, possibly wrapped in a stub HTML document
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Content path of the document actually served (after redirects)
    pub base_url: String,
    pub title: String,
    /// Size of the stored payload before any wrapping
    pub article_size: u64,
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Wrap an HTML fragment without a body tag into a minimal document
fn wrap_html_stub(title: &str, fragment: &[u8]) -> Vec<u8> {
    let head = format!(
        "<html><head><title>{}</title>\
         <meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" />\
         </head><body>",
        title
    );
    let mut page = Vec::with_capacity(head.len() + fragment.len() + 14);
    page.extend_from_slice(head.as_bytes());
    page.extend_from_slice(fragment);
    page.extend_from_slice(b"</body></html>");
    page
}

/// Title derived from a file name: `wikipedia_en_all.zim` -> `wikipedia en all`
fn title_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match name.find(".zim") {
        Some(pos) => &name[..pos],
        None => name.as_str(),
    };
    stem.replace('_', " ")
}

/// Read-side facade over an [`Archive`]
pub struct Reader {
    archive: Archive,
    config: ReaderConfig,
    content_range: Range<u32>,
    media_range: Range<u32>,
    suggestions: SuggestionBuffer,
    normalizer: Box<dyn TextNormalizer>,
    counter: Option<MimeCounter>,
}

impl Reader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let archive = Archive::open_with_config(path, &config.archive)?;
        Self::from_archive(archive, config)
    }

    /// Wrap an already opened archive
    pub fn from_archive(mut archive: Archive, config: ReaderConfig) -> Result<Self> {
        let content_range = archive.namespace_range(config.content_namespace)?;
        let media_range = archive.namespace_range(config.media_namespace)?;
        debug!(
            "Reader ready: {} content and {} media entries",
            content_range.len(),
            media_range.len()
        );
        Ok(Reader {
            archive,
            config,
            content_range,
            media_range,
            suggestions: SuggestionBuffer::new(),
            normalizer: Box::new(DefaultNormalizer),
            counter: None,
        })
    }

    /// Replace the case normalizer used for suggestions
    pub fn with_normalizer(mut self, normalizer: Box<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn archive_mut(&mut self) -> &mut Archive {
        &mut self.archive
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn into_archive(self) -> Archive {
        self.archive
    }

    pub fn close(self) {
        self.archive.close();
    }

    /// Archive uuid as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
    pub fn id(&self) -> String {
        self.archive.header().uuid_string()
    }

    /// Size in bytes, summed over all segments
    pub fn file_size(&self) -> u64 {
        self.archive.size()
    }

    /// Every entry, redirects included
    pub fn global_count(&self) -> u32 {
        self.archive.article_count()
    }

    /// Parsed `Counter` metadata, empty when absent
    pub fn counter(&mut self) -> Result<MimeCounter> {
        if let Some(counter) = &self.counter {
            return Ok(counter.clone());
        }
        let counter = self
            .metatag(metadata::COUNTER)?
            .map(|value| MimeCounter::parse(&value))
            .unwrap_or_default();
        self.counter = Some(counter.clone());
        Ok(counter)
    }

    /// Displayable articles: `text/html` from the counter, else the size of
    /// the content namespace
    pub fn article_count(&mut self) -> Result<u32> {
        let counter = self.counter()?;
        if counter.is_empty() {
            Ok(self.content_range.len() as u32)
        } else {
            Ok(counter.article_count())
        }
    }

    /// Images from the counter, else the size of the media namespace
    pub fn media_count(&mut self) -> Result<u32> {
        let counter = self.counter()?;
        if counter.is_empty() {
            Ok(self.media_range.len() as u32)
        } else {
            Ok(counter.media_count())
        }
    }

    fn mime_type_of(&self, dirent: &DirectoryEntry) -> String {
        match self.archive.dirent_mime_type(dirent) {
            Ok(mime) => mime.to_string(),
            Err(e) => {
                warn!("No mime type for {}: {}", dirent.long_url(), e);
                FALLBACK_MIME_TYPE.to_string()
            }
        }
    }

    /// Content path of the first entry in the content namespace
    pub fn first_page_url(&mut self) -> Result<Option<String>> {
        if self.content_range.is_empty() {
            return Ok(None);
        }
        let dirent = self.archive.get_dirent(self.content_range.start)?;
        Ok(Some(long_url(dirent.namespace, &dirent.url)))
    }

    /// Declared main page, or the first content page
    pub fn main_page_url(&mut self) -> Result<Option<String>> {
        let header = *self.archive.header();
        if header.has_main_page() && header.main_page < header.article_count {
            let dirent = self.archive.get_dirent(header.main_page)?;
            if !dirent.url.is_empty() {
                return Ok(Some(long_url(dirent.namespace, &dirent.url)));
            }
        }
        self.first_page_url()
    }

    /// A random content page other than the main page
    ///
    /// Falls back to the main page after `random_page_attempts` draws, which
    /// is what happens when the main page is the only content page.
    pub fn random_page_url(&mut self) -> Result<Option<String>> {
        if self.content_range.is_empty() {
            return Ok(None);
        }
        let main_page = self.main_page_url()?;
        let mut rng = rand::thread_rng();
        for _ in 0..self.config.random_page_attempts {
            let index = rng.gen_range(self.content_range.clone());
            let dirent = self.archive.get_dirent(index)?;
            let url = long_url(dirent.namespace, &dirent.url);
            if main_page.as_deref() != Some(url.as_str()) {
                return Ok(Some(url));
            }
        }
        debug!(
            "No page other than the main page after {} draws",
            self.config.random_page_attempts
        );
        Ok(main_page)
    }

    /// Content path of the page titled `title`, after redirects
    pub fn page_url_from_title(&mut self, title: &str) -> Result<Option<String>> {
        let ns = self.config.content_namespace;
        let rank = match self.archive.find_by_title(ns, title)? {
            Some(rank) => rank,
            None => return Ok(None),
        };
        let index = self.archive.title_index(rank)?;
        Ok(self
            .archive
            .resolve_redirects(index, self.config.max_redirect_hops)?
            .map(|(_, dirent)| long_url(dirent.namespace, &dirent.url)))
    }

    /// Entry index for a decoded content path, main page for `"/"`
    fn find_decoded(&mut self, url: &str) -> Result<Option<u32>> {
        let mut path = parse_content_path(url);
        if path.is_main_page_request() {
            match self.main_page_url()? {
                Some(main) => path = parse_content_path(&main),
                None => return Ok(None),
            }
        }
        match path.namespace {
            Some(ns) => self.archive.find_by_url(ns, &path.url),
            None => {
                debug!("No namespace in content path {}", url);
                Ok(None)
            }
        }
    }

    /// Resolve a decoded content path to the entry it finally designates
    fn resolve_decoded(&mut self, url: &str) -> Result<Option<DirectoryEntry>> {
        let index = match self.find_decoded(url)? {
            Some(index) => index,
            None => return Ok(None),
        };
        Ok(self
            .archive
            .resolve_redirects(index, self.config.max_redirect_hops)?
            .map(|(_, dirent)| dirent))
    }

    /// Mime type of the entry at a decoded content path (without redirects)
    pub fn mime_type_by_url(&mut self, url: &str) -> Result<Option<String>> {
        let index = match self.find_decoded(url)? {
            Some(index) => index,
            None => return Ok(None),
        };
        let dirent = self.archive.get_dirent(index)?;
        Ok(Some(self.mime_type_of(&dirent)))
    }

    /// Content at a percent-encoded path
    pub fn content_by_url(&mut self, url: &str) -> Result<Option<Content>> {
        self.content_by_decoded_url(&url_decode(url))
    }

    /// Content at a decoded path, following redirects
    ///
    /// HTML without a `<body` tag is wrapped into a stub document.
    pub fn content_by_decoded_url(&mut self, url: &str) -> Result<Option<Content>> {
        let dirent = match self.resolve_decoded(url)? {
            Some(dirent) => dirent,
            None => return Ok(None),
        };
        let blob = match self.archive.dirent_content(&dirent)? {
            Some(blob) => blob,
            None => {
                debug!("{} has no content", dirent.long_url());
                return Ok(None);
            }
        };

        let mime_type = self.mime_type_of(&dirent);
        let article_size = blob.len() as u64;
        let data = if mime_type.contains("text/html")
            && !contains(blob.as_bytes(), b"<body")
            && !contains(blob.as_bytes(), b"<BODY")
        {
            wrap_html_stub(&dirent.title, blob.as_bytes())
        } else {
            blob.to_vec()
        };

        Ok(Some(Content {
            data,
            mime_type,
            base_url: long_url(dirent.namespace, &dirent.url),
            title: dirent.title,
            article_size,
        }))
    }

    /// First non-empty icon among [`FAVICON_URLS`]
    pub fn favicon(&mut self) -> Result<Option<Content>> {
        for url in FAVICON_URLS {
            if let Some(content) = self.content_by_decoded_url(url)? {
                if !content.data.is_empty() {
                    return Ok(Some(content));
                }
            }
        }
        Ok(None)
    }

    /// Value of metadata entry `name`, `None` when absent
    pub fn metatag(&mut self, name: &str) -> Result<Option<String>> {
        let ns = self.config.metadata_namespace;
        let index = match self.archive.find_by_url(ns, name)? {
            Some(index) => index,
            None => return Ok(None),
        };
        let dirent = match self
            .archive
            .resolve_redirects(index, self.config.max_redirect_hops)?
        {
            Some((_, dirent)) => dirent,
            None => return Ok(None),
        };
        Ok(self
            .archive
            .dirent_content(&dirent)?
            .map(|blob| String::from_utf8_lossy(&blob).into_owned()))
    }

    fn metatag_or_empty(&mut self, name: &str) -> Result<String> {
        Ok(self.metatag(name)?.unwrap_or_default())
    }

    /// `Title` metadata, else the file name with underscores as spaces
    pub fn title(&mut self) -> Result<String> {
        let title = self.metatag_or_empty(metadata::TITLE)?;
        if title.is_empty() {
            Ok(title_from_path(self.archive.path()))
        } else {
            Ok(title)
        }
    }

    /// `Description` metadata, else `Subtitle`
    pub fn description(&mut self) -> Result<String> {
        let description = self.metatag_or_empty(metadata::DESCRIPTION)?;
        if description.is_empty() {
            self.metatag_or_empty(metadata::SUBTITLE)
        } else {
            Ok(description)
        }
    }

    pub fn language(&mut self) -> Result<String> {
        self.metatag_or_empty(metadata::LANGUAGE)
    }

    pub fn date(&mut self) -> Result<String> {
        self.metatag_or_empty(metadata::DATE)
    }

    pub fn creator(&mut self) -> Result<String> {
        self.metatag_or_empty(metadata::CREATOR)
    }

    pub fn publisher(&mut self) -> Result<String> {
        self.metatag_or_empty(metadata::PUBLISHER)
    }

    /// Snapshot of all descriptive metadata and counts
    pub fn metadata(&mut self) -> Result<ArchiveMetadata> {
        Ok(ArchiveMetadata {
            id: self.id(),
            title: self.title()?,
            description: self.description()?,
            language: self.language()?,
            date: self.date()?,
            creator: self.creator()?,
            publisher: self.publisher()?,
            article_count: self.article_count()?,
            media_count: self.media_count()?,
            global_count: self.global_count(),
            file_size: self.file_size(),
            has_checksum: self.can_check_integrity(),
            main_page: self.main_page_url()?,
        })
    }

    /// Prefix spellings tried by [`Reader::search_suggestions_smart`]
    pub fn title_variants(&self, prefix: &str) -> Vec<String> {
        self.normalizer.case_variants(prefix)
    }

    /// Collect titles of the content namespace starting with `prefix`
    ///
    /// With `reset == false` results are merged into the current buffer, and
    /// nothing happens if it already holds `limit` suggestions.
    pub fn search_suggestions(&mut self, prefix: &str, limit: usize, reset: bool) -> Result<bool> {
        self.suggestions.search(
            &mut self.archive,
            self.config.content_namespace,
            prefix,
            limit,
            reset,
            self.config.max_redirect_hops,
            self.normalizer.as_ref(),
        )
    }

    /// Suggestions for every case variant of `prefix`, merged
    pub fn search_suggestions_smart(&mut self, prefix: &str, limit: usize) -> Result<bool> {
        self.suggestions.clear();
        let mut found = false;
        for variant in self.title_variants(prefix) {
            found |= self.search_suggestions(&variant, limit, false)?;
        }
        Ok(found)
    }

    pub fn next_suggestion(&mut self) -> Option<Suggestion> {
        self.suggestions.next_suggestion()
    }

    pub fn reset_suggestions(&mut self) {
        self.suggestions.clear();
    }

    pub fn suggestions(&self) -> &SuggestionBuffer {
        &self.suggestions
    }

    /// Content paths of the members of category `url`
    pub fn category_members(&mut self, url: &str) -> Result<Option<Vec<String>>> {
        let index = match self.archive.find_by_url(CATEGORY_LIST_NAMESPACE, url)? {
            Some(index) => index,
            None => return Ok(None),
        };
        let dirent = self.archive.get_dirent(index)?;
        let blob = match self.archive.dirent_content(&dirent)? {
            Some(blob) => blob,
            None => return Ok(None),
        };

        let mut members = Vec::new();
        for member in varint::decode_all(&blob)? {
            let index = u32::try_from(member).map_err(|_| ArchiveError::MalformedVarInt)?;
            let dirent = self.archive.get_dirent(index)?;
            members.push(long_url(dirent.namespace, &dirent.url));
        }
        Ok(Some(members))
    }

    pub fn can_check_integrity(&self) -> bool {
        self.archive.has_checksum()
    }

    /// True unless the stored checksum exists and matches
    pub fn is_corrupted(&mut self) -> bool {
        match self.archive.check_integrity() {
            Ok(()) => false,
            Err(e) => {
                warn!("Integrity check failed for {}: {}", self.archive.path().display(), e);
                true
            }
        }
    }
}

/// A [`Reader`] shared between threads behind one mutex
///
/// ```rust,no_run
/// use zimkit::SharedReader;
///
/// # fn main() -> zimkit::Result<()> {
/// let shared = SharedReader::open("wikipedia.zim")?;
/// let worker = shared.clone();
/// std::thread::spawn(move || {
///     let _ = worker.with(|reader| reader.random_page_url());
/// });
/// let title = shared.with(|reader| reader.title())?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SharedReader {
    inner: Arc<Mutex<Reader>>,
}

impl SharedReader {
    pub fn new(reader: Reader) -> Self {
        SharedReader {
            inner: Arc::new(Mutex::new(reader)),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Reader::open(path)?))
    }

    /// Run `f` with exclusive access to the reader
    pub fn with<T, F: FnOnce(&mut Reader) -> T>(&self, f: F) -> T {
        let mut reader = self.inner.lock();
        f(&mut reader)
    }

    /// Number of handles sharing the reader
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{ArchiveWriter, Category, MemorySource};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn build(dir: &TempDir, name: &str, source: &mut MemorySource) -> PathBuf {
        let path = dir.path().join(name);
        ArchiveWriter::default().create(&path, source).unwrap();
        path
    }

    fn fruit(dir: &TempDir) -> PathBuf {
        let mut source = MemorySource::new();
        source.add_html('A', "Apple", "Apple", "<p>apple</p>");
        source.add_html('A', "Banana", "Banana", "<html><body>banana</body></html>");
        source.add_html('A', "Cherry", "Cherry", "<p>cherry</p>");
        source.add_redirect('A', "Banane", "Banane", "A/Banana");
        source.add_content('I', "favicon.png", "", "image/png", vec![1, 2, 3]);
        source.add_content('M', "Title", "", "text/plain", b"Fruit Salad".to_vec());
        source.add_content('M', "Subtitle", "", "text/plain", b"All about fruit".to_vec());
        source.add_content('M', "Language", "", "text/plain", b"eng".to_vec());
        source.set_main_page("A/Banana");
        build(dir, "fruit.zim", &mut source)
    }

    #[test]
    fn test_content_and_redirects() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();

        let content = reader.content_by_url("/A/Banane").unwrap().unwrap();
        assert_eq!(content.base_url, "/A/Banana");
        assert_eq!(content.data, b"<html><body>banana</body></html>".to_vec());
        assert_eq!(content.mime_type, "text/html");

        assert!(reader.content_by_url("/A/Durian").unwrap().is_none());
        assert_eq!(reader.mime_type_by_url("/I/favicon.png").unwrap().as_deref(), Some("image/png"));
    }

    #[test]
    fn test_html_fragment_is_wrapped() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();

        let content = reader.content_by_url("/A/Apple").unwrap().unwrap();
        let html = String::from_utf8(content.data).unwrap();
        assert!(html.starts_with("<html><head><title>Apple</title>"));
        assert!(html.contains("charset=utf-8"));
        assert!(html.ends_with("<body><p>apple</p></body></html>"));
        assert_eq!(content.article_size, "<p>apple</p>".len() as u64);
    }

    #[test]
    fn test_main_page_request() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();

        assert_eq!(reader.main_page_url().unwrap().as_deref(), Some("/A/Banana"));
        let content = reader.content_by_url("/").unwrap().unwrap();
        assert_eq!(content.base_url, "/A/Banana");
    }

    #[test]
    fn test_percent_encoded_url() {
        let dir = TempDir::new().unwrap();
        let mut source = MemorySource::new();
        source.add_html('A', "Crème brûlée", "", "<body>dessert</body>");
        let mut reader = Reader::open(build(&dir, "dessert.zim", &mut source)).unwrap();

        let content = reader.content_by_url("/A/Cr%C3%A8me%20br%C3%BBl%C3%A9e").unwrap();
        assert!(content.is_some());
    }

    #[test]
    fn test_metadata() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();

        assert_eq!(reader.title().unwrap(), "Fruit Salad");
        assert_eq!(reader.description().unwrap(), "All about fruit");
        assert_eq!(reader.language().unwrap(), "eng");
        assert_eq!(reader.creator().unwrap(), "");
        assert!(reader.metatag("Publisher").unwrap().is_none());

        let metadata = reader.metadata().unwrap();
        assert_eq!(metadata.global_count, 8);
        assert_eq!(metadata.article_count, 4);
        assert_eq!(metadata.media_count, 1);
        assert!(metadata.has_checksum);
        assert_eq!(metadata.id.len(), 36);
    }

    #[test]
    fn test_title_falls_back_to_file_name() {
        let dir = TempDir::new().unwrap();
        let mut source = MemorySource::new();
        source.add_html('A', "Only", "", "<body>only</body>");
        let mut reader = Reader::open(build(&dir, "my_little_archive.zim", &mut source)).unwrap();
        assert_eq!(reader.title().unwrap(), "my little archive");
    }

    #[test]
    fn test_counter_overrides_namespace_counts() {
        let dir = TempDir::new().unwrap();
        let mut source = MemorySource::new();
        source.add_html('A', "One", "", "<body>1</body>");
        source.add_content('M', "Counter", "", "text/plain", b"text/html=10;image/png=4;image/gif=1".to_vec());
        let mut reader = Reader::open(build(&dir, "counted.zim", &mut source)).unwrap();

        assert_eq!(reader.article_count().unwrap(), 10);
        assert_eq!(reader.media_count().unwrap(), 5);
        assert_eq!(reader.global_count(), 2);
    }

    #[test]
    fn test_favicon() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();
        let icon = reader.favicon().unwrap().unwrap();
        assert_eq!(icon.base_url, "/I/favicon.png");
        assert_eq!(icon.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_random_page_avoids_main_page() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();
        for _ in 0..20 {
            let url = reader.random_page_url().unwrap().unwrap();
            assert_ne!(url, "/A/Banana");
        }
    }

    #[test]
    fn test_random_page_single_page() {
        let dir = TempDir::new().unwrap();
        let mut source = MemorySource::new();
        source.add_html('A', "Home", "", "<body>home</body>");
        source.set_main_page("A/Home");
        let mut reader = Reader::open(build(&dir, "single.zim", &mut source)).unwrap();
        assert_eq!(reader.random_page_url().unwrap().as_deref(), Some("/A/Home"));
    }

    #[test]
    fn test_page_url_from_title() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();
        assert_eq!(
            reader.page_url_from_title("Banane").unwrap().as_deref(),
            Some("/A/Banana")
        );
        assert!(reader.page_url_from_title("Kiwi").unwrap().is_none());
    }

    #[test]
    fn test_category_members() {
        let dir = TempDir::new().unwrap();
        let mut source = MemorySource::new();
        source.add_html('A', "Apple", "", "<body>a</body>");
        source.add_html('A', "Pear", "", "<body>p</body>");
        source.add_category(Category {
            url: "Fruit".to_string(),
            title: "Fruit".to_string(),
            data: b"<body>fruit</body>".to_vec(),
            members: vec!["A/Pear".to_string(), "A/Apple".to_string()],
        });
        let mut reader = Reader::open(build(&dir, "categories.zim", &mut source)).unwrap();

        let members = reader.category_members("Fruit").unwrap().unwrap();
        assert_eq!(members, vec!["/A/Pear", "/A/Apple"]);
        assert!(reader.category_members("Vegetables").unwrap().is_none());
    }

    #[test]
    fn test_suggestions_cursor() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();

        assert!(reader.search_suggestions("Ban", 10, true).unwrap());
        let first = reader.next_suggestion().unwrap();
        assert_eq!(first.title, "Banana");
        let second = reader.next_suggestion().unwrap();
        assert_eq!(second.title, "Banane");
        assert_eq!(second.url, "/A/Banana");
        assert!(reader.next_suggestion().is_none());

        reader.reset_suggestions();
        assert!(reader.next_suggestion().is_none());
        assert!(!reader.search_suggestions("", 10, true).unwrap());
    }

    #[test]
    fn test_smart_suggestions_use_case_variants() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();

        assert!(reader.search_suggestions_smart("ch", 10).unwrap());
        assert_eq!(reader.next_suggestion().unwrap().title, "Cherry");
    }

    #[test]
    fn test_integrity() {
        let dir = TempDir::new().unwrap();
        let mut reader = Reader::open(fruit(&dir)).unwrap();
        assert!(reader.can_check_integrity());
        assert!(!reader.is_corrupted());
    }

    #[test]
    fn test_config_from_toml() {
        let config = ReaderConfig::from_toml_str(
            "max_redirect_hops = 5\ncontent_namespace = \"C\"\n[archive]\ncluster_cache_size = 4\n",
        )
        .unwrap();
        assert_eq!(config.max_redirect_hops, 5);
        assert_eq!(config.content_namespace, 'C');
        assert_eq!(config.archive.cluster_cache_size, 4);
        assert_eq!(config.archive.entry_cache_size, 512);
        assert_eq!(config.random_page_attempts, 64);
    }

    #[test]
    fn test_shared_reader() {
        let dir = TempDir::new().unwrap();
        let shared = SharedReader::open(fruit(&dir)).unwrap();
        let other = shared.clone();
        assert_eq!(shared.handle_count(), 2);

        let handle = std::thread::spawn(move || other.with(|r| r.title().unwrap()));
        assert_eq!(handle.join().unwrap(), "Fruit Salad");
        assert_eq!(shared.with(|r| r.global_count()), 8);
    }
}
