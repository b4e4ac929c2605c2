//! # zimkit - Clustered Offline Content Archives
//!
//! `zimkit` reads and writes single-file content archives that pack many named,
//! typed documents (HTML pages, images, metadata) into compressed clusters:
//!
//! - **Random access** to any document by URL, title or index through
//!   offset-pointer tables and namespace ranges
//! - **Adaptive caching** of decoded directory entries, clusters and open files
//! - **Split archives** spread over `.zimaa`, `.zimab`, ... segments
//! - **Zstd and LZ4** cluster compression, MD5 integrity checksum
//! - **Writer** that assembles an archive from any article source
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zimkit::{Reader, Result};
//! use zimkit::writer::{ArchiveWriter, MemorySource};
//!
//! # fn main() -> Result<()> {
//! // Build an archive
//! let mut source = MemorySource::new();
//! source.add_html('A', "Main_Page", "Main Page", "<p>Welcome</p>");
//! source.add_redirect('A', "Home", "", "A/Main_Page");
//! source.set_main_page("A/Main_Page");
//! ArchiveWriter::default().create("welcome.zim", &mut source)?;
//!
//! // Read it back
//! let mut reader = Reader::open("welcome.zim")?;
//! let page = reader.content_by_url("/A/Home")?.expect("redirect resolves");
//! assert_eq!(page.base_url, "/A/Main_Page");
//! # Ok(())
//! # }
//! ```
//!
//! ## Low-level access
//!
//! ```rust,no_run
//! use zimkit::{Archive, Result};
//!
//! # fn main() -> Result<()> {
//! let mut archive = Archive::open("welcome.zim")?;
//! if let Some(index) = archive.find_by_url('A', "Main_Page")? {
//!     let dirent = archive.get_dirent(index)?;
//!     let blob = archive.dirent_content(&dirent)?;
//!     println!("{} bytes", blob.map(|b| b.len()).unwrap_or(0));
//! }
//! println!("checksum ok: {}", archive.verify());
//! # Ok(())
//! # }
//! ```

// Storage layer
pub mod core;

// Re-export core modules so crate:: paths resolve at the root
pub(crate) use crate::core::bytes;
pub use crate::core::{
    archive, cache, cluster, compression, config, dirent, error, header, mimetypes, stream,
    varint, writer,
};

pub mod metadata;
pub mod reader;
pub mod search;
pub mod suggestions;
pub mod text;
pub mod url;

pub use crate::core::{
    archive::{Archive, ArchiveCacheStats, Entries},
    cache::{AdaptiveCache, CacheStats},
    cluster::{Blob, Cluster},
    compression::CompressionMethod,
    config::{ArchiveConfig, FromToml, WriterConfig},
    dirent::{DirectoryEntry, EntryKind},
    error::{ArchiveError, Result},
    header::Header,
    mimetypes::MimeTypeTable,
    stream::SegmentedStream,
    writer::{ArchiveWriter, ArticleSource, DirectorySource, MemorySource, WriteSummary},
};
pub use metadata::{ArchiveMetadata, MimeCounter};
pub use reader::{Content, Reader, ReaderConfig, SharedReader};
pub use search::{SearchConfig, SearchEngine, Searcher};
pub use suggestions::Suggestion;
pub use text::{DefaultNormalizer, TextNormalizer};
