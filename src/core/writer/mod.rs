//! Archive creation
//!
//! The writer drains an [`ArticleSource`], then lays the archive out in one
//! forward pass:
//!
//! 1. Collect articles (and categories) and validate them
//! 2. Sort by `(namespace, url)`, map aids to entry indices, resolve redirects
//! 3. Sort a title index by `(namespace, title)`
//! 4. Pack content into clusters in source order, staged in a sidecar file
//! 5. Compute the [`Layout`] and write everything into `<dest>.tmp` while
//!    hashing, append the MD5 digest, fsync and rename into place
//!
//! A failed write removes its temporary files and leaves `dest` untouched.

pub mod directory;
pub mod layout;
pub mod source;

pub use directory::DirectorySource;
pub use layout::Layout;
pub use source::{is_compressible, ArticleKind, ArticleSource, Category, MemorySource, SourceArticle};

use crate::cluster::ClusterBuilder;
use crate::compression::CompressionMethod;
use crate::config::WriterConfig;
use crate::dirent::{DirectoryEntry, EntryKind};
use crate::error::{ArchiveError, Result};
use crate::mimetypes::{MimeTypeTable, DELETED_MIME, LINKTARGET_MIME, REDIRECT_MIME};
use crate::varint;
use ahash::{AHashMap, AHashSet};
use md5::{Digest, Md5};
use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Namespace of category pages
pub const CATEGORY_NAMESPACE: char = 'U';
/// Namespace of category member lists
pub const CATEGORY_LIST_NAMESPACE: char = 'V';
/// Mime type of category member lists
pub const CATEGORY_LIST_MIME: &str = "application/octet-stream";

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub uuid: [u8; 16],
    pub article_count: u32,
    pub redirect_count: u32,
    pub cluster_count: u32,
    pub file_size: u64,
    pub checksum: [u8; 16],
}

enum Origin {
    Source,
    Inline(Vec<u8>),
    Members(Vec<String>),
}

struct Pending {
    article: SourceArticle,
    origin: Origin,
    /// Position in source order
    order: usize,
}

/// Articles gathered from a source, with uniqueness checks
#[derive(Default)]
struct Collected {
    items: Vec<Pending>,
    aids: AHashSet<String>,
    urls: AHashSet<(char, String)>,
}

impl Collected {
    fn push(&mut self, article: SourceArticle, origin: Origin) -> Result<()> {
        validate_article(&article)?;
        if !self.aids.insert(article.aid.clone()) {
            return Err(ArchiveError::InvalidArticle(format!(
                "duplicate aid {}",
                article.aid
            )));
        }
        if !self.urls.insert((article.namespace, article.url.clone())) {
            return Err(ArchiveError::InvalidArticle(format!(
                "duplicate url {}/{}",
                article.namespace, article.url
            )));
        }
        let order = self.items.len();
        self.items.push(Pending {
            article,
            origin,
            order,
        });
        Ok(())
    }
}

/// Builds archives from an [`ArticleSource`]
///
/// ```rust,no_run
/// use zimkit::writer::{ArchiveWriter, MemorySource};
/// use zimkit::config::WriterConfig;
///
/// # fn main() -> zimkit::Result<()> {
/// let mut source = MemorySource::new();
/// source.add_html('A', "Main_Page", "Main Page", "<p>Welcome</p>");
/// source.set_main_page("A/Main_Page");
///
/// let summary = ArchiveWriter::new(WriterConfig::default()).create("out.zim", &mut source)?;
/// println!("{} entries, {} bytes", summary.article_count, summary.file_size);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArchiveWriter {
    config: WriterConfig,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn sort_key(a: (char, &str), b: (char, &str)) -> Ordering {
    (a.0 as u32)
        .cmp(&(b.0 as u32))
        .then_with(|| a.1.as_bytes().cmp(b.1.as_bytes()))
}

fn validate_article(article: &SourceArticle) -> Result<()> {
    if !article.namespace.is_ascii() || article.namespace == '\0' {
        return Err(ArchiveError::InvalidArticle(format!(
            "{}: namespace must be a single ASCII character",
            article.aid
        )));
    }
    if article.url.is_empty() {
        return Err(ArchiveError::InvalidArticle(format!(
            "{}: empty url",
            article.aid
        )));
    }
    if article.url.contains('\0') || article.title.contains('\0') {
        return Err(ArchiveError::InvalidArticle(format!(
            "{}: url and title must not contain NUL",
            article.aid
        )));
    }
    if article.parameter.len() > u8::MAX as usize {
        return Err(ArchiveError::InvalidArticle(format!(
            "{}: parameter longer than 255 bytes",
            article.aid
        )));
    }
    if matches!(article.kind, ArticleKind::Content { .. }) && article.mime_type.is_empty() {
        return Err(ArchiveError::InvalidArticle(format!(
            "{}: content without mime type",
            article.aid
        )));
    }
    Ok(())
}

/// Write adapter that hashes everything passing through
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Md5,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        HashingWriter {
            inner,
            hasher: Md5::new(),
            written: 0,
        }
    }

    fn finish(self) -> (W, [u8; 16], u64) {
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&self.hasher.finalize());
        (self.inner, digest, self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ArchiveWriter {
    pub fn new(config: WriterConfig) -> Self {
        ArchiveWriter { config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Build an archive at `dest` from `source`
    pub fn create<P, S>(&self, dest: P, source: &mut S) -> Result<WriteSummary>
    where
        P: AsRef<Path>,
        S: ArticleSource + ?Sized,
    {
        self.config.validate()?;

        let dest = dest.as_ref();
        let tmp_path = with_suffix(dest, ".tmp");
        let sidecar_path = with_suffix(dest, ".clusters.tmp");

        info!("Creating archive {}", dest.display());
        let result = self.write_archive(dest, &tmp_path, &sidecar_path, source);

        let _ = fs::remove_file(&sidecar_path);
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn collect<S: ArticleSource + ?Sized>(&self, source: &mut S) -> Result<Vec<Pending>> {
        let mut pending = Collected::default();

        while let Some(article) = source.next_article()? {
            pending.push(article, Origin::Source)?;
        }

        while let Some(category) = source.next_category()? {
            let page = SourceArticle {
                aid: format!("{}/{}", CATEGORY_NAMESPACE, category.url),
                namespace: CATEGORY_NAMESPACE,
                url: category.url.clone(),
                title: category.title.clone(),
                mime_type: "text/html".to_string(),
                parameter: Vec::new(),
                revision: 0,
                kind: ArticleKind::Content {
                    should_compress: true,
                },
            };
            let list = SourceArticle {
                aid: format!("{}/{}", CATEGORY_LIST_NAMESPACE, category.url),
                namespace: CATEGORY_LIST_NAMESPACE,
                url: category.url.clone(),
                title: category.title.clone(),
                mime_type: CATEGORY_LIST_MIME.to_string(),
                parameter: Vec::new(),
                revision: 0,
                kind: ArticleKind::Content {
                    should_compress: false,
                },
            };
            pending.push(page, Origin::Inline(category.data))?;
            pending.push(list, Origin::Members(category.members))?;
        }

        Ok(pending.items)
    }

    fn write_archive<S: ArticleSource + ?Sized>(
        &self,
        dest: &Path,
        tmp_path: &Path,
        sidecar_path: &Path,
        source: &mut S,
    ) -> Result<WriteSummary> {
        let mut pending = self.collect(source)?;
        pending.sort_by(|a, b| {
            sort_key(
                (a.article.namespace, a.article.url.as_str()),
                (b.article.namespace, b.article.url.as_str()),
            )
        });

        let article_count = u32::try_from(pending.len())
            .map_err(|_| ArchiveError::InvalidArticle("too many articles".to_string()))?;

        let index_of: AHashMap<String, u32> = pending
            .iter()
            .enumerate()
            .map(|(i, p)| (p.article.aid.clone(), i as u32))
            .collect();

        // Directory entries in URL order
        let mut mime_types = MimeTypeTable::new();
        let mut dirents = Vec::with_capacity(pending.len());
        let mut redirect_count = 0u32;
        for p in &pending {
            let article = &p.article;
            let (mime_type, kind) = match &article.kind {
                ArticleKind::Content { .. } => (
                    mime_types.intern(&article.mime_type)?,
                    EntryKind::Content {
                        cluster: 0,
                        blob: 0,
                    },
                ),
                ArticleKind::Redirect { target_aid } => match index_of.get(target_aid) {
                    Some(&target) => {
                        redirect_count += 1;
                        (REDIRECT_MIME, EntryKind::Redirect { target })
                    }
                    None => {
                        warn!(
                            "Redirect {} points at unknown article {}, writing it as deleted",
                            article.aid, target_aid
                        );
                        (DELETED_MIME, EntryKind::Deleted)
                    }
                },
                ArticleKind::LinkTarget => (LINKTARGET_MIME, EntryKind::LinkTarget),
                ArticleKind::Deleted => (DELETED_MIME, EntryKind::Deleted),
            };
            let title = if article.title.is_empty() {
                article.url.clone()
            } else {
                article.title.clone()
            };
            dirents.push(DirectoryEntry {
                mime_type,
                namespace: article.namespace,
                revision: article.revision,
                kind,
                url: article.url.clone(),
                title,
                parameter: article.parameter.clone(),
            });
        }

        let mut title_index: Vec<u32> = (0..article_count).collect();
        title_index.sort_by(|&a, &b| {
            let (da, db) = (&dirents[a as usize], &dirents[b as usize]);
            sort_key((da.namespace, da.title.as_str()), (db.namespace, db.title.as_str())).then(a.cmp(&b))
        });

        let cluster_sizes = self.write_clusters(&pending, &index_of, &mut dirents, sidecar_path, source)?;
        let cluster_count = cluster_sizes.len() as u32;

        let resolve_page = |aid: Option<String>, what: &str| -> Option<u32> {
            let aid = aid?;
            let index = index_of.get(&aid).copied();
            if index.is_none() {
                warn!("{} {} is not in the archive", what, aid);
            }
            index
        };
        let main_page = resolve_page(source.main_page(), "Main page");
        let layout_page = resolve_page(source.layout_page(), "Layout page");
        let uuid = source.uuid();

        let mime_list = mime_types.encode();
        let dirent_bytes: u64 = dirents.iter().map(|d| d.size() as u64).sum();
        let layout = Layout::compute(
            mime_list.len() as u64,
            article_count,
            dirent_bytes,
            cluster_count,
            cluster_sizes.iter().sum(),
        );
        let header = layout.header(uuid, main_page, layout_page);
        header.validate()?;

        let dirent_offsets = Layout::offsets(layout.dirent_pos, dirents.iter().map(|d| d.size() as u64));
        let cluster_offsets = Layout::offsets(layout.cluster_pos, cluster_sizes.iter().copied());

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)?;
        let mut out = HashingWriter::new(BufWriter::new(file));

        out.write_all(&header.to_bytes())?;
        out.write_all(&mime_list)?;
        for offset in &dirent_offsets {
            out.write_all(&offset.to_le_bytes())?;
        }
        for index in &title_index {
            out.write_all(&index.to_le_bytes())?;
        }
        for dirent in &dirents {
            dirent.write_to(&mut out)?;
        }
        for offset in &cluster_offsets {
            out.write_all(&offset.to_le_bytes())?;
        }
        let mut staged = File::open(sidecar_path)?;
        io::copy(&mut staged, &mut out)?;

        let (mut writer, checksum, written) = out.finish();
        if written != layout.checksum_pos {
            return Err(ArchiveError::Corrupted(format!(
                "wrote {} bytes but layout expects {}",
                written, layout.checksum_pos
            )));
        }
        writer.write_all(&checksum)?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| ArchiveError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(tmp_path, dest)?;

        info!(
            "Wrote archive {} ({} entries, {} clusters, {} bytes)",
            dest.display(),
            article_count,
            cluster_count,
            layout.file_size
        );

        Ok(WriteSummary {
            path: dest.to_path_buf(),
            uuid,
            article_count,
            redirect_count,
            cluster_count,
            file_size: layout.file_size,
            checksum,
        })
    }

    /// Pack content into clusters in source order
    ///
    /// Fills in each content dirent's `(cluster, blob)` and returns the
    /// encoded size of every cluster staged in `sidecar_path`.
    fn write_clusters<S: ArticleSource + ?Sized>(
        &self,
        pending: &[Pending],
        index_of: &AHashMap<String, u32>,
        dirents: &mut [DirectoryEntry],
        sidecar_path: &Path,
        source: &mut S,
    ) -> Result<Vec<u64>> {
        let mut order: Vec<usize> = (0..pending.len())
            .filter(|&i| dirents[i].has_content())
            .collect();
        order.sort_by_key(|&i| pending[i].order);

        let mut sidecar = BufWriter::new(File::create(sidecar_path)?);
        let mut sizes = Vec::new();
        let mut builder = ClusterBuilder::new(CompressionMethod::None, self.config.compression_level);
        let mut compress = false;

        for i in order {
            let p = &pending[i];
            let data = match &p.origin {
                Origin::Source => source.data(&p.article.aid)?,
                Origin::Inline(data) => data.clone(),
                Origin::Members(members) => {
                    let indices = members.iter().filter_map(|aid| {
                        let index = index_of.get(aid).map(|&index| index as u64);
                        if index.is_none() {
                            warn!("Category member {} is not in the archive", aid);
                        }
                        index
                    });
                    varint::encode_all(indices)?
                }
            };

            if !builder.is_empty() && builder.data_size() + data.len() > self.config.min_chunk_size {
                sizes.push(self.flush_cluster(&mut builder, compress, &mut sidecar)?);
                compress = false;
            }

            if let ArticleKind::Content { should_compress } = p.article.kind {
                compress |= should_compress;
            }
            let blob = builder.add_blob(data);
            dirents[i].kind = EntryKind::Content {
                cluster: sizes.len() as u32,
                blob,
            };
        }

        if !builder.is_empty() {
            sizes.push(self.flush_cluster(&mut builder, compress, &mut sidecar)?);
        }

        sidecar.flush()?;
        Ok(sizes)
    }

    fn flush_cluster<W: Write>(
        &self,
        builder: &mut ClusterBuilder,
        compress: bool,
        out: &mut W,
    ) -> Result<u64> {
        let method = if compress {
            self.config.compression
        } else {
            CompressionMethod::None
        };
        builder.set_compression(method);
        let bytes = builder.encode()?;
        debug!(
            "Cluster with {} blobs: {} bytes of data, {} bytes stored ({:?})",
            builder.len(),
            builder.data_size(),
            bytes.len(),
            method
        );
        out.write_all(&bytes)?;
        *builder = ClusterBuilder::new(CompressionMethod::None, self.config.compression_level);
        Ok(bytes.len() as u64)
    }
}
