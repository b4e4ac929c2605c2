//! Article source backed by a directory tree
//!
//! Every regular file becomes one article. Namespaces follow the file type:
//! HTML pages go to `A`, images to `I`, everything else (stylesheets,
//! scripts, fonts) to `-`. Metadata entries `M/Title`, `M/Date` and
//! `M/Counter` are generated, more can be added with
//! [`DirectorySource::with_metadata`].

use super::source::{is_compressible, ArticleKind, ArticleSource, SourceArticle};
use crate::error::{ArchiveError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Guess a mime type from a file extension
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "xml" => "text/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn namespace_for(mime_type: &str) -> char {
    if mime_type == "text/html" {
        'A'
    } else if mime_type.starts_with("image/") {
        'I'
    } else {
        '-'
    }
}

/// Bytes of an HTML file searched for its `<title>`
const TITLE_SCAN_LIMIT: u64 = 16 * 1024;

/// Text between `<title>` and `</title>`, if any
fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = start + lower[start..].find("</title>")?;
    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Title of the HTML file at `path`, looking only at its head
fn read_html_title(path: &Path) -> Option<String> {
    let mut head = Vec::new();
    File::open(path)
        .and_then(|file| file.take(TITLE_SCAN_LIMIT).read_to_end(&mut head))
        .ok()?;
    html_title(&String::from_utf8_lossy(&head))
}

/// Articles read from the files under a root directory
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    articles: Vec<SourceArticle>,
    files: HashMap<String, PathBuf>,
    inline: HashMap<String, Vec<u8>>,
    metadata: BTreeMap<String, String>,
    next: usize,
    main_page: Option<String>,
}

impl DirectorySource {
    /// Scan `root` recursively
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ArchiveError::NotFound(format!(
                "directory {}",
                root.display()
            )));
        }

        let mut articles = Vec::new();
        let mut files = HashMap::new();
        let mut counter: BTreeMap<&'static str, u32> = BTreeMap::new();
        let mut main_page = None;

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| ArchiveError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| ArchiveError::InvalidArticle(e.to_string()))?;
            let url = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let mime_type = guess_mime_type(entry.path());
            let namespace = namespace_for(mime_type);
            let title = if mime_type == "text/html" {
                read_html_title(entry.path()).unwrap_or_default()
            } else {
                String::new()
            };

            let aid = format!("{}/{}", namespace, url);
            if url == "index.html" || (main_page.is_none() && url == "index.htm") {
                main_page = Some(aid.clone());
            }
            *counter.entry(mime_type).or_insert(0) += 1;
            debug!("Found {} as {} ({})", entry.path().display(), aid, mime_type);

            files.insert(aid.clone(), entry.path().to_path_buf());
            articles.push(SourceArticle {
                aid,
                namespace,
                url,
                title,
                mime_type: mime_type.to_string(),
                parameter: Vec::new(),
                revision: 0,
                kind: ArticleKind::Content {
                    should_compress: is_compressible(mime_type),
                },
            });
        }

        let mut metadata = BTreeMap::new();
        let title = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        metadata.insert("Title".to_string(), title);
        metadata.insert(
            "Date".to_string(),
            chrono::Local::now().format("%Y-%m-%d").to_string(),
        );
        let counter = counter
            .iter()
            .map(|(mime, count)| format!("{}={}", mime, count))
            .collect::<Vec<_>>()
            .join(";");
        metadata.insert("Counter".to_string(), counter);

        Ok(DirectorySource {
            root,
            articles,
            files,
            inline: HashMap::new(),
            metadata,
            next: 0,
            main_page,
        })
    }

    /// Set (or override) a metadata entry such as `Language` or `Creator`
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Use the file at `relative` (e.g. `"home.html"`) as the main page
    pub fn with_main_page(mut self, relative: &str) -> Self {
        let mime_type = guess_mime_type(Path::new(relative));
        self.main_page = Some(format!("{}/{}", namespace_for(mime_type), relative));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of file articles found
    pub fn file_count(&self) -> usize {
        self.articles.len()
    }

    fn emit_metadata(&mut self) {
        for (key, value) in std::mem::take(&mut self.metadata) {
            let aid = format!("M/{}", key);
            self.inline.insert(aid.clone(), value.into_bytes());
            self.articles.push(SourceArticle {
                aid,
                namespace: 'M',
                url: key,
                title: String::new(),
                mime_type: "text/plain".to_string(),
                parameter: Vec::new(),
                revision: 0,
                kind: ArticleKind::Content {
                    should_compress: true,
                },
            });
        }
    }
}

impl ArticleSource for DirectorySource {
    fn next_article(&mut self) -> Result<Option<SourceArticle>> {
        if self.next == self.articles.len() && !self.metadata.is_empty() {
            self.emit_metadata();
        }
        let article = self.articles.get(self.next).cloned();
        if article.is_some() {
            self.next += 1;
        }
        Ok(article)
    }

    fn data(&mut self, aid: &str) -> Result<Vec<u8>> {
        if let Some(data) = self.inline.get(aid) {
            return Ok(data.clone());
        }
        let path = self
            .files
            .get(aid)
            .ok_or_else(|| ArchiveError::NotFound(format!("data for article {}", aid)))?;
        Ok(fs::read(path)?)
    }

    fn main_page(&self) -> Option<String> {
        self.main_page.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.html"),
            "<html><head><title>Home</title></head><body>hi</body></html>",
        )
        .unwrap();
        fs::create_dir(dir.path().join("img")).unwrap();
        fs::write(dir.path().join("img").join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.path().join("style.css"), "body { margin: 0 }").unwrap();
        dir
    }

    #[test]
    fn test_mime_guessing() {
        assert_eq!(guess_mime_type(Path::new("a/b.HTML")), "text/html");
        assert_eq!(guess_mime_type(Path::new("x.jpeg")), "image/jpeg");
        assert_eq!(guess_mime_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_html_title() {
        assert_eq!(
            html_title("<HTML><TITLE> Paris </TITLE>").as_deref(),
            Some("Paris")
        );
        assert_eq!(html_title("<p>no title</p>"), None);
    }

    #[test]
    fn test_title_read_from_file_head_only() {
        let dir = TempDir::new().unwrap();
        let padding = "<!-- pad -->".repeat(4096);

        let early = dir.path().join("early.html");
        fs::write(&early, format!("<title>Early</title><body>{}</body>", padding)).unwrap();
        assert_eq!(read_html_title(&early).as_deref(), Some("Early"));

        let late = dir.path().join("late.html");
        fs::write(&late, format!("{}<title>Late</title>", padding)).unwrap();
        assert!(fs::metadata(&late).unwrap().len() > TITLE_SCAN_LIMIT);
        assert_eq!(read_html_title(&late), None);

        assert_eq!(read_html_title(&dir.path().join("absent.html")), None);
    }

    #[test]
    fn test_scan_directory() {
        let dir = site();
        let mut source = DirectorySource::new(dir.path())
            .unwrap()
            .with_metadata("Language", "eng");
        assert_eq!(source.file_count(), 3);
        assert_eq!(source.main_page().as_deref(), Some("A/index.html"));

        let mut articles = Vec::new();
        while let Some(article) = source.next_article().unwrap() {
            articles.push(article);
        }

        let logo = articles.iter().find(|a| a.url == "img/logo.png").unwrap();
        assert_eq!(logo.namespace, 'I');
        let css = articles.iter().find(|a| a.url == "style.css").unwrap();
        assert_eq!(css.namespace, '-');
        let index = articles.iter().find(|a| a.url == "index.html").unwrap();
        assert_eq!(index.title, "Home");

        let counter = articles.iter().find(|a| a.aid == "M/Counter").unwrap();
        assert_eq!(counter.namespace, 'M');
        assert_eq!(
            source.data("M/Counter").unwrap(),
            b"image/png=1;text/css=1;text/html=1".to_vec()
        );
        assert_eq!(source.data("M/Language").unwrap(), b"eng".to_vec());
        assert_eq!(source.data("I/img/logo.png").unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(DirectorySource::new(dir.path().join("absent")).is_err());
    }
}
