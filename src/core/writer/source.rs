//! Article sources feeding the writer
//!
//! Articles are identified by an `aid` string chosen by the source. Redirects,
//! the main page and category members refer to other articles by aid; the
//! writer maps aids to entry indices once everything is sorted.

use crate::error::{ArchiveError, Result};
use std::collections::HashMap;

/// What the writer should produce for an article
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleKind {
    /// Stored content, compressed when `should_compress`
    Content { should_compress: bool },
    /// Redirect to another article
    Redirect { target_aid: String },
    LinkTarget,
    Deleted,
}

/// One article as described by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArticle {
    pub aid: String,
    pub namespace: char,
    pub url: String,
    /// Empty means "same as url"
    pub title: String,
    pub mime_type: String,
    pub parameter: Vec<u8>,
    pub revision: u32,
    pub kind: ArticleKind,
}

/// A category page and its members
///
/// Written as a `U/<url>` text entry plus a `V/<url>` entry listing member
/// entry indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub url: String,
    pub title: String,
    pub data: Vec<u8>,
    pub members: Vec<String>,
}

/// Supplies articles to [`ArchiveWriter`](super::ArchiveWriter)
pub trait ArticleSource {
    /// Next article, `None` when exhausted
    fn next_article(&mut self) -> Result<Option<SourceArticle>>;

    /// Content bytes of a content article
    fn data(&mut self, aid: &str) -> Result<Vec<u8>>;

    fn next_category(&mut self) -> Result<Option<Category>> {
        Ok(None)
    }

    /// Archive identifier, random unless the source fixes one
    fn uuid(&self) -> [u8; 16] {
        rand::random()
    }

    /// Aid of the main page
    fn main_page(&self) -> Option<String> {
        None
    }

    /// Aid of the layout page
    fn layout_page(&self) -> Option<String> {
        None
    }
}

/// Whether content of this mime type is worth compressing
pub fn is_compressible(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
        || mime_type.contains("javascript")
        || mime_type.contains("json")
        || mime_type.contains("xml")
}

/// In-memory article source
///
/// Aids are long URLs (`"A/Main_Page"`).
///
/// ```rust
/// use zimkit::writer::{ArticleSource, MemorySource};
///
/// let mut source = MemorySource::new();
/// source.add_html('A', "Main_Page", "Main Page", "<p>Welcome</p>");
/// source.add_redirect('A', "Home", "", "A/Main_Page");
/// source.set_main_page("A/Main_Page");
///
/// assert_eq!(source.main_page().as_deref(), Some("A/Main_Page"));
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    articles: Vec<SourceArticle>,
    data: HashMap<String, Vec<u8>>,
    categories: Vec<Category>,
    next: usize,
    next_category: usize,
    uuid: Option<[u8; 16]>,
    main_page: Option<String>,
    layout_page: Option<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an article with explicit metadata
    pub fn add_article(&mut self, article: SourceArticle, data: Vec<u8>) {
        self.data.insert(article.aid.clone(), data);
        self.articles.push(article);
    }

    /// Add a content article; compression follows the mime type
    pub fn add_content(
        &mut self,
        namespace: char,
        url: &str,
        title: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) {
        let article = SourceArticle {
            aid: format!("{}/{}", namespace, url),
            namespace,
            url: url.to_string(),
            title: title.to_string(),
            mime_type: mime_type.to_string(),
            parameter: Vec::new(),
            revision: 0,
            kind: ArticleKind::Content {
                should_compress: is_compressible(mime_type),
            },
        };
        self.add_article(article, data);
    }

    pub fn add_html(&mut self, namespace: char, url: &str, title: &str, html: &str) {
        self.add_content(namespace, url, title, "text/html", html.as_bytes().to_vec());
    }

    /// Add a redirect to the article with aid `target`
    pub fn add_redirect(&mut self, namespace: char, url: &str, title: &str, target: &str) {
        let article = SourceArticle {
            aid: format!("{}/{}", namespace, url),
            namespace,
            url: url.to_string(),
            title: title.to_string(),
            mime_type: String::new(),
            parameter: Vec::new(),
            revision: 0,
            kind: ArticleKind::Redirect {
                target_aid: target.to_string(),
            },
        };
        self.articles.push(article);
    }

    pub fn add_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    pub fn set_main_page(&mut self, aid: &str) {
        self.main_page = Some(aid.to_string());
    }

    pub fn set_layout_page(&mut self, aid: &str) {
        self.layout_page = Some(aid.to_string());
    }

    pub fn set_uuid(&mut self, uuid: [u8; 16]) {
        self.uuid = Some(uuid);
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

impl ArticleSource for MemorySource {
    fn next_article(&mut self) -> Result<Option<SourceArticle>> {
        let article = self.articles.get(self.next).cloned();
        if article.is_some() {
            self.next += 1;
        }
        Ok(article)
    }

    fn data(&mut self, aid: &str) -> Result<Vec<u8>> {
        self.data
            .get(aid)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(format!("data for article {}", aid)))
    }

    fn next_category(&mut self) -> Result<Option<Category>> {
        let category = self.categories.get(self.next_category).cloned();
        if category.is_some() {
            self.next_category += 1;
        }
        Ok(category)
    }

    fn uuid(&self) -> [u8; 16] {
        self.uuid.unwrap_or_else(rand::random)
    }

    fn main_page(&self) -> Option<String> {
        self.main_page.clone()
    }

    fn layout_page(&self) -> Option<String> {
        self.layout_page.clone()
    }
}
