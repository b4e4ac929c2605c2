use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    #[error("Archive is corrupted: {0}")]
    Corrupted(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed variable-length integer")]
    MalformedVarInt,

    #[error("Unsupported cluster compression: {0}")]
    UnsupportedCompression(u8),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Invalid article: {0}")]
    InvalidArticle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArchiveError {
    /// True when the error is a short read, i.e. the caller should retry with
    /// a larger window or the file is truncated.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, ArchiveError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }

    pub(crate) fn eof(what: &str) -> Self {
        ArchiveError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("Insufficient bytes for {}", what),
        ))
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
