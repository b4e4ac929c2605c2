//! Directory entries
//!
//! ```text
//! 0   mime type (or sentinel)   2
//! 2   parameter length          1
//! 3   namespace                 1
//! 4   revision                  4
//! 8   cluster / redirect index  4
//! 12  blob (not for redirects)  4
//!     url NUL, title NUL, parameter bytes
//! ```

use crate::bytes::{read_cstr, read_u16, read_u32};
use crate::error::{ArchiveError, Result};
use crate::mimetypes::{DELETED_MIME, LINKTARGET_MIME, REDIRECT_MIME};
use std::io::Write;

/// What a directory entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Blob `blob` of cluster `cluster`
    Content { cluster: u32, blob: u32 },
    /// Another entry, by URL-order index
    Redirect { target: u32 },
    LinkTarget,
    Deleted,
}

/// Decoded directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Index into the mime table, or one of the sentinels
    pub mime_type: u16,
    pub namespace: char,
    pub revision: u32,
    pub kind: EntryKind,
    pub url: String,
    /// Equal to `url` when the stored title is empty
    pub title: String,
    pub parameter: Vec<u8>,
}

impl DirectoryEntry {
    /// Build a content entry
    pub fn content(namespace: char, url: &str, title: &str, mime_type: u16) -> Self {
        DirectoryEntry {
            mime_type,
            namespace,
            revision: 0,
            kind: EntryKind::Content {
                cluster: 0,
                blob: 0,
            },
            url: url.to_string(),
            title: if title.is_empty() { url } else { title }.to_string(),
            parameter: Vec::new(),
        }
    }

    /// Build a redirect entry
    pub fn redirect(namespace: char, url: &str, title: &str, target: u32) -> Self {
        DirectoryEntry {
            mime_type: REDIRECT_MIME,
            kind: EntryKind::Redirect { target },
            ..Self::content(namespace, url, title, REDIRECT_MIME)
        }
    }

    /// Decode an entry from the start of `bytes`
    ///
    /// A truncated buffer yields an `UnexpectedEof` I/O error so the caller
    /// can retry with a larger window.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mime_type = read_u16(bytes, 0)?;
        let extra_len = read_u16(bytes, 2)?;
        let parameter_len = (extra_len & 0xFF) as usize;
        let namespace = (extra_len >> 8) as u8 as char;
        let revision = read_u32(bytes, 4)?;

        let (kind, strings_at) = match mime_type {
            REDIRECT_MIME => (
                EntryKind::Redirect {
                    target: read_u32(bytes, 8)?,
                },
                12,
            ),
            LINKTARGET_MIME => {
                read_u32(bytes, 12)?;
                (EntryKind::LinkTarget, 16)
            }
            DELETED_MIME => {
                read_u32(bytes, 12)?;
                (EntryKind::Deleted, 16)
            }
            _ => (
                EntryKind::Content {
                    cluster: read_u32(bytes, 8)?,
                    blob: read_u32(bytes, 12)?,
                },
                16,
            ),
        };

        let (url, title_at) = read_cstr(bytes, strings_at)?;
        let (title, parameter_at) = read_cstr(bytes, title_at)?;

        let parameter_end = parameter_at + parameter_len;
        if bytes.len() < parameter_end {
            return Err(ArchiveError::eof("dirent parameter"));
        }
        let parameter = bytes[parameter_at..parameter_end].to_vec();

        let title = if title.is_empty() { url.clone() } else { title };

        Ok(DirectoryEntry {
            mime_type,
            namespace,
            revision,
            kind,
            url,
            title,
            parameter,
        })
    }

    /// Write the encoded entry
    ///
    /// The parameter must fit in 255 bytes and the namespace in one byte; the
    /// writer checks both before encoding.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(&self.mime_type.to_le_bytes())?;
        out.write_all(&[self.parameter.len() as u8, self.namespace as u8])?;
        out.write_all(&self.revision.to_le_bytes())?;

        match self.kind {
            EntryKind::Content { cluster, blob } => {
                out.write_all(&cluster.to_le_bytes())?;
                out.write_all(&blob.to_le_bytes())?;
            }
            EntryKind::Redirect { target } => {
                out.write_all(&target.to_le_bytes())?;
            }
            EntryKind::LinkTarget | EntryKind::Deleted => {
                out.write_all(&[0u8; 8])?;
            }
        }

        out.write_all(self.url.as_bytes())?;
        out.write_all(&[0])?;
        if self.title != self.url {
            out.write_all(self.title.as_bytes())?;
        }
        out.write_all(&[0])?;
        out.write_all(&self.parameter)?;
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.size());
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        let fixed = if self.is_redirect() { 12 } else { 16 };
        let title = if self.title != self.url {
            self.title.len()
        } else {
            0
        };
        fixed + self.url.len() + title + self.parameter.len() + 2
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, EntryKind::Redirect { .. })
    }

    pub fn is_link_target(&self) -> bool {
        matches!(self.kind, EntryKind::LinkTarget)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.kind, EntryKind::Deleted)
    }

    pub fn has_content(&self) -> bool {
        matches!(self.kind, EntryKind::Content { .. })
    }

    pub fn redirect_index(&self) -> Option<u32> {
        match self.kind {
            EntryKind::Redirect { target } => Some(target),
            _ => None,
        }
    }

    /// `(cluster, blob)` for content entries
    pub fn content_location(&self) -> Option<(u32, u32)> {
        match self.kind {
            EntryKind::Content { cluster, blob } => Some((cluster, blob)),
            _ => None,
        }
    }

    /// `<namespace>/<url>`
    pub fn long_url(&self) -> String {
        format!("{}/{}", self.namespace, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_entry_roundtrip() {
        let mut entry = DirectoryEntry::content('A', "Main_Page", "Main Page", 0);
        entry.kind = EntryKind::Content {
            cluster: 3,
            blob: 7,
        };
        entry.revision = 2;

        let bytes = entry.encode().unwrap();
        assert_eq!(bytes.len(), entry.size());
        assert_eq!(DirectoryEntry::decode(&bytes).unwrap(), entry);
        assert_eq!(entry.content_location(), Some((3, 7)));
        assert_eq!(entry.long_url(), "A/Main_Page");
    }

    #[test]
    fn test_title_equal_to_url_is_elided() {
        let entry = DirectoryEntry::content('A', "Paris", "Paris", 0);
        let bytes = entry.encode().unwrap();
        assert_eq!(entry.size(), 16 + 5 + 2);
        assert_eq!(&bytes[16..], b"Paris\0\0");

        let decoded = DirectoryEntry::decode(&bytes).unwrap();
        assert_eq!(decoded.title, "Paris");
    }

    #[test]
    fn test_redirect_entry() {
        let entry = DirectoryEntry::redirect('A', "Lutece", "Lutèce", 12);
        assert!(entry.is_redirect());
        assert_eq!(entry.mime_type, REDIRECT_MIME);

        let bytes = entry.encode().unwrap();
        assert_eq!(bytes.len(), 12 + "Lutece".len() + "Lutèce".len() + 2);

        let decoded = DirectoryEntry::decode(&bytes).unwrap();
        assert_eq!(decoded.redirect_index(), Some(12));
        assert_eq!(decoded.title, "Lutèce");
    }

    #[test]
    fn test_parameter_bytes() {
        let mut entry = DirectoryEntry::content('-', "style.css", "", 1);
        entry.parameter = vec![1, 2, 3];

        let bytes = entry.encode().unwrap();
        assert_eq!(bytes[2], 3);
        assert_eq!(bytes[3], b'-');

        let decoded = DirectoryEntry::decode(&bytes).unwrap();
        assert_eq!(decoded.parameter, vec![1, 2, 3]);
        assert_eq!(decoded.size(), bytes.len());
    }

    #[test]
    fn test_deleted_and_linktarget() {
        let mut entry = DirectoryEntry::content('A', "gone", "", DELETED_MIME);
        entry.kind = EntryKind::Deleted;
        let decoded = DirectoryEntry::decode(&entry.encode().unwrap()).unwrap();
        assert!(decoded.is_deleted());
        assert!(!decoded.has_content());

        entry.mime_type = LINKTARGET_MIME;
        entry.kind = EntryKind::LinkTarget;
        let decoded = DirectoryEntry::decode(&entry.encode().unwrap()).unwrap();
        assert!(decoded.is_link_target());
    }

    #[test]
    fn test_truncated_entry_is_eof() {
        let mut entry = DirectoryEntry::content('A', "A_rather_long_url", "Title", 0);
        entry.parameter = vec![9; 4];
        let bytes = entry.encode().unwrap();

        for cut in [4, 10, 20, bytes.len() - 1] {
            assert!(
                DirectoryEntry::decode(&bytes[..cut])
                    .unwrap_err()
                    .is_unexpected_eof(),
                "cut at {}",
                cut
            );
        }
    }
}
