//! Byte layout of a new archive
//!
//! ```text
//! header          80
//! mime list       mime_list_len
//! url pointers    8 * articles
//! title index     4 * articles
//! dirents         dirent_bytes
//! cluster ptrs    8 * clusters
//! clusters        cluster_bytes
//! checksum        16
//! ```

use crate::header::{Header, HEADER_SIZE, NO_PAGE};

/// Size of the trailing MD5 digest
pub const CHECKSUM_SIZE: u64 = 16;

/// Absolute offsets of every section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub article_count: u32,
    pub cluster_count: u32,
    pub mime_list_pos: u64,
    pub url_ptr_pos: u64,
    pub title_idx_pos: u64,
    pub dirent_pos: u64,
    pub cluster_ptr_pos: u64,
    pub cluster_pos: u64,
    pub checksum_pos: u64,
    pub file_size: u64,
}

impl Layout {
    /// Compute section offsets from counts and section sizes
    pub fn compute(
        mime_list_len: u64,
        article_count: u32,
        dirent_bytes: u64,
        cluster_count: u32,
        cluster_bytes: u64,
    ) -> Self {
        let mime_list_pos = HEADER_SIZE as u64;
        let url_ptr_pos = mime_list_pos + mime_list_len;
        let title_idx_pos = url_ptr_pos + 8 * article_count as u64;
        let dirent_pos = title_idx_pos + 4 * article_count as u64;
        let cluster_ptr_pos = dirent_pos + dirent_bytes;
        let cluster_pos = cluster_ptr_pos + 8 * cluster_count as u64;
        let checksum_pos = cluster_pos + cluster_bytes;

        Layout {
            article_count,
            cluster_count,
            mime_list_pos,
            url_ptr_pos,
            title_idx_pos,
            dirent_pos,
            cluster_ptr_pos,
            cluster_pos,
            checksum_pos,
            file_size: checksum_pos + CHECKSUM_SIZE,
        }
    }

    /// Offsets of consecutive records of the given sizes starting at `base`
    pub fn offsets<I: IntoIterator<Item = u64>>(base: u64, sizes: I) -> Vec<u64> {
        let mut offset = base;
        sizes
            .into_iter()
            .map(|size| {
                let current = offset;
                offset += size;
                current
            })
            .collect()
    }

    /// Header describing this layout
    pub fn header(&self, uuid: [u8; 16], main_page: Option<u32>, layout_page: Option<u32>) -> Header {
        Header {
            uuid,
            article_count: self.article_count,
            cluster_count: self.cluster_count,
            url_ptr_pos: self.url_ptr_pos,
            title_idx_pos: self.title_idx_pos,
            cluster_ptr_pos: self.cluster_ptr_pos,
            mime_list_pos: self.mime_list_pos,
            main_page: main_page.unwrap_or(NO_PAGE),
            layout_page: layout_page.unwrap_or(NO_PAGE),
            checksum_pos: self.checksum_pos,
            ..Header::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        let layout = Layout::compute(20, 3, 90, 2, 500);
        assert_eq!(layout.mime_list_pos, 80);
        assert_eq!(layout.url_ptr_pos, 100);
        assert_eq!(layout.title_idx_pos, 124);
        assert_eq!(layout.dirent_pos, 136);
        assert_eq!(layout.cluster_ptr_pos, 226);
        assert_eq!(layout.cluster_pos, 242);
        assert_eq!(layout.checksum_pos, 742);
        assert_eq!(layout.file_size, 758);
    }

    #[test]
    fn test_header_is_valid() {
        let layout = Layout::compute(10, 4, 120, 1, 64);
        let header = layout.header([1; 16], Some(2), None);
        assert!(header.validate().is_ok());
        assert!(header.has_checksum());
        assert_eq!(header.main_page, 2);
        assert!(!header.has_layout_page());
    }

    #[test]
    fn test_empty_archive_layout() {
        let layout = Layout::compute(1, 0, 0, 0, 0);
        assert_eq!(layout.url_ptr_pos, layout.title_idx_pos);
        assert_eq!(layout.cluster_ptr_pos, layout.cluster_pos);
        assert!(layout.header([0; 16], None, None).validate().is_ok());
    }

    #[test]
    fn test_record_offsets() {
        assert_eq!(Layout::offsets(100, [5, 0, 7]), vec![100, 105, 105]);
        assert!(Layout::offsets(0, Vec::<u64>::new()).is_empty());
    }
}
