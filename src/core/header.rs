use crate::bytes::{read_u16, read_u32, read_u64};
use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};

pub const MAGIC: u32 = 0x044D_495A;
pub const VERSION_MAJOR: u16 = 5;
pub const VERSION_MINOR: u16 = 0;
pub const HEADER_SIZE: usize = 80;

/// Page index meaning "no such page"
pub const NO_PAGE: u32 = u32::MAX;

/// Archive header
///
/// The header occupies the first 80 bytes of the archive. Every table is
/// located through an absolute byte offset stored here:
///
/// ```text
/// 0   magic            4    24  article count     4    56  mime list pos   8
/// 4   major version    2    28  cluster count     4    64  main page       4
/// 6   minor version    2    32  url pointer pos   8    68  layout page     4
/// 8   uuid            16    40  title index pos   8    72  checksum pos    8
///                           48  cluster ptr pos   8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Magic number: 0x044D495A ("ZIM\x04")
    pub magic: u32,

    /// Format version (major)
    pub version_major: u16,

    /// Format version (minor)
    pub version_minor: u16,

    /// Archive identifier
    pub uuid: [u8; 16],

    /// Number of directory entries
    pub article_count: u32,

    /// Number of clusters
    pub cluster_count: u32,

    /// Offset of the URL pointer table (u64 per entry)
    pub url_ptr_pos: u64,

    /// Offset of the title index (u32 per entry)
    pub title_idx_pos: u64,

    /// Offset of the cluster pointer table (u64 per cluster)
    pub cluster_ptr_pos: u64,

    /// Offset of the mime type list
    pub mime_list_pos: u64,

    /// Entry index of the main page, `NO_PAGE` when absent
    pub main_page: u32,

    /// Entry index of the layout page, `NO_PAGE` when absent
    pub layout_page: u32,

    /// Offset of the trailing MD5 digest
    pub checksum_pos: u64,
}

impl Header {
    /// Create a header for an empty archive
    pub fn new() -> Self {
        Header {
            magic: MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            uuid: [0; 16],
            article_count: 0,
            cluster_count: 0,
            url_ptr_pos: 0,
            title_idx_pos: 0,
            cluster_ptr_pos: 0,
            mime_list_pos: HEADER_SIZE as u64,
            main_page: NO_PAGE,
            layout_page: NO_PAGE,
            checksum_pos: 0,
        }
    }

    /// Validate magic, version and table ordering
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(ArchiveError::InvalidFormat(format!(
                "bad magic number {:#010x}",
                self.magic
            )));
        }

        if self.version_major != VERSION_MAJOR {
            return Err(ArchiveError::InvalidFormat(format!(
                "unsupported version {}.{}",
                self.version_major, self.version_minor
            )));
        }

        if self.mime_list_pos >= self.url_ptr_pos {
            return Err(ArchiveError::Corrupted(format!(
                "mime list ({}) must precede url pointers ({})",
                self.mime_list_pos, self.url_ptr_pos
            )));
        }

        if self.url_ptr_pos > self.title_idx_pos {
            return Err(ArchiveError::Corrupted(format!(
                "url pointers ({}) must precede title index ({})",
                self.url_ptr_pos, self.title_idx_pos
            )));
        }

        if self.title_idx_pos > self.cluster_ptr_pos {
            return Err(ArchiveError::Corrupted(format!(
                "title index ({}) must precede cluster pointers ({})",
                self.title_idx_pos, self.cluster_ptr_pos
            )));
        }

        if self.has_checksum() && self.cluster_ptr_pos > self.checksum_pos {
            return Err(ArchiveError::Corrupted(format!(
                "cluster pointers ({}) must precede checksum ({})",
                self.cluster_ptr_pos, self.checksum_pos
            )));
        }

        Ok(())
    }

    pub fn has_main_page(&self) -> bool {
        self.main_page != NO_PAGE
    }

    pub fn has_layout_page(&self) -> bool {
        self.layout_page != NO_PAGE
    }

    /// Archives written before checksums existed put the mime list inside
    /// the 80-byte header area.
    pub fn has_checksum(&self) -> bool {
        self.mime_list_pos >= HEADER_SIZE as u64
    }

    pub fn checksum_pos(&self) -> Option<u64> {
        self.has_checksum().then_some(self.checksum_pos)
    }

    /// UUID formatted as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
    pub fn uuid_string(&self) -> String {
        let hex: String = self.uuid.iter().map(|b| format!("{:02x}", b)).collect();
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);

        bytes.extend_from_slice(&self.magic.to_le_bytes());
        bytes.extend_from_slice(&self.version_major.to_le_bytes());
        bytes.extend_from_slice(&self.version_minor.to_le_bytes());
        bytes.extend_from_slice(&self.uuid);
        bytes.extend_from_slice(&self.article_count.to_le_bytes());
        bytes.extend_from_slice(&self.cluster_count.to_le_bytes());
        bytes.extend_from_slice(&self.url_ptr_pos.to_le_bytes());
        bytes.extend_from_slice(&self.title_idx_pos.to_le_bytes());
        bytes.extend_from_slice(&self.cluster_ptr_pos.to_le_bytes());
        bytes.extend_from_slice(&self.mime_list_pos.to_le_bytes());
        bytes.extend_from_slice(&self.main_page.to_le_bytes());
        bytes.extend_from_slice(&self.layout_page.to_le_bytes());
        bytes.extend_from_slice(&self.checksum_pos.to_le_bytes());

        bytes
    }

    /// Deserialize and validate a header
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ArchiveError::eof("header"));
        }

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&bytes[8..24]);

        let header = Header {
            magic: read_u32(bytes, 0)?,
            version_major: read_u16(bytes, 4)?,
            version_minor: read_u16(bytes, 6)?,
            uuid,
            article_count: read_u32(bytes, 24)?,
            cluster_count: read_u32(bytes, 28)?,
            url_ptr_pos: read_u64(bytes, 32)?,
            title_idx_pos: read_u64(bytes, 40)?,
            cluster_ptr_pos: read_u64(bytes, 48)?,
            mime_list_pos: read_u64(bytes, 56)?,
            main_page: read_u32(bytes, 64)?,
            layout_page: read_u32(bytes, 68)?,
            checksum_pos: read_u64(bytes, 72)?,
        };

        header.validate()?;

        Ok(header)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
