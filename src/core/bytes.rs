//! Little-endian field access over byte slices
//!
//! All multi-byte integers in the archive are stored little-endian. These
//! helpers bounds-check and return `UnexpectedEof` instead of panicking.

use crate::error::{ArchiveError, Result};

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> Result<u16> {
    let end = offset + 2;
    if bytes.len() < end {
        return Err(ArchiveError::eof("u16 field"));
    }
    Ok(u16::from_le_bytes([bytes[offset], bytes[offset + 1]]))
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let end = offset + 4;
    if bytes.len() < end {
        return Err(ArchiveError::eof("u32 field"));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..end]);
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> Result<u64> {
    let end = offset + 8;
    if bytes.len() < end {
        return Err(ArchiveError::eof("u64 field"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..end]);
    Ok(u64::from_le_bytes(buf))
}

/// Read a NUL-terminated string starting at `offset`.
///
/// Returns the string and the offset just past the terminator.
pub(crate) fn read_cstr(bytes: &[u8], offset: usize) -> Result<(String, usize)> {
    if offset > bytes.len() {
        return Err(ArchiveError::eof("string"));
    }
    let rest = &bytes[offset..];
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ArchiveError::eof("string terminator"))?;
    let value = String::from_utf8_lossy(&rest[..len]).into_owned();
    Ok((value, offset + len + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16(&bytes, 0).unwrap(), 0x0201);
        assert_eq!(read_u32(&bytes, 4).unwrap(), 0x08070605);
        assert_eq!(read_u64(&bytes, 0).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn test_short_reads_are_eof() {
        let bytes = [0u8; 3];
        assert!(read_u32(&bytes, 0).unwrap_err().is_unexpected_eof());
        assert!(read_u16(&bytes, 2).unwrap_err().is_unexpected_eof());
    }

    #[test]
    fn test_read_cstr() {
        let bytes = b"abc\0de\0";
        let (first, next) = read_cstr(bytes, 0).unwrap();
        assert_eq!(first, "abc");
        let (second, end) = read_cstr(bytes, next).unwrap();
        assert_eq!(second, "de");
        assert_eq!(end, bytes.len());
        assert!(read_cstr(b"open", 0).unwrap_err().is_unexpected_eof());
    }
}
