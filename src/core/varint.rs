//! Self-describing variable-length unsigned integers
//!
//! Used by auxiliary index records (category member lists). The number of
//! leading one bits in the first byte is the number of continuation bytes
//! that follow, so a reader never needs an external length.
//!
//! ```text
//! first byte   extra   range
//! 0xxx xxxx    0       0 .. 127
//! 10xx xxxx    1       128 .. 16511
//! 110x xxxx    2       16512 .. 2113663
//! 1110 xxxx    3       2113664 .. 270549119
//! ...
//! 1111 1110    7       up to TIER_START[8] - 1
//! ```
//!
//! Each tier is biased by the exclusive upper bound of the previous one, so a
//! two-byte zero means 128. The free low bits of the first byte carry the least
//! significant bits of the biased value, continuation bytes follow
//! little-endian.

use crate::error::{ArchiveError, Result};
use std::io::{Read, Write};

/// Maximum number of continuation bytes.
pub const MAX_EXTRA_BYTES: usize = 7;

/// First value of each tier (tier = number of continuation bytes).
const TIER_START: [u64; MAX_EXTRA_BYTES + 2] = [
    0,
    0x80,
    0x4080,
    0x20_4080,
    0x1020_4080,
    0x8_1020_4080,
    0x408_1020_4080,
    0x2_0408_1020_4080,
    0x102_0408_1020_4080,
];

/// Largest value that can be encoded.
pub const MAX_VALUE: u64 = TIER_START[MAX_EXTRA_BYTES + 1] - 1;

fn tier_of(value: u64) -> Result<usize> {
    (0..=MAX_EXTRA_BYTES)
        .find(|&n| value < TIER_START[n + 1])
        .ok_or(ArchiveError::MalformedVarInt)
}

/// Number of bytes `value` occupies once encoded
pub fn encoded_len(value: u64) -> Result<usize> {
    Ok(tier_of(value)? + 1)
}

/// Encode `value` into `out`
pub fn encode<W: Write>(out: &mut W, value: u64) -> Result<()> {
    let extra = tier_of(value)?;
    let biased = value - TIER_START[extra];

    let prefix = !(0xFFu8 >> extra);
    let data_mask = 0x7Fu8 >> extra;

    let mut buf = [0u8; MAX_EXTRA_BYTES + 1];
    buf[0] = prefix | (biased as u8 & data_mask);

    let mut rest = biased >> (7 - extra);
    for byte in buf.iter_mut().skip(1).take(extra) {
        *byte = rest as u8;
        rest >>= 8;
    }

    out.write_all(&buf[..=extra])?;
    Ok(())
}

/// Encode a value into a fresh buffer
pub fn encode_to_vec(value: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(MAX_EXTRA_BYTES + 1);
    encode(&mut out, value)?;
    Ok(out)
}

/// Decode one value from `input`
///
/// Fails with `MalformedVarInt` if the stream ends before the value is
/// complete or the first byte announces more than 7 continuation bytes.
pub fn decode<R: Read>(input: &mut R) -> Result<u64> {
    let mut first = [0u8; 1];
    input
        .read_exact(&mut first)
        .map_err(|_| ArchiveError::MalformedVarInt)?;

    let extra = first[0].leading_ones() as usize;
    if extra > MAX_EXTRA_BYTES {
        return Err(ArchiveError::MalformedVarInt);
    }

    let mut value = (first[0] & (0x7F >> extra)) as u64;
    let mut shift = 7 - extra as u32;

    let mut cont = [0u8; MAX_EXTRA_BYTES];
    input
        .read_exact(&mut cont[..extra])
        .map_err(|_| ArchiveError::MalformedVarInt)?;
    for &byte in &cont[..extra] {
        value |= (byte as u64) << shift;
        shift += 8;
    }

    Ok(value + TIER_START[extra])
}

/// Decode one value from the front of `bytes`, returning it and the number of
/// bytes consumed
pub fn decode_slice(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut cursor = bytes;
    let value = decode(&mut cursor)?;
    Ok((value, bytes.len() - cursor.len()))
}

/// Decode a packed sequence of values until `bytes` is exhausted
pub fn decode_all(bytes: &[u8]) -> Result<Vec<u64>> {
    let mut values = Vec::new();
    let mut cursor = bytes;
    while !cursor.is_empty() {
        values.push(decode(&mut cursor)?);
    }
    Ok(values)
}

/// Encode a sequence of values back to back
pub fn encode_all<I: IntoIterator<Item = u64>>(values: I) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for value in values {
        encode(&mut out, value)?;
    }
    Ok(out)
}
