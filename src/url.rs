//! Content path protocol
//!
//! Documents are addressed as `/<namespace>/<url>`, e.g. `/A/Main_Page` or
//! `/I/logo.png`. Paths arriving from a browser are percent-encoded.

/// A parsed content path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPath {
    /// `None` when the path has no single-character first segment
    pub namespace: Option<char>,
    pub url: String,
}

impl ContentPath {
    /// Empty path without a namespace, i.e. a request for the main page
    pub fn is_main_page_request(&self) -> bool {
        self.namespace.is_none() && self.url.is_empty()
    }
}

/// Split `/<ns>/<url>` into its parts
///
/// Leading and separating slashes are skipped. No decoding happens here.
pub fn parse_content_path(path: &str) -> ContentPath {
    let trimmed = path.trim_start_matches('/');
    let (first, rest) = match trimmed.find('/') {
        Some(pos) => (&trimmed[..pos], trimmed[pos..].trim_start_matches('/')),
        None => (trimmed, ""),
    };

    let mut chars = first.chars();
    match (chars.next(), chars.next()) {
        (Some(ns), None) => ContentPath {
            namespace: Some(ns),
            url: rest.to_string(),
        },
        (None, _) => ContentPath {
            namespace: None,
            url: String::new(),
        },
        _ => ContentPath {
            namespace: None,
            url: trimmed.to_string(),
        },
    }
}

/// `/<ns>/<url>`
pub fn long_url(namespace: char, url: &str) -> String {
    format!("/{}/{}", namespace, url)
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'~' | b'!' | b'*' | b'(' | b')' | b'\'')
}

/// Percent-encode everything but ASCII alphanumerics and `~!*()'`
pub fn url_encode(text: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut encoded = String::with_capacity(text.len());
    for &byte in text.as_bytes() {
        if is_unreserved(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[(byte >> 4) as usize] as char);
            encoded.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    encoded
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode `%XX` escapes
///
/// Malformed escapes are kept literally; invalid UTF-8 is replaced.
pub fn url_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                decoded.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
