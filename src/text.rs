//! Text helpers used by suggestions and search
//!
//! Case folding goes through [`TextNormalizer`] so callers can plug in a full
//! Unicode implementation. [`DefaultNormalizer`] relies on the standard
//! library's case mapping.

/// Case normalization and case variants of a string
pub trait TextNormalizer: Send + Sync {
    /// Key used to order and deduplicate titles
    fn normalize(&self, text: &str) -> String;

    /// Spellings worth trying for a user-typed prefix, most literal first
    fn case_variants(&self, text: &str) -> Vec<String>;
}

/// Lowercase normalization with ucfirst/lcfirst/title-case variants
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl TextNormalizer for DefaultNormalizer {
    fn normalize(&self, text: &str) -> String {
        text.to_lowercase()
    }

    fn case_variants(&self, text: &str) -> Vec<String> {
        vec![
            text.to_string(),
            ucfirst(text),
            lcfirst(text),
            to_title(text),
        ]
    }
}

/// Uppercase the first character, keep the rest
pub fn ucfirst(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first character, keep the rest
pub fn lcfirst(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the first letter of every word and lowercase the others
pub fn to_title(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            result.push(c);
            word_start = true;
        }
    }
    result
}

/// Lowercase and strip diacritics from Latin-1 letters
///
/// Characters outside the Latin-1 supplement are only lowercased.
pub fn remove_accents(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => result.push('a'),
            'æ' => result.push_str("ae"),
            'ç' => result.push('c'),
            'è' | 'é' | 'ê' | 'ë' => result.push('e'),
            'ì' | 'í' | 'î' | 'ï' => result.push('i'),
            'ñ' => result.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => result.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => result.push('u'),
            'ý' | 'ÿ' => result.push('y'),
            'ß' => result.push_str("ss"),
            other => result.push(other),
        }
    }
    result
}

/// `1234567` -> `"1,234,567"`
pub fn beautify_integer(number: u64) -> String {
    let digits = number.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Human-readable size for a byte count
pub fn beautify_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{} GB", beautify_integer(bytes / GB))
    } else if bytes >= MB {
        format!("{} MB", beautify_integer(bytes / MB))
    } else {
        format!("{} KB", beautify_integer((bytes / KB).max(1)))
    }
}
