//! Title-prefix suggestions
//!
//! Results accumulate in a [`SuggestionBuffer`] ordered by normalized title,
//! then canonical URL, so several prefix spellings can be merged into one
//! list and consumed through a cursor.

use crate::archive::Archive;
use crate::error::Result;
use crate::text::TextNormalizer;
use crate::url::long_url;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// One suggested page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Title as stored in the archive
    pub title: String,
    /// Content path of the page after following redirects
    pub url: String,
    /// Ordering key
    pub normalized: String,
}

impl Suggestion {
    fn cmp_key(&self, normalized: &str, url: &str) -> Ordering {
        self.normalized
            .as_str()
            .cmp(normalized)
            .then_with(|| self.url.as_str().cmp(url))
    }
}

/// Ordered, deduplicated suggestions with a read cursor
#[derive(Debug, Clone, Default)]
pub struct SuggestionBuffer {
    items: Vec<Suggestion>,
    cursor: usize,
}

impl SuggestionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every suggestion
    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = 0;
    }

    /// Insert in order; false if the same normalized title and URL is present
    pub fn insert(&mut self, suggestion: Suggestion) -> bool {
        let position = self
            .items
            .binary_search_by(|s| s.cmp_key(&suggestion.normalized, &suggestion.url));
        match position {
            Ok(_) => false,
            Err(pos) => {
                self.items.insert(pos, suggestion);
                true
            }
        }
    }

    /// Next suggestion under the cursor
    pub fn next_suggestion(&mut self) -> Option<Suggestion> {
        let item = self.items.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    /// Move the cursor back to the first suggestion
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        self.items.iter()
    }

    /// Walk titles in `namespace` starting with `prefix` and add them
    ///
    /// Stops once the buffer holds `limit` suggestions. Without `reset`, a
    /// buffer that is already full is left untouched. Returns whether any
    /// title matched.
    #[allow(clippy::too_many_arguments)]
    pub fn search(
        &mut self,
        archive: &mut Archive,
        namespace: char,
        prefix: &str,
        limit: usize,
        reset: bool,
        max_hops: usize,
        normalizer: &dyn TextNormalizer,
    ) -> Result<bool> {
        if reset {
            self.clear();
        } else if self.items.len() >= limit {
            return Ok(false);
        }
        if prefix.is_empty() {
            return Ok(false);
        }

        let mut found = false;
        let mut rank = archive.lower_bound_by_title(namespace, prefix)?;
        while rank < archive.article_count() && self.items.len() < limit {
            let dirent = archive.get_dirent_by_title_rank(rank)?;
            if dirent.namespace != namespace || !dirent.title.starts_with(prefix) {
                break;
            }
            rank += 1;

            let index = archive.title_index(rank - 1)?;
            let target = match archive.resolve_redirects(index, max_hops)? {
                Some((_, target)) if !target.is_deleted() => target,
                _ => {
                    debug!("Skipping suggestion {} with unresolved target", dirent.title);
                    continue;
                }
            };

            found = true;
            self.insert(Suggestion {
                normalized: normalizer.normalize(&dirent.title),
                url: long_url(target.namespace, &target.url),
                title: dirent.title,
            });
        }

        self.cursor = 0;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(title: &str, url: &str) -> Suggestion {
        Suggestion {
            title: title.to_string(),
            url: url.to_string(),
            normalized: title.to_lowercase(),
        }
    }

    #[test]
    fn test_insert_orders_and_dedupes() {
        let mut buffer = SuggestionBuffer::new();
        assert!(buffer.insert(suggestion("Cat", "/A/Cat")));
        assert!(buffer.insert(suggestion("Cab", "/A/Cab")));
        assert!(buffer.insert(suggestion("car", "/A/Car")));
        assert!(!buffer.insert(suggestion("CAT", "/A/Cat")));
        // Same title, different page
        assert!(buffer.insert(suggestion("Cat", "/A/Cat_(animal)")));

        let titles: Vec<_> = buffer.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(titles, vec!["/A/Cab", "/A/Car", "/A/Cat", "/A/Cat_(animal)"]);
    }

    #[test]
    fn test_cursor() {
        let mut buffer = SuggestionBuffer::new();
        buffer.insert(suggestion("b", "/A/b"));
        buffer.insert(suggestion("a", "/A/a"));

        assert_eq!(buffer.next_suggestion().unwrap().title, "a");
        assert_eq!(buffer.next_suggestion().unwrap().title, "b");
        assert!(buffer.next_suggestion().is_none());

        buffer.rewind();
        assert_eq!(buffer.next_suggestion().unwrap().title, "a");

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.next_suggestion().is_none());
    }
}
