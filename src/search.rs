//! Full-text search collaborator
//!
//! The index itself lives outside this crate. [`SearchEngine`] is the seam an
//! index implementation plugs into; [`Searcher`] normalizes the query, clamps
//! the result window and exposes a cursor over the results.

use crate::config::FromToml;
use crate::error::Result;
use crate::text::remove_accents;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative weights the engine applies when scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchWeights {
    pub title: f32,
    pub keywords: f32,
    pub content: f32,
}

impl Default for SearchWeights {
    fn default() -> Self {
        SearchWeights {
            title: 10.0,
            keywords: 3.0,
            content: 1.0,
        }
    }
}

/// Search limits and scoring weights, passed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Largest result window a single query may request
    pub max_results: usize,
    pub weights: SearchWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_results: 70,
            weights: SearchWeights::default(),
        }
    }
}

impl FromToml for SearchConfig {}

/// What the engine is asked for
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery<'a> {
    /// Lowercased, accent-stripped query text
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    pub weights: &'a SearchWeights,
}

/// One ranked hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: u32,
    pub size: Option<u64>,
    pub word_count: Option<u64>,
}

/// Ranked results for a query window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub results: Vec<SearchResult>,
    /// Engine estimate of the total number of matches
    pub estimated_total: usize,
}

/// A full-text index
pub trait SearchEngine {
    fn search(&mut self, query: &SearchQuery<'_>) -> Result<SearchHits>;
}

/// Query front end with a result cursor
pub struct Searcher<E: SearchEngine> {
    engine: E,
    config: SearchConfig,
    pattern: String,
    results: Vec<SearchResult>,
    cursor: usize,
    estimated_total: usize,
    start: usize,
    end: usize,
}

impl<E: SearchEngine> Searcher<E> {
    pub fn new(engine: E, config: SearchConfig) -> Self {
        Searcher {
            engine,
            config,
            pattern: String::new(),
            results: Vec::new(),
            cursor: 0,
            estimated_total: 0,
            start: 0,
            end: 0,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run `query` for results `start..end`
    ///
    /// Swapped bounds are reordered and windows wider than `max_results` are
    /// shrunk. An empty window runs no query.
    pub fn search(&mut self, query: &str, start: usize, end: usize) -> Result<usize> {
        self.reset();

        let (start, mut end) = if start > end { (end, start) } else { (start, end) };
        if start == end {
            return Ok(0);
        }
        if end - start > self.config.max_results {
            end = start + self.config.max_results;
        }

        let text = remove_accents(query);
        debug!("Searching '{}' for results {}..{}", text, start, end);
        let hits = self.engine.search(&SearchQuery {
            text: &text,
            start,
            end,
            weights: &self.config.weights,
        })?;

        self.pattern = query.to_string();
        self.start = start;
        self.end = end;
        self.estimated_total = hits.estimated_total;
        self.results = hits.results;
        self.results.truncate(end - start);
        Ok(self.results.len())
    }

    /// Forget the previous query
    pub fn reset(&mut self) {
        self.pattern.clear();
        self.results.clear();
        self.cursor = 0;
        self.estimated_total = 0;
        self.start = 0;
        self.end = 0;
    }

    pub fn next_result(&mut self) -> Option<&SearchResult> {
        let result = self.results.get(self.cursor);
        if result.is_some() {
            self.cursor += 1;
        }
        result
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Window actually queried
    pub fn window(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn estimated_result_count(&self) -> usize {
        self.estimated_total
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}
