//! Cross-page search index
//!
//! A query is matched against every text item of every page, in page order
//! and then item order. Matching is case-insensitive and works at item
//! granularity: an item containing the query three times is still one hit.
//!
//! Scans run incrementally through [`SearchScan::step`], a bounded number of
//! pages at a time, so the host can keep handling input between steps.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, warn};
use lru::LruCache;
use regex::{Regex, RegexBuilder};

use super::generation::Generation;
use crate::document::{DocumentHandle, TextItem};
use crate::error::ViewerError;

/// Snippets longer than this are truncated
pub const SNIPPET_MAX_CHARS: usize = 160;

/// One matching text item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchMatch {
    pub page: usize,
    pub item_index: usize,
    pub snippet: String,
    /// 1-based position among all matches of the document
    pub global_ordinal: usize,
    /// Number of matches on `page`
    pub page_match_count: usize,
}

/// Case-insensitive literal matcher for one query
#[derive(Clone, Debug)]
pub struct QueryMatcher {
    query: String,
    regex: Regex,
}

impl QueryMatcher {
    /// `None` for queries that are empty after trimming
    pub fn new(query: &str) -> Option<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }

        match RegexBuilder::new(&regex::escape(trimmed))
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Some(Self {
                query: trimmed.to_string(),
                regex,
            }),
            Err(e) => {
                warn!("Unusable search query {trimmed:?}: {e}");
                None
            }
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Byte ranges of every occurrence in `text`
    pub fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        self.regex.find_iter(text).map(|m| m.range()).collect()
    }
}

fn snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_MAX_CHARS {
        let truncated: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

/// Per-document text access and search entry point
pub struct DocumentIndex {
    handle: DocumentHandle,
    items: LruCache<usize, Arc<[TextItem]>>,
}

impl DocumentIndex {
    pub fn new(handle: DocumentHandle, cache_pages: usize) -> Self {
        Self {
            handle,
            items: LruCache::new(NonZeroUsize::new(cache_pages).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn page_count(&self) -> usize {
        self.handle.page_count()
    }

    /// Text items of `page`, materialised through the decode collaborator on
    /// first use. Failures are not cached.
    pub fn page_items(&mut self, page: usize) -> Result<Arc<[TextItem]>, ViewerError> {
        if let Some(items) = self.items.get(&page) {
            return Ok(Arc::clone(items));
        }

        let items: Arc<[TextItem]> = self
            .handle
            .document()
            .text_items(page)
            .map_err(|fault| ViewerError::from_extraction(page, &fault))?
            .into();
        self.items.put(page, Arc::clone(&items));
        Ok(items)
    }

    /// Starts a scan for `query`; nothing is read until it is stepped
    pub fn begin(&self, query: &str, generation: Generation) -> SearchScan {
        SearchScan::new(query, generation, self.page_count())
    }

    /// Runs a whole scan synchronously
    pub fn search(&mut self, query: &str) -> Vec<SearchMatch> {
        let mut scan = self.begin(query, Generation::new(0));
        while !scan.step(self, usize::MAX).is_complete() {}
        scan.into_matches()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanProgress {
    Scanning { scanned: usize, total: usize },
    Complete,
}

impl ScanProgress {
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// An in-progress scan for one query
#[derive(Debug)]
pub struct SearchScan {
    generation: Generation,
    matcher: Option<QueryMatcher>,
    next_page: usize,
    page_count: usize,
    matches: Vec<SearchMatch>,
    failures: Vec<ViewerError>,
}

impl SearchScan {
    fn new(query: &str, generation: Generation, page_count: usize) -> Self {
        Self {
            generation,
            matcher: QueryMatcher::new(query),
            next_page: 1,
            page_count,
            matches: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn query(&self) -> Option<&str> {
        self.matcher.as_ref().map(QueryMatcher::query)
    }

    pub fn is_complete(&self) -> bool {
        self.matcher.is_none() || self.next_page > self.page_count
    }

    /// Scans up to `budget` more pages
    pub fn step(&mut self, index: &mut DocumentIndex, budget: usize) -> ScanProgress {
        let mut remaining = budget.max(1);
        while remaining > 0 && !self.is_complete() {
            let page = self.next_page;
            self.scan_page(index, page);
            self.next_page += 1;
            remaining -= 1;
        }

        if self.is_complete() {
            ScanProgress::Complete
        } else {
            ScanProgress::Scanning {
                scanned: self.next_page - 1,
                total: self.page_count,
            }
        }
    }

    fn scan_page(&mut self, index: &mut DocumentIndex, page: usize) {
        let Some(matcher) = &self.matcher else {
            return;
        };

        let items = match index.page_items(page) {
            Ok(items) => items,
            Err(e) => {
                warn!("Search skipped page {page}: {e}");
                self.failures.push(e);
                return;
            }
        };

        let first = self.matches.len();
        for item in items.iter().filter(|item| matcher.is_match(&item.text)) {
            self.matches.push(SearchMatch {
                page,
                item_index: item.item_index,
                snippet: snippet(&item.text),
                global_ordinal: self.matches.len() + 1,
                page_match_count: 0,
            });
        }

        let page_matches = self.matches.len() - first;
        for m in &mut self.matches[first..] {
            m.page_match_count = page_matches;
        }
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    /// Pages whose text could not be extracted
    pub fn failures(&self) -> &[ViewerError] {
        &self.failures
    }

    pub fn into_matches(self) -> Vec<SearchMatch> {
        if let Some(matcher) = &self.matcher {
            debug!(
                "Search for {:?} found {} matches",
                matcher.query(),
                self.matches.len()
            );
        }
        self.matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_ignores_case_and_treats_query_literally() {
        let m = QueryMatcher::new("  Q1 (Revenue)  ").unwrap();
        assert_eq!(m.query(), "Q1 (Revenue)");
        assert!(m.is_match("q1 (REVENUE) grew"));
        assert!(!m.is_match("Q1 Revenue"));
    }

    #[test]
    fn blank_queries_have_no_matcher() {
        assert!(QueryMatcher::new("").is_none());
        assert!(QueryMatcher::new(" \t\n").is_none());
    }

    #[test]
    fn find_ranges_reports_every_occurrence() {
        let m = QueryMatcher::new("ab").unwrap();
        assert_eq!(m.find_ranges("AB xab ab"), vec![0..2, 4..6, 7..9]);
    }

    #[test]
    fn long_snippets_are_truncated() {
        let long = "x".repeat(SNIPPET_MAX_CHARS + 10);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), SNIPPET_MAX_CHARS + 3);
        assert!(s.ends_with("..."));
        assert_eq!(snippet("short"), "short");
    }
}
