//! Paginated search across one, many, or all collections.

use crate::api::ApiClient;
use crate::models::{Bookmark, SystemCollection};
use crate::state::LocalState;
use crate::{Error, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Search term meaning "everything in the targeted collections".
pub const WILDCARD: &str = "*";
pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    /// Collection titles in the order results should appear. Empty means
    /// every non-trashed bookmark.
    pub collections: Vec<String>,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, collections: Vec<String>) -> Self {
        Self {
            term: term.into(),
            collections,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.term.trim() == WILDCARD
    }

    /// A wildcard needs at least one explicit collection; listing the whole
    /// account is never sent.
    pub fn validate(&self) -> Result<()> {
        if self.term.trim().is_empty() {
            return Err(Error::Validation("Sorry, a search needs a term (or * with a collection).".to_string()));
        }
        if self.is_wildcard() && self.collections.is_empty() {
            return Err(Error::Validation(
                "Sorry, wildcard search requires at least one collection.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        let targets = self.collections.join(", ");
        if self.is_wildcard() {
            format!("Finding all bookmarks in {}", targets)
        } else if self.collections.is_empty() {
            format!("Searching for '{}' across all collections", self.term)
        } else {
            format!("Searching for '{}' in {}", self.term, targets)
        }
    }
}

/// A targeted collection whose sub-query did not run or failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCollection {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResultSet {
    items: Vec<Bookmark>,
    selected: Option<usize>,
    skipped: Vec<SkippedCollection>,
}

impl SearchResultSet {
    pub fn new(items: Vec<Bookmark>) -> Self {
        Self {
            items,
            selected: None,
            skipped: Vec::new(),
        }
    }

    pub fn items(&self) -> &[Bookmark] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedCollection] {
        &self.skipped
    }

    /// Select by 1-based `number`. Out of range leaves the selection as it was.
    pub fn select(&mut self, number: usize) -> Result<&Bookmark> {
        if number == 0 || number > self.items.len() {
            return Err(Error::Validation(match self.items.len() {
                0 => "Sorry, there are no results to select from.".to_string(),
                1 => "Sorry, the only valid selection is 1.".to_string(),
                n => format!("Sorry, selection must be between 1 and {}.", n),
            }));
        }
        self.selected = Some(number - 1);
        Ok(&self.items[number - 1])
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Bookmark> {
        self.selected.and_then(|i| self.items.get(i))
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// `"3/10"` with a selection, `"-/10"` without.
    pub fn prompt_suffix(&self) -> String {
        match self.selected {
            Some(i) => format!("{}/{}", i + 1, self.items.len()),
            None => format!("-/{}", self.items.len()),
        }
    }

    /// Number of distinct owning collections among the results.
    pub fn collection_count(&self) -> usize {
        self.items
            .iter()
            .map(Bookmark::collection_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchAggregator {
    page_size: u32,
}

impl Default for SearchAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl SearchAggregator {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Run `query` one collection at a time, one page at a time.
    ///
    /// With explicit collections, a title that can't be resolved or whose
    /// query fails is recorded in `skipped` and the remaining collections
    /// still run. A query across all collections has nothing to fall back
    /// to, so its failure is returned.
    pub fn search(&self, api: &mut ApiClient, cache: &LocalState, query: &SearchQuery) -> Result<SearchResultSet> {
        let term = if query.is_wildcard() {
            None
        } else {
            Some(query.term.trim())
        };

        if query.collections.is_empty() {
            let items = self.search_collection(api, SystemCollection::All.id(), term)?;
            return Ok(SearchResultSet::new(items));
        }

        let mut results = SearchResultSet::default();
        for title in &query.collections {
            let id = match resolve(cache, title) {
                Ok(id) => id,
                Err(e) => {
                    warn!(title = %title, "skipping unknown collection");
                    results.skipped.push(SkippedCollection {
                        title: title.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            match self.search_collection(api, id, term) {
                Ok(items) => results.items.extend(items),
                Err(e) => {
                    warn!(title = %title, error = %e, "collection search failed");
                    results.skipped.push(SkippedCollection {
                        title: title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(results)
    }

    fn search_collection(&self, api: &mut ApiClient, collection: i64, term: Option<&str>) -> Result<Vec<Bookmark>> {
        let mut items = Vec::new();
        let mut page = 0;
        loop {
            let batch = api.search_page(collection, term, page, self.page_size)?;
            let count = batch.len();
            items.extend(batch);
            if count < self.page_size as usize {
                break;
            }
            page += 1;
        }
        debug!(collection, pages = page + 1, items = items.len(), "collection search done");
        Ok(items)
    }
}

// Pseudo-collections resolve without the cache.
fn resolve(cache: &LocalState, title: &str) -> Result<i64> {
    if let Ok(found) = cache.find_collection_by_title(title) {
        return Ok(found.id);
    }
    [SystemCollection::All, SystemCollection::Unsorted, SystemCollection::Trash]
        .into_iter()
        .find(|s| s.title().eq_ignore_ascii_case(title.trim()))
        .map(SystemCollection::id)
        .ok_or_else(|| Error::NotFoundLocal(format!("collection '{}'", title.trim())))
}
