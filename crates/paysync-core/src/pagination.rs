//! Cursor pagination contract shared by every list operation.
//!
//! Cursors are opaque provider external ids. A page that came back full
//! (`items.len() == limit`) carries a `next_cursor` equal to its last item's
//! external id; a short page carries none. A full page does not promise that
//! more data exists, only that it might.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::SyncRecord;

/// Page size used when `limit` is zero.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size providers accept.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Creation-time filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRange {
    /// Created at or after.
    pub gte: Option<DateTime<Utc>>,
    /// Created at or before.
    pub lte: Option<DateTime<Utc>>,
}

/// Parameters of a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page size.
    pub limit: u32,

    /// Return items after this external id.
    pub starting_after: Option<String>,

    /// Return items before this external id.
    pub ending_before: Option<String>,

    /// Creation-time filter.
    pub created: Option<CreatedRange>,

    /// Provider-specific filters (`customer`, `product`, `status`, ...).
    pub filters: HashMap<String, String>,
}

impl ListParams {
    /// Params with the given limit and nothing else.
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// The limit clamped to `1..=MAX_PAGE_LIMIT`, zero meaning the default.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            0 => DEFAULT_PAGE_LIMIT,
            n => n.min(MAX_PAGE_LIMIT),
        }
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// One page of a list call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items.
    pub items: Vec<T>,

    /// External id of the last item when the page was full.
    pub next_cursor: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

impl<T: SyncRecord> Page<T> {
    /// Build a page, deriving the cursor from `limit`.
    #[must_use]
    pub fn from_items(items: Vec<T>, limit: u32) -> Self {
        let full = limit > 0 && items.len() == limit as usize;
        let next_cursor = if full {
            items.last().map(|item| item.external_id().to_string())
        } else {
            None
        };
        Self { items, next_cursor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Customer, ProviderSync};

    fn customers(n: usize) -> Vec<Customer> {
        (0..n)
            .map(|i| Customer {
                sync: ProviderSync::external(format!("cus_{i}")),
                ..Customer::default()
            })
            .collect()
    }

    #[test]
    fn full_page_has_cursor_of_last_item() {
        let page = Page::from_items(customers(3), 3);
        assert_eq!(page.next_cursor.as_deref(), Some("cus_2"));
    }

    #[test]
    fn short_page_has_no_cursor() {
        let page = Page::from_items(customers(2), 3);
        assert!(page.next_cursor.is_none());

        let empty: Page<Customer> = Page::from_items(Vec::new(), 3);
        assert!(empty.next_cursor.is_none());
    }

    #[test]
    fn effective_limit_clamps() {
        assert_eq!(ListParams::default().effective_limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(ListParams::with_limit(500).effective_limit(), MAX_PAGE_LIMIT);
        assert_eq!(ListParams::with_limit(25).effective_limit(), 25);
    }
}
