//! Domain records, creation/update inputs and closed enumerations.
//!
//! # Responsibility
//! - Define the typed shapes repositories accept and return.
//! - Own the canonical text spelling of every stored enumeration.
//!
//! # Invariants
//! - Every mutable record carries `created_at` and optional
//!   `last_updated_at` / `archived_at`, all UTC whole seconds.
//! - Enumerations parse only their canonical spellings; anything else is
//!   rejected at the edge.

pub mod household;
pub mod preference;
pub mod prep;
pub mod recipe;
pub mod setting;
pub mod token;
pub mod valid;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use household::*;
pub use preference::*;
pub use prep::*;
pub use recipe::*;
pub use setting::*;
pub use token::*;
pub use valid::*;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 250;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Pagination and time-window filter accepted by every list operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    /// 1-based page; `None` and `0` both mean the first page.
    pub page: Option<u32>,
    /// Page size; defaults to 20 and clamps to 250.
    pub limit: Option<u32>,
    pub created_before: Option<DateTime<Utc>>,
    pub created_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub include_archived: bool,
    #[serde(default)]
    pub sort_direction: SortDirection,
}

impl QueryFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of results plus the counts needed to paginate further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    /// Rows matching the filter's time window.
    pub filtered_count: u64,
    /// Rows in scope regardless of the time window.
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::{QueryFilter, MAX_PAGE_LIMIT};

    #[test]
    fn page_zero_is_first_page() {
        let filter = QueryFilter::default().with_page(0);
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(QueryFilter::default().limit(), 20);
        assert_eq!(QueryFilter::default().with_limit(10_000).limit(), MAX_PAGE_LIMIT);
        assert_eq!(QueryFilter::default().with_page(3).with_limit(5).offset(), 10);
    }
}
