//! Page-based pagination shared by list queries.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Page number used when a caller does not supply one.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size used when a caller does not supply one.
pub const DEFAULT_LIMIT: u32 = 50;
/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// A validated, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Builds a page request, falling back to the defaults for absent values.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `page` is zero or `limit` is
    /// outside `1..=MAX_LIMIT`.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self, DomainError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if page == 0 {
            return Err(DomainError::Validation("page must be at least 1".into()));
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(DomainError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    /// The 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// The page size.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Pagination details returned with a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// The 1-based page number.
    pub page: u32,
    /// The page size.
    pub limit: u32,
    /// Total matching rows across all pages.
    pub total: u64,
    /// Number of pages needed to show `total` rows.
    pub total_pages: u64,
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub data: Vec<T>,
    /// Where this page sits in the full result.
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    /// Wraps `data` with pagination details computed from `total`.
    #[must_use]
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let limit = u64::from(request.limit());
        Self {
            data,
            pagination: PageInfo {
                page: request.page(),
                limit: request.limit(),
                total,
                total_pages: total.div_ceil(limit),
            },
        }
    }
}
