//! Limit/offset pagination types for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size.
const DEFAULT_LIMIT: u32 = 25;
/// Maximum page size.
const MAX_LIMIT: u32 = 200;

/// Query parameters for paginated endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Number of items to skip.
    #[serde(default)]
    pub offset: u32,
}

impl PageQuery {
    /// Create a page query, clamping the limit to the allowed range.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset,
        }
    }

    /// The effective SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT) as i64
    }

    /// The SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        self.offset as i64
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total number of matching items.
    pub total: u64,
    /// The limit that was applied.
    pub limit: u32,
    /// The offset that was applied.
    pub offset: u32,
}

impl<T> PageResponse<T> {
    /// Create a new paginated response.
    pub fn new(items: Vec<T>, total: u64, page: &PageQuery) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        let page = PageQuery::new(10_000, 5);
        assert_eq!(page.limit(), MAX_LIMIT as i64);
        assert_eq!(page.offset(), 5);
    }
}
