use serde::{Deserialize, Serialize};

/// Pagination options for retrieving lists of items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOpts {
    /// The maximum number of items to return
    pub limit: usize,
    /// Offset of the first item to return
    pub start: usize,
}

impl Default for PageOpts {
    fn default() -> Self {
        PageOpts {
            limit: 100,
            start: 0,
        }
    }
}

impl PageOpts {
    pub fn new(limit: usize, start: usize) -> Self {
        PageOpts { limit, start }
    }

    /// Slice one page out of `items`, reporting the total and where the next page starts
    pub fn paginate<T>(&self, items: Vec<T>) -> PageResult<T> {
        let total = items.len();
        let end = std::cmp::min(self.start.saturating_add(self.limit), total);
        let next_start = if end < total { Some(end) } else { None };
        let items = items
            .into_iter()
            .skip(self.start)
            .take(end.saturating_sub(self.start))
            .collect();

        PageResult::new(items, total, next_start)
    }
}

/// Result of a paginated query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    /// The items returned in this page
    pub items: Vec<T>,
    /// The total number of items available
    pub total: usize,
    /// Offset of the next page, if available
    pub next_start: Option<usize>,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, total: usize, next_start: Option<usize>) -> Self {
        PageResult {
            items,
            total,
            next_start,
        }
    }
}
