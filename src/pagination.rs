use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Page size of the public listing grid and the management grid.
pub const LISTINGS_PER_PAGE: u32 = 12;
/// Page size of the user directory.
pub const USERS_PER_PAGE: u32 = 10;

/// PageRequest
///
/// A 1-based page number and a page size. Page 0 is treated as page 1 so a
/// missing or zero `page` query parameter still yields the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Rows to skip (SQL `OFFSET`).
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Rows to take (SQL `LIMIT`).
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Slices an already-fetched, already-ordered set. The total reported is
    /// the length of the whole set, not of the slice.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Page<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX).min(items.len());
        let end = start.saturating_add(self.per_page as usize).min(items.len());
        Page::new(items[start..end].to_vec(), items.len() as u64, *self)
    }
}

/// Page
///
/// One page of results with the exact total of the underlying filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = total.div_ceil(u64::from(request.per_page())) as u32;
        Self {
            items,
            total,
            page: request.page(),
            per_page: request.per_page(),
            total_pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
