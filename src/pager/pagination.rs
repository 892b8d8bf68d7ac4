use serde::Serialize;

/// Page position plus, once counted, the collection size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total: Option<u64>,
}

impl Pagination {
    /// `ceil(total / page_size)`, at least 1 so an empty collection still has
    /// page 1. Unknown until the total is.
    pub fn total_pages(&self) -> Option<u64> {
        let size = self.page_size.max(1) as u64;
        self.total.map(|total| total.div_ceil(size).max(1))
    }

    /// Clamps `page` into `[1, total_pages]`. Without a total only the lower
    /// bound applies.
    pub fn clamp(&self, page: usize) -> usize {
        let page = page.max(1);
        match self.total_pages() {
            Some(pages) => page.min(usize::try_from(pages).unwrap_or(usize::MAX)),
            None => page,
        }
    }
}
