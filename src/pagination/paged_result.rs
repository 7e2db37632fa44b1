// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: Option<u32>,
    pub total_items: Option<u64>,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, current_page: u32) -> Self {
        Self {
            items,
            current_page,
            total_pages: None,
            total_items: None,
        }
    }

    pub fn with_total_pages(mut self, total_pages: u32) -> Self {
        self.total_pages = Some(total_pages);
        self
    }

    pub fn with_total_items(mut self, total_items: u64) -> Self {
        self.total_items = Some(total_items);
        self
    }

    /// Whether another page should be requested after this one.
    ///
    /// Uses `total_pages` when the server reported it. Otherwise a full page
    /// is taken to mean more may follow, so a backend whose last page is
    /// exactly full costs one extra empty fetch.
    pub fn has_more_pages(&self, page_size: u32) -> bool {
        match self.total_pages {
            Some(total) => self.current_page < total,
            None => self.items.len() >= page_size as usize,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_wins_over_heuristic() {
        let page = PagedResult::new(vec![1; 5], 2).with_total_pages(3);
        assert!(page.has_more_pages(20));
        let page = PagedResult::new(vec![1; 20], 3).with_total_pages(3);
        assert!(!page.has_more_pages(20));
    }

    #[test]
    fn full_page_heuristic_without_totals() {
        assert!(PagedResult::new(vec![0u8; 20], 1).has_more_pages(20));
        assert!(!PagedResult::new(vec![0u8; 19], 1).has_more_pages(20));
        assert!(!PagedResult::<u8>::new(vec![], 1).has_more_pages(20));
    }
}
