// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Pagination State Machine
//!
//! [`PaginationState`] accumulates the pages of one list. It moves through
//! these phases:
//!
//! | Phase | `items` | `is_loading_more` | `has_reached_end` | `last_error` |
//! |-------|---------|-------------------|-------------------|--------------|
//! | Idle | empty | false | false | none |
//! | Loading first page | empty | true | false | none |
//! | Loaded | some | false | false | none |
//! | Loading more | some | true | false | none |
//! | Exhausted | any | false | true | none |
//! | Errored | unchanged | false | false | some |
//!
//! [`load_next_page`] drives every transition. It is split into
//! [`PaginationState::begin_load`] and [`PaginationState::complete`] so an
//! owner that publishes intermediate states (see [`super::Paginator`]) can
//! expose the loading phase while the fetch is in flight.

use std::future::Future;

use tracing::debug;

use crate::error::AppError;
use crate::outcome::Outcome;
use crate::pagination::PagedResult;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Page number and size for the next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

/// Accumulated load progress of one paged list.
#[derive(Debug, Clone)]
pub struct PaginationState<T> {
    items: Vec<T>,
    current_page: u32,
    page_size: u32,
    is_loading_more: bool,
    has_reached_end: bool,
    last_error: Option<AppError>,
    /// Bumped on every reset so results from before the reset can be told apart.
    generation: u64,
}

impl<T> Default for PaginationState<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T> PaginationState<T> {
    /// Fresh state. A `page_size` of zero is raised to one.
    pub fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            current_page: 0,
            page_size: page_size.max(1),
            is_loading_more: false,
            has_reached_end: false,
            last_error: None,
            generation: 0,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Last loaded page, `0` when nothing is loaded.
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    pub fn has_reached_end(&self) -> bool {
        self.has_reached_end
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && !self.is_loading_more
    }

    pub fn next_page(&self) -> u32 {
        self.current_page + 1
    }

    /// Guard for [`load_next_page`]. A pending error must be cleared first.
    pub fn can_load_more(&self) -> bool {
        !self.is_loading_more && !self.has_reached_end && self.last_error.is_none()
    }

    /// Fresh state keeping the page size.
    pub fn reset(&mut self) {
        *self = Self {
            generation: self.generation.wrapping_add(1),
            ..Self::new(self.page_size)
        };
    }

    /// Drop the recorded error so the list becomes loadable again.
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Enter the loading phase, returning what to fetch.
    ///
    /// Returns `None` and leaves the state untouched when
    /// [`can_load_more`](Self::can_load_more) is false.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if !self.can_load_more() {
            return None;
        }
        self.is_loading_more = true;
        self.last_error = None;
        Some(PageRequest {
            page: self.next_page(),
            page_size: self.page_size,
        })
    }

    /// Apply the fetch result and leave the loading phase.
    ///
    /// A failure records the error and keeps every loaded page intact.
    pub fn complete(&mut self, result: Outcome<PagedResult<T>>) {
        match result {
            Outcome::Success(page) => {
                self.has_reached_end = !page.has_more_pages(self.page_size);
                self.current_page = self.current_page.max(page.current_page);
                debug!(
                    page = page.current_page,
                    received = page.items.len(),
                    reached_end = self.has_reached_end,
                    "Page loaded"
                );
                self.items.extend(page.items);
            }
            Outcome::Error(err) => {
                debug!(error = %err, "Page load failed");
                self.last_error = Some(err);
            }
            Outcome::Loading => {}
        }
        self.is_loading_more = false;
    }

    /// Leave the loading phase without a result, as when the fetch was
    /// cancelled. Loaded pages and the end flag are kept.
    ///
    /// Returns whether the state changed.
    pub fn abandon_load(&mut self) -> bool {
        std::mem::replace(&mut self.is_loading_more, false)
    }
}

/// Load the next page into `state`.
///
/// When the guard rejects the call the state is returned unchanged and
/// `fetch` is never invoked.
pub async fn load_next_page<T, F, Fut>(
    mut state: PaginationState<T>,
    fetch: F,
) -> PaginationState<T>
where
    F: FnOnce(u32, u32) -> Fut,
    Fut: Future<Output = Outcome<PagedResult<T>>>,
{
    let Some(request) = state.begin_load() else {
        return state;
    };
    let result = fetch(request.page, request.page_size).await;
    state.complete(result);
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn page(start: u32, count: u32, page: u32) -> PagedResult<u32> {
        PagedResult::new((start..start + count).collect(), page)
    }

    #[tokio::test]
    async fn accumulates_pages_until_end() {
        let mut state = PaginationState::new(20);
        for _ in 0..3 {
            state = load_next_page(state, |p, size| async move {
                Outcome::Success(page((p - 1) * size, size, p).with_total_pages(3))
            })
            .await;
        }
        assert_eq!(state.items().len(), 60);
        assert_eq!(state.current_page(), 3);
        assert!(state.has_reached_end());

        let mut state = PaginationState::new(20);
        for _ in 0..3 {
            state = load_next_page(state, |p, size| async move {
                Outcome::Success(page((p - 1) * size, size, p).with_total_pages(4))
            })
            .await;
        }
        assert_eq!(state.items().len(), 60);
        assert!(!state.has_reached_end());
        assert_eq!(state.items()[59], 59);

        state = load_next_page(state, |p, _| async move {
            Outcome::Success(PagedResult::new(vec![], p))
        })
        .await;
        assert!(state.has_reached_end());
        assert_eq!(state.items().len(), 60);
        assert!(!state.can_load_more());
    }

    #[tokio::test]
    async fn guard_skips_fetch_while_loading() {
        let mut state = PaginationState::<u32>::new(20);
        assert!(state.begin_load().is_some());
        let snapshot_page = state.current_page();

        let calls = Cell::new(0);
        let state = load_next_page(state, |_, _| {
            calls.set(calls.get() + 1);
            async { Outcome::Success(PagedResult::new(vec![1], 1)) }
        })
        .await;

        assert_eq!(calls.get(), 0);
        assert!(state.is_loading_more());
        assert!(state.items().is_empty());
        assert_eq!(state.current_page(), snapshot_page);
    }

    #[tokio::test]
    async fn failure_keeps_pages_and_blocks_until_cleared() {
        let state = PaginationState::new(2);
        let state = load_next_page(state, |p, _| async move {
            Outcome::Success(page(0, 2, p))
        })
        .await;
        let mut state = load_next_page(state, |_, _| async {
            Outcome::Error(AppError::timeout())
        })
        .await;

        assert_eq!(state.items(), &[0, 1]);
        assert_eq!(state.current_page(), 1);
        assert!(!state.is_loading_more());
        assert!(matches!(state.last_error(), Some(AppError::Timeout { .. })));
        assert!(!state.can_load_more());

        state.clear_error();
        assert!(state.can_load_more());
        let state = load_next_page(state, |p, _| async move {
            Outcome::Success(page(2, 1, p))
        })
        .await;
        assert_eq!(state.items(), &[0, 1, 2]);
        assert_eq!(state.current_page(), 2);
        assert!(state.has_reached_end());
    }

    #[test]
    fn reset_preserves_page_size_only() {
        let mut state = PaginationState::<u32>::new(7);
        state.begin_load();
        state.complete(Outcome::Success(PagedResult::new(vec![1, 2], 1)));
        state.reset();

        assert!(state.is_empty());
        assert_eq!(state.current_page(), 0);
        assert_eq!(state.page_size(), 7);
        assert!(state.can_load_more());
        assert_eq!(state.generation(), 1);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        assert_eq!(PaginationState::<u8>::new(0).page_size(), 1);
    }

    #[test]
    fn loading_outcome_only_clears_flag() {
        let mut state = PaginationState::<u8>::new(5);
        state.begin_load();
        state.complete(Outcome::Loading);
        assert!(!state.is_loading_more());
        assert!(state.last_error().is_none());
        assert!(state.can_load_more());
    }
}
