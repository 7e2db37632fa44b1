// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared owner for one paged list.
//!
//! [`Paginator`] publishes every state through a `watch` channel, including
//! the loading phase. The guard check and the switch into loading happen in
//! one `send_if_modified` call, so two overlapping `load_next_page` calls
//! cannot both start a fetch. A result that lands after [`Paginator::reset`]
//! is dropped. A load whose future is dropped mid-fetch leaves the loading
//! phase again, so the list stays loadable.

use std::future::Future;

use futures_util::stream::{self, Stream};
use tokio::sync::watch;
use tracing::debug;

use crate::outcome::Outcome;
use crate::pagination::{PagedResult, PaginationState};

pub struct Paginator<T> {
    tx: watch::Sender<PaginationState<T>>,
}

impl<T> Paginator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(page_size: u32) -> Self {
        let (tx, _rx) = watch::channel(PaginationState::new(page_size));
        Self { tx }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PaginationState<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaginationState<T>> {
        self.tx.subscribe()
    }

    /// Current state followed by every published change.
    pub fn observe(&self) -> impl Stream<Item = PaginationState<T>> + Send + 'static {
        stream::unfold((self.subscribe(), true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let state = rx.borrow_and_update().clone();
            Some((state, (rx, false)))
        })
    }

    /// Fetch and append the next page.
    ///
    /// Returns `false` without calling `fetch` when the list is already
    /// loading, exhausted or errored.
    pub async fn load_next_page<F, Fut>(&self, fetch: F) -> bool
    where
        F: FnOnce(u32, u32) -> Fut,
        Fut: Future<Output = Outcome<PagedResult<T>>>,
    {
        let mut started = None;
        self.tx.send_if_modified(|state| {
            started = state.begin_load().map(|req| (req, state.generation()));
            started.is_some()
        });
        let Some((request, generation)) = started else {
            return false;
        };

        let mut pending = PendingLoad {
            tx: &self.tx,
            generation,
            armed: true,
        };
        let result = fetch(request.page, request.page_size).await;
        pending.armed = false;

        self.tx.send_if_modified(|state| {
            if state.generation() != generation {
                debug!(page = request.page, "Discarding page fetched before reset");
                return false;
            }
            state.complete(result);
            true
        });
        true
    }

    pub fn clear_error(&self) {
        self.tx.send_if_modified(|state| {
            let had_error = state.last_error().is_some();
            state.clear_error();
            had_error
        });
    }

    /// Back to an empty list with the same page size.
    pub fn reset(&self) {
        self.tx.send_modify(PaginationState::reset);
    }
}

/// Clears the loading flag if a load is dropped before its fetch finishes.
struct PendingLoad<'a, T> {
    tx: &'a watch::Sender<PaginationState<T>>,
    generation: u64,
    armed: bool,
}

impl<T> Drop for PendingLoad<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let generation = self.generation;
        self.tx.send_if_modified(|state| {
            if state.generation() != generation {
                return false;
            }
            debug!("Page load cancelled");
            state.abandon_load()
        });
    }
}
