// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Paged list loading.
//!
//! - [`PagedResult`]: one fetched page
//! - [`PaginationState`] and [`load_next_page`]: the pure state machine
//! - [`Paginator`]: an observable owner for one list

mod loader;
mod paged_result;
mod state;

pub use loader::Paginator;
pub use paged_result::PagedResult;
pub use state::{load_next_page, PageRequest, PaginationState, DEFAULT_PAGE_SIZE};
