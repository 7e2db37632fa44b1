// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resilient Data - Offline-aware Client Data Layer
//!
//! Typed outcomes, classified and retried network calls, paginated list
//! state, and an encrypted credential store, composed into repositories
//! that decide per operation whether to use the network, local storage,
//! or both.
//!
//! ## Modules
//!
//! - `outcome` - `Outcome<T>`: success, classified error, or loading
//! - `error` - `AppError` taxonomy and status-code mapping
//! - `network` - HTTP client, call engine, retry, connectivity
//! - `pagination` - Page accumulation state machine
//! - `storage` - Encrypted session store and row cache
//! - `repository` - Auth and catalog policies
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod outcome;
pub mod pagination;
pub mod repository;
pub mod storage;

pub use error::AppError;
pub use outcome::Outcome;
