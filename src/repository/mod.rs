// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Repositories
//!
//! Policy layer between callers and the network/storage primitives.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `auth` | Session lifecycle: login, register, logout, token refresh, current user |
//! | `catalog` | Paged user directory and product listings |
//! | `models` | Domain models and the wire DTOs they are built from |

pub mod auth;
pub mod catalog;
pub mod models;

pub use auth::{AuthApi, AuthRepository, RemoteAuthApi, NO_REFRESH_TOKEN};
pub use catalog::CatalogRepository;
pub use models::{DirectoryUser, Product, User};
