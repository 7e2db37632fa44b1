// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain models and the wire DTOs they are built from.

use serde::{Deserialize, Serialize};

use crate::storage::CachedUser;

// =============================================================================
// Domain Models
// =============================================================================

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl User {
    pub fn to_cached(&self, now_ms: i64) -> CachedUser {
        CachedUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            avatar_url: self.avatar_url.clone(),
            last_updated_at: now_ms,
        }
    }
}

impl From<CachedUser> for User {
    fn from(row: CachedUser) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            avatar_url: row.avatar_url,
        }
    }
}

/// An entry in the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Empty when the server has no avatar.
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Price as formatted by the server.
    pub price: String,
    pub category: String,
}

// =============================================================================
// Request DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

// =============================================================================
// Response DTOs
// =============================================================================

/// Payload of login, register, refresh and `auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl LoginResponse {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<UserResponse> for DirectoryUser {
    fn from(r: UserResponse) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            avatar_url: r.avatar_url.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub price: String,
    pub category: String,
}

impl From<ProductResponse> for Product {
    fn from(r: ProductResponse) -> Self {
        Self {
            id: r.id,
            name: r.name,
            price: r.price,
            category: r.category,
        }
    }
}
