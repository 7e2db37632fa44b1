// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The persisted session record and its pure transforms.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a freshly issued access token is considered valid.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Tokens and identity of the signed-in user.
///
/// The all-default record means "no session".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub is_logged_in: bool,
    pub token_expiry_epoch_ms: i64,
}

/// Identity and tokens captured at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
}

impl SessionRecord {
    /// A complete logged-in record, replacing whatever came before.
    pub fn signed_in(session: NewSession, now_ms: i64, ttl: Duration) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            user_id: session.user_id,
            user_name: session.user_name,
            user_email: session.user_email,
            is_logged_in: true,
            token_expiry_epoch_ms: expiry(now_ms, ttl),
        }
    }

    /// Same identity with new tokens. A `None` refresh token keeps the old one.
    pub fn with_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        now_ms: i64,
        ttl: Duration,
    ) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
            token_expiry_epoch_ms: expiry(now_ms, ttl),
            ..self.clone()
        }
    }

    /// `true` once `now_ms` has reached the recorded expiry.
    pub fn is_token_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.token_expiry_epoch_ms
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }
}

fn expiry(now_ms: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(ttl_ms)
}

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
