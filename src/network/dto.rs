// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response envelopes shared by every endpoint.

use serde::{Deserialize, Serialize};

use crate::pagination::PagedResult;

/// Error detail from an API response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorModel {
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
}

/// Envelope for single-item responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseResponse<T> {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    pub data: T,
    #[serde(default)]
    pub errors: Option<Vec<ErrorModel>>,
}

/// Envelope for paged list responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasePagingResponse<T> {
    pub code: String,
    pub message: String,
    pub data: Option<Vec<T>>,
    #[serde(default)]
    pub errors: Option<Vec<ErrorModel>>,
    #[serde(default)]
    pub metadata: Option<MetaData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetaData {
    pub pagination: PaginationMeta,
}

/// Pagination details reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub limit: u32,
    pub next_page: bool,
    pub page: u32,
    pub prev_page: bool,
    pub total: u64,
}

/// Error response body. Every field is optional so any server shape decodes.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<ErrorModel>>,
}

impl ErrorBody {
    /// Decodes an error body, returning `None` for blank or foreign payloads.
    pub fn parse(body: Option<&str>) -> Option<Self> {
        let body = body?;
        if body.trim().is_empty() {
            return None;
        }
        serde_json::from_str(body).ok()
    }

    /// Comma-joined `field: message` pairs, e.g. `email: already taken`.
    pub fn details(&self) -> Option<String> {
        let errors = self.errors.as_ref().filter(|e| !e.is_empty())?;
        Some(
            errors
                .iter()
                .map(|e| match &e.field {
                    Some(field) => format!("{field}: {}", e.message),
                    None => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

impl<T> BasePagingResponse<T> {
    /// Maps the envelope into a [`PagedResult`], converting each row.
    ///
    /// Without metadata the page is the one that was requested and totals are
    /// unknown, which makes the caller fall back to the full-page heuristic.
    pub fn into_paged<U>(self, requested_page: u32, f: impl FnMut(T) -> U) -> PagedResult<U> {
        let pagination = self.metadata.map(|m| m.pagination);
        PagedResult {
            items: self.data.unwrap_or_default().into_iter().map(f).collect(),
            current_page: pagination.as_ref().map_or(requested_page, |p| p.page),
            total_pages: pagination
                .as_ref()
                .map(|p| if p.next_page { p.page + 1 } else { p.page }),
            total_items: pagination.as_ref().map(|p| p.total),
        }
    }
}
