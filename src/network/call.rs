// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Resilient Call Engine
//!
//! [`execute`] runs one network operation and converts whatever it fails
//! with into exactly one [`AppError`]. No transport error escapes past this
//! boundary.
//!
//! ## Classification Order
//!
//! 1. 4xx status → client variants (`BadRequest`, `Unauthorized`, ...)
//! 2. 5xx status → `ServiceUnavailable` for 503, `ServerError` otherwise
//! 3. payload decode failure → `SerializationFailed`
//! 4. timeout → `Timeout`
//! 5. connectivity failure → `NetworkUnavailable`
//! 6. anything else → `Unknown`, keeping the original cause
//!
//! Status failures try to decode a structured error body first; when that
//! fails the raw body text is used, and when there is no body the family's
//! default message.

use std::future::Future;

use tracing::{error, warn};

use crate::error::{messages, AppError, FieldErrors, GENERAL_FIELD};
use crate::network::dto::ErrorBody;
use crate::network::transport::TransportError;
use crate::outcome::Outcome;

/// Runs `operation` and classifies its failure.
pub async fn execute<T, F, Fut>(operation: F) -> Outcome<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    match operation().await {
        Ok(value) => Outcome::Success(value),
        Err(e) => Outcome::Error(classify(e)),
    }
}

/// Converts a transport failure into its [`AppError`] variant.
pub fn classify(err: TransportError) -> AppError {
    match err {
        TransportError::ClientStatus { status, body } => client_error(status, body.as_deref()),
        TransportError::ServerStatus { status, body } => server_error(status, body.as_deref()),
        TransportError::Decode(detail) => {
            error!(error = %detail, "Serialization error");
            AppError::serialization_failed()
        }
        TransportError::Timeout => {
            warn!("Request timed out");
            AppError::timeout()
        }
        TransportError::Connect(detail) => {
            warn!(error = %detail, "Network error");
            AppError::network_unavailable()
        }
        TransportError::Other(cause) => {
            error!(error = %cause, "Unclassified transport error");
            AppError::Unknown {
                message: non_blank(Some(cause.to_string()))
                    .unwrap_or_else(|| messages::UNKNOWN_ERROR.to_string()),
                cause: Some(cause),
            }
        }
    }
}

fn client_error(status: u16, body: Option<&str>) -> AppError {
    let parsed = ErrorBody::parse(body);
    let message = parsed_message(parsed.as_ref());

    // 400 and unmapped codes show the raw body when it did not decode, and
    // the field details alongside the message when it did.
    let raw_message = body_message(parsed.as_ref(), body);
    let full_message = match (raw_message, parsed.as_ref().and_then(ErrorBody::details)) {
        (Some(m), Some(details)) => Some(format!("{m}\n{details}")),
        (m, _) => m,
    };

    warn!(status, message = ?full_message, "Client error");

    let pick = |default: &str| message.clone().unwrap_or_else(|| default.to_string());
    match status {
        400 => AppError::BadRequest {
            message: full_message.unwrap_or_else(|| messages::BAD_REQUEST.to_string()),
            code: 400,
        },
        401 => AppError::Unauthorized {
            message: pick(messages::UNAUTHORIZED),
        },
        403 => AppError::Forbidden {
            message: pick(messages::FORBIDDEN),
        },
        404 => AppError::NotFound {
            message: pick(messages::NOT_FOUND),
        },
        409 => AppError::Conflict {
            message: pick(messages::CONFLICT),
        },
        422 => AppError::ValidationFailed {
            message: pick(messages::VALIDATION_FAILED),
            field_errors: group_field_errors(parsed.as_ref()),
        },
        429 => AppError::RateLimited {
            message: pick(messages::RATE_LIMIT),
        },
        _ => AppError::BadRequest {
            message: full_message.unwrap_or_else(|| messages::CLIENT_ERROR.to_string()),
            code: status,
        },
    }
}

fn server_error(status: u16, body: Option<&str>) -> AppError {
    let message = parsed_message(ErrorBody::parse(body).as_ref());

    error!(status, message = ?message, "Server error");

    match status {
        503 => AppError::ServiceUnavailable {
            message: message.unwrap_or_else(|| messages::SERVICE_UNAVAILABLE.to_string()),
        },
        _ => AppError::ServerError {
            message: message.unwrap_or_else(|| messages::SERVER_ERROR.to_string()),
            code: status,
        },
    }
}

/// Groups validation entries by field; entries without one go under `_general`.
fn group_field_errors(parsed: Option<&ErrorBody>) -> FieldErrors {
    let mut grouped = FieldErrors::new();
    let Some(errors) = parsed.and_then(|p| p.errors.as_ref()) else {
        return grouped;
    };
    for entry in errors {
        let field = entry.field.clone().unwrap_or_else(|| GENERAL_FIELD.to_string());
        grouped.entry(field).or_default().push(entry.message.clone());
    }
    grouped
}

/// The decoded body's message. Undecodable bodies yield nothing.
fn parsed_message(parsed: Option<&ErrorBody>) -> Option<String> {
    non_blank(parsed.and_then(|p| p.message.clone()))
}

/// The decoded body's message, or the raw body text when it did not decode.
fn body_message(parsed: Option<&ErrorBody>, raw: Option<&str>) -> Option<String> {
    match parsed {
        Some(p) => non_blank(p.message.clone()),
        None => non_blank(raw.map(str::to_string)),
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
