// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Application Error Taxonomy
//!
//! [`AppError`] is the closed set of failure causes the data layer reports.
//! It is decoupled from transport types: the call engine in
//! [`crate::network::call`] is the only place that turns transport failures
//! into these variants, and [`AppError::from_code`] is the only place that
//! turns a wire status code into one.
//!
//! ## Status Mapping
//!
//! | Code | Variant |
//! |------|---------|
//! | 400 | `BadRequest` |
//! | 401 | `Unauthorized` |
//! | 403 | `Forbidden` |
//! | 404 | `NotFound` |
//! | 409 | `Conflict` |
//! | 422 | `ValidationFailed` |
//! | 429 | `RateLimited` |
//! | 503 | `ServiceUnavailable` |
//! | other 4xx | `BadRequest` (keeps the code) |
//! | other 5xx | `ServerError` (keeps the code) |
//! | anything else | `Unknown` |

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::Arc;

/// Default user-facing messages, one per failure family.
pub mod messages {
    pub const BAD_REQUEST: &str = "Invalid request";
    pub const UNAUTHORIZED: &str = "Authentication required. Please login again.";
    pub const FORBIDDEN: &str = "Access denied. You don't have permission.";
    pub const NOT_FOUND: &str = "Resource not found.";
    pub const CONFLICT: &str = "Resource conflict.";
    pub const VALIDATION_FAILED: &str = "Validation failed.";
    pub const RATE_LIMIT: &str = "Too many requests. Please try again later.";
    pub const CLIENT_ERROR: &str = "Client error occurred";

    pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable.";
    pub const SERVER_ERROR: &str = "Server error. Please try again later.";
    pub const BAD_GATEWAY: &str = "Bad gateway";
    pub const GATEWAY_TIMEOUT: &str = "Gateway timeout";

    pub const SERIALIZATION_ERROR: &str = "Failed to parse server response.";
    pub const TIMEOUT_ERROR: &str = "Request timed out. Please try again.";
    pub const NETWORK_ERROR: &str = "No internet connection. Please check your network.";
    pub const UNKNOWN_ERROR: &str = "An unexpected error occurred.";
    pub const MAX_RETRIES_EXCEEDED: &str = "Max retries exceeded";
    pub const STILL_LOADING: &str = "Result is still loading";
}

/// Field name used for validation messages that are not tied to a field.
pub const GENERAL_FIELD: &str = "_general";

/// Field-level validation messages grouped by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Domain-level failure cause.
///
/// `Display` yields the human-readable message carried by each variant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// No connectivity, or the transport could not reach the server.
    #[error("{message}")]
    NetworkUnavailable { message: String },

    #[error("{message}")]
    Timeout { message: String },

    /// 400, and the fallback for every unmapped 4xx code.
    #[error("{message}")]
    BadRequest { message: String, code: u16 },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    /// 422 with per-field messages.
    #[error("{message}")]
    ValidationFailed {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("{message}")]
    RateLimited { message: String },

    /// Any 5xx except 503.
    #[error("{message}")]
    ServerError { message: String, code: u16 },

    #[error("{message}")]
    ServiceUnavailable { message: String },

    /// A response payload could not be decoded.
    #[error("{message}")]
    SerializationFailed { message: String },

    /// Anything the classifier could not place. Keeps the original cause.
    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        cause: Option<Arc<dyn StdError + Send + Sync>>,
    },

    /// A failure raised by business rules rather than by transport.
    #[error("{message}")]
    Business { message: String, code: Option<String> },
}

/// How a caller should present an error to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPresentation {
    /// Authentication is no longer valid; route to the session-expired path.
    SessionExpired,
    /// Transient failure; offer a retry action.
    Retryable,
    /// Permanent failure; show the message without a retry action.
    Final,
}

impl AppError {
    /// Maps a wire status code to its variant.
    ///
    /// Same code always yields the same variant. `message` replaces the
    /// default message when given.
    pub fn from_code(code: u16, message: Option<String>) -> Self {
        let msg = |default: &str| message.clone().unwrap_or_else(|| default.to_string());
        match code {
            400 => AppError::BadRequest {
                message: msg(messages::BAD_REQUEST),
                code: 400,
            },
            401 => AppError::Unauthorized {
                message: msg(messages::UNAUTHORIZED),
            },
            403 => AppError::Forbidden {
                message: msg(messages::FORBIDDEN),
            },
            404 => AppError::NotFound {
                message: msg(messages::NOT_FOUND),
            },
            409 => AppError::Conflict {
                message: msg(messages::CONFLICT),
            },
            422 => AppError::ValidationFailed {
                message: msg(messages::VALIDATION_FAILED),
                field_errors: FieldErrors::new(),
            },
            429 => AppError::RateLimited {
                message: msg(messages::RATE_LIMIT),
            },
            502 => AppError::ServerError {
                message: msg(messages::BAD_GATEWAY),
                code,
            },
            503 => AppError::ServiceUnavailable {
                message: msg(messages::SERVICE_UNAVAILABLE),
            },
            504 => AppError::ServerError {
                message: msg(messages::GATEWAY_TIMEOUT),
                code,
            },
            400..=499 => AppError::BadRequest {
                message: msg(messages::CLIENT_ERROR),
                code,
            },
            500..=599 => AppError::ServerError {
                message: msg(messages::SERVER_ERROR),
                code,
            },
            _ => AppError::Unknown {
                message: msg(messages::UNKNOWN_ERROR),
                cause: None,
            },
        }
    }

    pub fn network_unavailable() -> Self {
        AppError::NetworkUnavailable {
            message: messages::NETWORK_ERROR.to_string(),
        }
    }

    pub fn timeout() -> Self {
        AppError::Timeout {
            message: messages::TIMEOUT_ERROR.to_string(),
        }
    }

    pub fn unauthorized() -> Self {
        AppError::Unauthorized {
            message: messages::UNAUTHORIZED.to_string(),
        }
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden {
            message: messages::FORBIDDEN.to_string(),
        }
    }

    pub fn not_found() -> Self {
        AppError::NotFound {
            message: messages::NOT_FOUND.to_string(),
        }
    }

    pub fn serialization_failed() -> Self {
        AppError::SerializationFailed {
            message: messages::SERIALIZATION_ERROR.to_string(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        AppError::Unknown {
            message: message.into(),
            cause: None,
        }
    }

    /// Wraps an arbitrary cause, keeping it reachable through `source()`.
    pub fn unknown_with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        AppError::Unknown {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn business(message: impl Into<String>, code: Option<String>) -> Self {
        AppError::Business {
            message: message.into(),
            code,
        }
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        match self {
            AppError::NetworkUnavailable { message }
            | AppError::Timeout { message }
            | AppError::BadRequest { message, .. }
            | AppError::Unauthorized { message }
            | AppError::Forbidden { message }
            | AppError::NotFound { message }
            | AppError::Conflict { message }
            | AppError::ValidationFailed { message, .. }
            | AppError::RateLimited { message }
            | AppError::ServerError { message, .. }
            | AppError::ServiceUnavailable { message }
            | AppError::SerializationFailed { message }
            | AppError::Unknown { message, .. }
            | AppError::Business { message, .. } => message,
        }
    }

    /// The HTTP status code this error corresponds to, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            AppError::BadRequest { code, .. } | AppError::ServerError { code, .. } => Some(*code),
            AppError::Unauthorized { .. } => Some(401),
            AppError::Forbidden { .. } => Some(403),
            AppError::NotFound { .. } => Some(404),
            AppError::Conflict { .. } => Some(409),
            AppError::ValidationFailed { .. } => Some(422),
            AppError::RateLimited { .. } => Some(429),
            AppError::ServiceUnavailable { .. } => Some(503),
            AppError::NetworkUnavailable { .. }
            | AppError::Timeout { .. }
            | AppError::SerializationFailed { .. }
            | AppError::Unknown { .. }
            | AppError::Business { .. } => None,
        }
    }

    /// Field errors of a validation failure; empty for other variants.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::ValidationFailed { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, AppError::Unauthorized { .. } | AppError::Forbidden { .. })
    }

    /// Whether the cause is plausibly transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkUnavailable { .. }
                | AppError::Timeout { .. }
                | AppError::ServerError { .. }
                | AppError::ServiceUnavailable { .. }
        )
    }

    pub fn presentation(&self) -> ErrorPresentation {
        if self.is_auth_error() {
            ErrorPresentation::SessionExpired
        } else if self.is_retryable() {
            ErrorPresentation::Retryable
        } else {
            ErrorPresentation::Final
        }
    }
}
