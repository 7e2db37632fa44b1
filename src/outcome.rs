// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Tri-state Outcome
//!
//! [`Outcome`] is the value every data operation hands back to its caller:
//! a payload, a classified [`AppError`], or a transient loading signal.
//! Expected failures travel through this type instead of panics or raw
//! transport errors.
//!
//! `Loading` carries no payload. It is only ever emitted as a signal to
//! observers and is never persisted.

use crate::error::{messages, AppError};

/// Outcome of a data operation.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed with a classified error.
    Error(AppError),
    /// The operation is still in flight.
    Loading,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Outcome::Loading)
    }

    /// Returns the payload if this is a success.
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Returns a reference to the error if this is a failure.
    pub fn error(&self) -> Option<&AppError> {
        match self {
            Outcome::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the payload, or `default` for `Error` and `Loading`.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Outcome::Success(value) => value,
            _ => default,
        }
    }

    /// Converts into a standard `Result` for use at the edges.
    ///
    /// `Loading` has no payload to hand out, so it becomes an
    /// [`AppError::Unknown`] describing that the outcome is not ready.
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Error(err) => Err(err),
            Outcome::Loading => Err(AppError::unknown(messages::STILL_LOADING)),
        }
    }

    /// Transforms the payload of a success; errors and loading pass through.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Loading => Outcome::Loading,
        }
    }

    /// Chains another fallible step onto a success.
    pub fn and_then<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Outcome<U>,
    {
        match self {
            Outcome::Success(value) => f(value),
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Loading => Outcome::Loading,
        }
    }

    /// Collapses the three states into one value.
    pub fn fold<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_error: impl FnOnce(AppError) -> R,
        on_loading: impl FnOnce() -> R,
    ) -> R {
        match self {
            Outcome::Success(value) => on_success(value),
            Outcome::Error(err) => on_error(err),
            Outcome::Loading => on_loading(),
        }
    }

    /// Runs `action` on the payload of a success and returns `self`.
    pub fn on_success(self, action: impl FnOnce(&T)) -> Self {
        if let Outcome::Success(value) = &self {
            action(value);
        }
        self
    }

    /// Runs `action` on the error of a failure and returns `self`.
    pub fn on_error(self, action: impl FnOnce(&AppError)) -> Self {
        if let Outcome::Error(err) = &self {
            action(err);
        }
        self
    }

    pub fn on_loading(self, action: impl FnOnce()) -> Self {
        if let Outcome::Loading = &self {
            action();
        }
        self
    }
}

impl<T> From<Result<T, AppError>> for Outcome<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Error(err),
        }
    }
}
