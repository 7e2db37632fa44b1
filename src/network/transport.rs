// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Failure types raised by the HTTP transport.
//!
//! The call engine only needs to tell these families apart; how a transport
//! detects them is its own business. [`crate::network::ApiClient`] maps
//! `reqwest` errors onto them, test doubles construct them directly.

use std::error::Error as StdError;
use std::sync::Arc;

/// A failed network operation, before classification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a 4xx status.
    #[error("client error {status}")]
    ClientStatus { status: u16, body: Option<String> },

    /// The server answered with a 5xx status.
    #[error("server error {status}")]
    ServerStatus { status: u16, body: Option<String> },

    /// The response arrived but its payload could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request timed out")]
    Timeout,

    /// DNS, TCP, TLS or any other failure to exchange bytes with the server.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error(transparent)]
    Other(Arc<dyn StdError + Send + Sync>),
}

impl TransportError {
    pub fn other<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        TransportError::Other(Arc::new(err))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if e.is_connect() || e.is_request() || e.is_body() {
            TransportError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            let status = status.as_u16();
            if (500..600).contains(&status) {
                TransportError::ServerStatus { status, body: None }
            } else {
                TransportError::ClientStatus { status, body: None }
            }
        } else {
            TransportError::other(e)
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}
