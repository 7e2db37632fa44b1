// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # HTTP Client
//!
//! Thin wrapper over `reqwest` that speaks JSON to a single API base URL.
//!
//! ## Behavior
//!
//! - Paths are joined onto the base URL, so `auth/login` against
//!   `https://api.example.com/v1` resolves to `https://api.example.com/v1/auth/login`.
//! - When a token source is attached, each request carries
//!   `Authorization: Bearer <token>` if the source currently yields one.
//! - Non-2xx responses become [`TransportError::ClientStatus`] or
//!   [`TransportError::ServerStatus`] with the body text captured for the
//!   call engine to classify.
//! - 2xx bodies that do not decode become [`TransportError::Decode`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::network::transport::TransportError;

/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Supplies the bearer token for outgoing requests.
pub type TokenSource = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// JSON API client bound to one base URL.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token_source: Option<TokenSource>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.token_source.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a client with explicit timeouts.
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ClientBuildError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base(base_url)?,
            token_source: None,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientBuildError> {
        Self::new(
            &config.api_base_url,
            config.request_timeout,
            config.connect_timeout,
        )
    }

    /// Attach a bearer token source.
    pub fn with_token_source(mut self, source: TokenSource) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(TransportError::other)
    }

    /// `GET path?query`, decoding the JSON response.
    pub async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self.send(self.http.get(url).query(query)).await?;
        decode(response).await
    }

    /// `POST path` with a JSON body, decoding the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self.send(self.http.post(url).json(body)).await?;
        decode(response).await
    }

    /// `POST path` without a body, ignoring any response payload.
    pub async fn post_empty(&self, path: &str) -> Result<(), TransportError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        self.send(self.http.post(url)).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let request = match self.token_source.as_ref().and_then(|source| source()) {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.ok().filter(|b| !b.is_empty());
        Err(status_error(status, body))
    }
}

fn status_error(status: StatusCode, body: Option<String>) -> TransportError {
    let code = status.as_u16();
    if status.is_server_error() {
        TransportError::ServerStatus { status: code, body }
    } else if status.is_client_error() {
        TransportError::ClientStatus { status: code, body }
    } else {
        TransportError::other(std::io::Error::other(format!(
            "unexpected HTTP status {code}"
        )))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Ensures the base path ends with `/` so joins append instead of replace.
fn normalize_base(base_url: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
