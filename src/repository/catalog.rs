// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Paged directory and product listings.
//!
//! Both listings are read-only and idempotent, so every request goes through
//! the retry engine. Results plug straight into a
//! [`Paginator`](crate::pagination::Paginator) fetch closure.

use serde::de::DeserializeOwned;

use crate::network::dto::BasePagingResponse;
use crate::network::{execute_retrying, ApiClient, RetryPolicy, TransportError};
use crate::outcome::Outcome;
use crate::pagination::PagedResult;

use super::models::{DirectoryUser, Product, ProductResponse, UserResponse};

const USERS_ENDPOINT: &str = "users";
const PRODUCTS_ENDPOINT: &str = "products";

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    client: ApiClient,
    retry: RetryPolicy,
}

impl CatalogRepository {
    pub fn new(client: ApiClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// One page of the user directory.
    pub async fn users(&self, page: u32, size: u32) -> Outcome<PagedResult<DirectoryUser>> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        self.fetch_page::<UserResponse, _>(USERS_ENDPOINT, &query, page)
            .await
    }

    /// One page of products in `category`.
    pub async fn products(
        &self,
        category: &str,
        page: u32,
        size: u32,
    ) -> Outcome<PagedResult<Product>> {
        let query = [
            ("category", category.to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ];
        self.fetch_page::<ProductResponse, _>(PRODUCTS_ENDPOINT, &query, page)
            .await
    }

    async fn fetch_page<R, U>(
        &self,
        path: &str,
        query: &[(&str, String)],
        page: u32,
    ) -> Outcome<PagedResult<U>>
    where
        R: DeserializeOwned + Into<U>,
    {
        execute_retrying(self.retry, move || async move {
            let response: BasePagingResponse<R> = self.client.get(path, query).await?;
            Ok::<_, TransportError>(response.into_paged(page, Into::into))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo(server: &MockServer) -> CatalogRepository {
        let client =
            ApiClient::new(&server.uri(), Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        CatalogRepository::new(client, RetryPolicy::new(3, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn users_maps_rows_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param("page", "2"))
            .and(query_param("size", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200",
                "message": "ok",
                "data": [
                    {"id": 11, "name": "Ada", "email": "ada@example.com", "avatar_url": "https://img/a.png"},
                    {"id": 12, "name": "Grace", "email": "grace@example.com"}
                ],
                "metadata": {"pagination": {"limit": 10, "next_page": true, "page": 2, "prev_page": true, "total": 42}}
            })))
            .mount(&server)
            .await;

        let page = repo(&server).users(2, 10).await.success().unwrap();
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, Some(3));
        assert_eq!(page.total_items, Some(42));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].avatar_url, "");
        assert!(page.has_more_pages(10));
    }

    #[tokio::test]
    async fn products_without_metadata_keep_requested_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("category", "books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "200",
                "message": "ok",
                "data": [{"id": 1, "name": "Dune", "price": "9.99", "category": "books"}]
            })))
            .mount(&server)
            .await;

        let page = repo(&server).products("books", 4, 20).await.success().unwrap();
        assert_eq!(page.current_page, 4);
        assert_eq!(page.total_pages, None);
        assert_eq!(page.items[0].name, "Dune");
        assert!(!page.has_more_pages(20));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let out = repo(&server).users(1, 20).await;
        assert!(matches!(out.error(), Some(AppError::ServiceUnavailable { .. })));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let out = repo(&server).products("books", 1, 20).await;
        assert!(matches!(out.error(), Some(AppError::NotFound { .. })));
    }
}
