// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API of the central memory store.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use cairn_core::ContextEvent;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// Largest batch accepted by `POST /v1/memory/batch`.
pub const BATCH_LIMIT: usize = 100;

/// Error type for one HTTP call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unauthorized (HTTP 401)\n  hint: check the configured API key")]
    Unauthorized,

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("server error (HTTP {0})")]
    Server(u16),

    /// Any other non-success status.
    #[error("request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// A success status without a JSON body.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("batch of {0} items exceeds the limit of 100")]
    BatchTooLarge(usize),

    #[error("invalid endpoint '{0}'\n  hint: use an http:// or https:// URL")]
    InvalidEndpoint(String),
}

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed future returned by [`MemoryApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Operations of the memory store used by the sync client.
pub trait MemoryApi: Send + Sync {
    /// `POST /v1/memory`
    fn create_memory<'a>(&'a self, event: &'a ContextEvent) -> ApiFuture<'a, Value>;

    /// `POST /v1/memory/batch`, at most [`BATCH_LIMIT`] events.
    fn create_batch<'a>(&'a self, events: &'a [ContextEvent]) -> ApiFuture<'a, Value>;

    /// `GET /v1/memory?limit=N`
    fn list_recent(&self, limit: usize) -> ApiFuture<'_, Value>;

    /// `GET /v1/memory/search?q=...`
    fn search<'a>(&'a self, query: &'a str) -> ApiFuture<'a, Value>;
}

#[derive(Serialize)]
struct BatchBody<'a> {
    items: &'a [ContextEvent],
}

/// [`MemoryApi`] over reqwest with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpApi {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> ApiResult<Self> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ApiError::InvalidEndpoint(endpoint.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpApi {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<Value> {
        let response = request.bearer_auth(&self.api_key).send().await?;
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()));
        }

        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            s if s.is_server_error() => ApiError::Server(s.as_u16()),
            s => ApiError::Rejected {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            },
        })
    }
}

impl MemoryApi for HttpApi {
    fn create_memory<'a>(&'a self, event: &'a ContextEvent) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            let request = self.client.post(self.url("/v1/memory")).json(event);
            self.send(request).await
        })
    }

    fn create_batch<'a>(&'a self, events: &'a [ContextEvent]) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            if events.len() > BATCH_LIMIT {
                return Err(ApiError::BatchTooLarge(events.len()));
            }
            let request = self
                .client
                .post(self.url("/v1/memory/batch"))
                .json(&BatchBody { items: events });
            self.send(request).await
        })
    }

    fn list_recent(&self, limit: usize) -> ApiFuture<'_, Value> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.url("/v1/memory"))
                .query(&[("limit", limit)]);
            self.send(request).await
        })
    }

    fn search<'a>(&'a self, query: &'a str) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.url("/v1/memory/search"))
                .query(&[("q", query)]);
            self.send(request).await
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
