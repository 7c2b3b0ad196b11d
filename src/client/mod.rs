//! HTTP client for the Memora API and the UI-side state stores built on it.
//!
//! [`ApiClient`] keeps a cookie jar, so a sign-in through it authenticates
//! every later call. [`AuthStore`] and [`MemoStore`] are explicitly
//! constructed around a shared client; neither is a global.

pub mod auth_store;
pub mod memo_store;

pub use auth_store::AuthStore;
pub use memo_store::MemoStore;

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Identity;
use crate::memo::list::ListQuery;
use crate::memo::types::{Memo, MemoPatch, NewMemo};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error envelope; `message` is its `error` field.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoListResponse {
    pub data: Vec<Memo>,
    pub pagination: Pagination,
}

/// Thin typed wrapper over the JSON API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    async fn data<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> ClientResult<T> {
        let envelope: DataEnvelope<T> = self.send(request).await?.json().await?;
        Ok(envelope.data)
    }

    async fn message(&self, request: reqwest::RequestBuilder) -> ClientResult<String> {
        let envelope: MessageEnvelope = self.send(request).await?.json().await?;
        Ok(envelope.message)
    }

    pub async fn list_memos(&self, query: &ListQuery) -> ClientResult<MemoListResponse> {
        let mut params: Vec<(&str, String)> = vec![("limit", query.limit.to_string())];
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }
        if let Some(category) = &query.category {
            params.push(("category", category.clone()));
        }
        if let Some(flag) = query.is_favorite {
            params.push(("isFavorite", flag.to_string()));
        }
        if let Some(flag) = query.is_archived {
            params.push(("isArchived", flag.to_string()));
        }
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }

        let url = reqwest::Url::parse_with_params(&self.url("/api/memos"), &params)
            .map_err(|e| ClientError::Api {
                status: 0,
                message: format!("invalid base url: {e}"),
            })?;
        let response = self.send(self.http.get(url)).await?;
        Ok(response.json().await?)
    }

    pub async fn get_memo(&self, id: &str) -> ClientResult<Memo> {
        self.data(self.http.get(self.url(&format!("/api/memos/{id}"))))
            .await
    }

    pub async fn create_memo(&self, memo: &NewMemo) -> ClientResult<Memo> {
        self.data(self.http.post(self.url("/api/memos")).json(memo))
            .await
    }

    pub async fn update_memo(&self, id: &str, patch: &MemoPatch) -> ClientResult<Memo> {
        self.data(
            self.http
                .put(self.url(&format!("/api/memos/{id}")))
                .json(patch),
        )
        .await
    }

    pub async fn delete_memo(&self, id: &str) -> ClientResult<String> {
        self.message(self.http.delete(self.url(&format!("/api/memos/{id}"))))
            .await
    }

    pub async fn toggle_favorite(&self, id: &str) -> ClientResult<Memo> {
        self.data(
            self.http
                .post(self.url(&format!("/api/memos/{id}/favorite"))),
        )
        .await
    }

    pub async fn session(&self) -> ClientResult<Identity> {
        self.data(self.http.get(self.url("/api/session"))).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<Identity> {
        self.data(
            self.http
                .post(self.url("/api/session"))
                .json(&serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> ClientResult<String> {
        self.message(
            self.http
                .post(self.url("/api/signup"))
                .json(&serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn sign_out(&self) -> ClientResult<String> {
        self.message(self.http.request(Method::DELETE, self.url("/api/session")))
            .await
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| status.to_string())
}
