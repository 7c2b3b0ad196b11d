//! HTTP surface: JSON API under `/api`, the email-confirmation callback, and
//! the HTML pages.
//!
//! Handlers share [`AppState`]. Repository calls are synchronous rusqlite
//! code and run on the blocking pool through [`AppState::run_db`].

pub mod error;
pub mod memos;
pub mod pages;
pub mod session;
pub mod tags;

use std::sync::{Arc, Mutex};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{delete, get, post};
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use rusqlite::Connection;
use serde::de::DeserializeOwned;

use crate::auth::guard::ResolvedSession;
use crate::auth::provider::AuthProvider;
use crate::auth::{resolve_session, Identity};
use crate::config::MemoraConfig;
use crate::memo::MemoError;
use error::{ApiError, ApiResult};

/// Shared handler state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<MemoraConfig>,
}

impl AppState {
    pub fn new(conn: Connection, auth: Arc<dyn AuthProvider>, config: MemoraConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            auth,
            config: Arc::new(config),
        }
    }

    /// Run a repository call on the blocking pool with the connection locked.
    pub async fn run_db<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&mut Connection) -> Result<T, MemoError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| ApiError::Internal(format!("db lock poisoned: {e}")))?;
            f(&mut *conn).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("db task failed: {e}")))?
    }
}

/// The signed-in user. Rejects with 401 when there is no session.
///
/// Reuses the outcome the route guard already computed; falls back to
/// resolving the cookies itself when the guard did not run.
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(ResolvedSession(outcome)) = parts.extensions.get::<ResolvedSession>() {
            return outcome.clone().map(Authenticated).map_err(ApiError::from);
        }
        let jar = CookieJar::from_headers(&parts.headers);
        let resolution = resolve_session(state.auth.as_ref(), jar, &state.config.auth).await;
        resolution.outcome.map(Authenticated).map_err(ApiError::from)
    }
}

/// Parse a JSON request body, reporting syntax and shape errors as a 400.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::invalid("body", "empty_body", "request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| {
        let code = if e.is_syntax() || e.is_eof() {
            "invalid_json"
        } else {
            "invalid_type"
        };
        ApiError::invalid("body", code, e.to_string())
    })
}

/// Mirror the identity into `users` so foreign keys from new rows hold.
pub(crate) async fn ensure_user(state: &AppState, identity: &Identity) -> ApiResult<()> {
    let identity = identity.clone();
    state
        .run_db(move |conn| {
            crate::memo::users::upsert_user(
                conn,
                &identity.id,
                &identity.email,
                identity.name.as_deref(),
                identity.avatar_url.as_deref(),
            )
            .map(|_| ())
        })
        .await
}

/// JSON API, auth endpoints and pages, without state or middleware.
///
/// The fallback is part of the router so layers added afterwards (the route
/// guard) also see unmatched paths.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/memos", get(memos::list_memos).post(memos::create_memo))
        .route("/api/memos/stats", get(memos::memo_stats))
        .route(
            "/api/memos/{id}",
            get(memos::get_memo)
                .put(memos::update_memo)
                .delete(memos::delete_memo),
        )
        .route("/api/memos/{id}/favorite", post(memos::toggle_favorite))
        .route("/api/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/api/tags/{id}", delete(tags::delete_tag))
        .route(
            "/api/session",
            get(session::current_session)
                .post(session::sign_in)
                .delete(session::sign_out),
        )
        .route("/api/signup", post(session::sign_up))
        .route("/auth/confirm", get(session::confirm))
        .merge(pages::routes())
        .fallback(not_found)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::types::NewMemo;

    #[test]
    fn parse_json_reports_body_errors() {
        let err = parse_json::<NewMemo>(b"  ").unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v[0].code == "empty_body"));

        let err = parse_json::<NewMemo>(b"{\"title\": ").unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v[0].code == "invalid_json"));

        let err = parse_json::<NewMemo>(b"{\"title\": 5, \"content\": \"x\"}").unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v[0].code == "invalid_type"));

        let memo = parse_json::<NewMemo>(b"{\"title\": \"t\", \"content\": \"c\"}").unwrap();
        assert_eq!(memo.title, "t");
    }
}
