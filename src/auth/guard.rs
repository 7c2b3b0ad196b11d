//! Request-time route guard.
//!
//! Runs before every handler. Static assets bypass it. Everything else gets
//! its session resolved once, stored in request extensions as
//! [`ResolvedSession`], and may be redirected:
//!
//! - protected page without a session -> `/auth/signin?redirectTo=<path>`
//! - sign-in/sign-up page with a session -> `/dashboard`

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use url::form_urlencoded;

use super::{resolve_session, Identity, SessionError};
use crate::api::AppState;

const PROTECTED_PREFIXES: &[&str] = &["/dashboard", "/memo", "/profile", "/settings"];
const AUTH_ONLY_PREFIXES: &[&str] = &["/auth/signin", "/auth/signup"];
const EXCLUDED_PREFIXES: &[&str] = &["/_next/static", "/_next/image", "/static/"];
const IMAGE_SUFFIXES: &[&str] = &[".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

pub const SIGNIN_PATH: &str = "/auth/signin";
pub const LANDING_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Static assets: never evaluated.
    Excluded,
    /// Requires a session.
    Protected,
    /// Only makes sense without a session.
    AuthOnly,
    Public,
}

/// Session outcome computed by the guard, read back by the `Authenticated` extractor.
#[derive(Debug, Clone)]
pub struct ResolvedSession(pub Result<Identity, SessionError>);

/// `path` equals `prefix` or continues it with a new segment.
fn matches_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn classify(path: &str) -> PathClass {
    if path == "/favicon.ico"
        || EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
        || IMAGE_SUFFIXES.iter().any(|s| path.ends_with(s))
    {
        PathClass::Excluded
    } else if PROTECTED_PREFIXES.iter().any(|p| matches_segment_prefix(path, p)) {
        PathClass::Protected
    } else if AUTH_ONLY_PREFIXES.iter().any(|p| matches_segment_prefix(path, p)) {
        PathClass::AuthOnly
    } else {
        PathClass::Public
    }
}

/// Form-encode a query value segment by segment, so `/` stays literal.
pub fn encode_query_value(value: &str) -> String {
    value
        .split('/')
        .map(|segment| form_urlencoded::byte_serialize(segment.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn signin_redirect_target(path: &str) -> String {
    format!("{SIGNIN_PATH}?redirectTo={}", encode_query_value(path))
}

/// Axum middleware implementing the guard. Install with
/// `middleware::from_fn_with_state(state, route_guard)`.
pub async fn route_guard(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = classify(&path);
    if class == PathClass::Excluded {
        return next.run(request).await;
    }

    let resolution = resolve_session(state.auth.as_ref(), jar, &state.config.auth).await;
    let jar = resolution.jar;

    match (&resolution.outcome, class) {
        (Err(SessionError::Unauthenticated), PathClass::Protected) => {
            tracing::debug!(%path, "redirecting anonymous request to sign-in");
            return (jar, Redirect::temporary(&signin_redirect_target(&path))).into_response();
        }
        (Err(SessionError::ProviderUnavailable(reason)), PathClass::Protected) => {
            tracing::error!(%path, %reason, "cannot verify session for protected path");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal server error" })),
            )
                .into_response();
        }
        (Ok(identity), PathClass::AuthOnly) => {
            tracing::debug!(%path, user_id = %identity.id, "redirecting signed-in user to landing page");
            return (jar, Redirect::temporary(LANDING_PATH)).into_response();
        }
        _ => {}
    }

    request
        .extensions_mut()
        .insert(ResolvedSession(resolution.outcome));
    let response = next.run(request).await;
    (jar, response).into_response()
}
