//! Session endpoints: JSON sign-in/out/up and the email-confirmation callback.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::{ensure_user, parse_json, AppState, Authenticated};
use crate::auth::guard::LANDING_PATH;
use crate::auth::provider::{OtpType, ProviderError};
use crate::auth::{access_token, clear_session_cookies, set_session_cookies};

pub const AUTH_ERROR_PATH: &str = "/auth/auth-code-error";
pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Shape checks only; the provider has the final word.
    pub fn validate(&self) -> ApiResult<()> {
        let mut violations = Vec::new();
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            violations.push(crate::memo::validate::FieldViolation::new(
                "email",
                "invalid_format",
                "a valid email address is required",
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            violations.push(crate::memo::validate::FieldViolation::new(
                "password",
                "too_short",
                format!("password must be at least {MIN_PASSWORD_CHARS} characters"),
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(violations))
        }
    }
}

/// Accept only same-origin absolute paths as post-auth destinations.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => LANDING_PATH.to_string(),
    }
}

/// `GET /api/session`
pub async fn current_session(Authenticated(user): Authenticated) -> impl IntoResponse {
    Json(json!({ "data": user }))
}

/// `POST /api/session`
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> ApiResult<Response> {
    let credentials: Credentials = parse_json(&body)?;
    credentials.validate()?;
    let session = state
        .auth
        .sign_in_with_password(credentials.email.trim(), &credentials.password)
        .await?;
    ensure_user(&state, &session.user).await?;

    tracing::info!(user_id = %session.user.id, "signed in");
    let jar = set_session_cookies(jar, &session, &state.config.auth);
    Ok((jar, Json(json!({ "data": session.user }))).into_response())
}

/// `DELETE /api/session`. Always clears the cookies, even if the provider
/// could not revoke the token.
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = access_token(&jar, &state.config.auth) {
        match state.auth.sign_out(&token).await {
            Ok(()) | Err(ProviderError::Rejected(_)) => {}
            Err(ProviderError::Unavailable(reason)) => {
                tracing::warn!(%reason, "could not revoke session at provider");
            }
        }
    }
    let jar = clear_session_cookies(jar, &state.config.auth);
    (jar, Json(json!({ "message": "signed out" }))).into_response()
}

/// `POST /api/signup`
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> ApiResult<Response> {
    let credentials: Credentials = parse_json(&body)?;
    credentials.validate()?;

    let session = state
        .auth
        .sign_up(credentials.email.trim(), &credentials.password)
        .await?;

    match session {
        Some(session) => {
            ensure_user(&state, &session.user).await?;
            tracing::info!(user_id = %session.user.id, "account created and signed in");
            let jar = set_session_cookies(jar, &session, &state.config.auth);
            Ok((
                StatusCode::CREATED,
                jar,
                Json(json!({ "message": "account created" })),
            )
                .into_response())
        }
        None => {
            tracing::info!("account created, awaiting email confirmation");
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "message": "account created; check your email to activate it"
                })),
            )
                .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmParams {
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub otp_type: Option<String>,
    pub next: Option<String>,
}

/// `GET /auth/confirm`. Redeems the emailed token and redirects to `next`,
/// or to the auth error page when anything is missing or rejected.
pub async fn confirm(
    State(state): State<AppState>,
    jar: CookieJar,
    params: Result<Query<ConfirmParams>, QueryRejection>,
) -> Response {
    let Ok(Query(params)) = params else {
        tracing::debug!("confirmation link has a malformed query");
        return Redirect::to(AUTH_ERROR_PATH).into_response();
    };
    let target = safe_next(params.next.as_deref());

    let token_hash = params.token_hash.filter(|t| !t.is_empty());
    let otp_type = params.otp_type.and_then(|t| t.parse::<OtpType>().ok());
    let (Some(token_hash), Some(otp_type)) = (token_hash, otp_type) else {
        tracing::debug!("confirmation link missing token_hash or type");
        return Redirect::to(AUTH_ERROR_PATH).into_response();
    };

    match state.auth.verify_otp(&token_hash, otp_type).await {
        Ok(session) => {
            if let Err(e) = ensure_user(&state, &session.user).await {
                tracing::error!(error = %e, "failed to record confirmed user");
                return Redirect::to(AUTH_ERROR_PATH).into_response();
            }
            tracing::info!(user_id = %session.user.id, "email confirmed");
            let jar = set_session_cookies(jar, &session, &state.config.auth);
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "otp verification failed");
            Redirect::to(AUTH_ERROR_PATH).into_response()
        }
    }
}
