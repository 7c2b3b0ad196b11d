//! Minimal server-rendered pages. The real UI lives elsewhere; these exist so
//! the guarded routes and form-based auth flow have something to serve.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use super::error::ApiError;
use super::session::{safe_next, Credentials};
use super::{ensure_user, AppState, Authenticated};
use crate::auth::guard::SIGNIN_PATH;
use crate::auth::provider::ProviderError;
use crate::auth::{access_token, clear_session_cookies, set_session_cookies};
use crate::memo::stats::memo_stats;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/dashboard", get(dashboard))
        .route("/profile", get(profile))
        .route("/settings", get(settings))
        .route("/auth/signin", get(signin_page).post(signin_submit))
        .route("/auth/signup", get(signup_page).post(signup_submit))
        .route("/auth/signout", post(signout_submit))
        .route("/auth/auth-code-error", get(auth_code_error))
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\">\
         <title>{} · Memora</title></head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title)
    ))
}

fn error_banner(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p class=\"error\" role=\"alert\">{}</p>", escape_html(e)))
        .unwrap_or_default()
}

async fn home() -> Html<String> {
    layout(
        "Home",
        "<h1>Memora</h1>\n<p>Capture thoughts as text or voice memos.</p>\n\
         <p><a href=\"/auth/signin\">Sign in</a> · <a href=\"/auth/signup\">Create an account</a> · \
         <a href=\"/dashboard\">Dashboard</a></p>",
    )
}

async fn dashboard(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Html<String>, ApiError> {
    let scan_limit = state.config.api.stats_scan_limit;
    let user_id = user.id.clone();
    let stats = state
        .run_db(move |conn| memo_stats(conn, &user_id, scan_limit))
        .await?;

    let categories = if stats.categories.is_empty() {
        "none yet".to_string()
    } else {
        escape_html(&stats.categories.join(", "))
    };
    let body = format!(
        "<h1>Dashboard</h1>\n<p>Signed in as {email}</p>\n<ul>\n\
         <li>Total memos: {total}</li>\n<li>Favorites: {favorites}</li>\n\
         <li>Archived: {archived}</li>\n<li>Created this week: {recent}</li>\n\
         <li>Categories: {categories}</li>\n<li>Tags in use: {tags}</li>\n</ul>\n\
         <form method=\"post\" action=\"/auth/signout\"><button>Sign out</button></form>",
        email = escape_html(&user.email),
        total = stats.total,
        favorites = stats.favorites,
        archived = stats.archived,
        recent = stats.recent_count,
        tags = stats.tag_count,
    );
    Ok(layout("Dashboard", &body))
}

async fn profile(Authenticated(user): Authenticated) -> Html<String> {
    let body = format!(
        "<h1>Profile</h1>\n<dl>\n<dt>Email</dt><dd>{}</dd>\n<dt>Name</dt><dd>{}</dd>\n\
         <dt>Email confirmed</dt><dd>{}</dd>\n<dt>Member since</dt><dd>{}</dd>\n</dl>",
        escape_html(&user.email),
        escape_html(user.name.as_deref().unwrap_or("-")),
        if user.email_confirmed_at.is_some() { "yes" } else { "no" },
        escape_html(&user.created_at),
    );
    layout("Profile", &body)
}

async fn settings(Authenticated(_user): Authenticated) -> Html<String> {
    layout(
        "Settings",
        "<h1>Settings</h1>\n<p>Nothing to configure yet.</p>",
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninParams {
    pub redirect_to: Option<String>,
}

fn signin_form(redirect_to: Option<&str>, error: Option<&str>) -> Html<String> {
    let hidden = redirect_to
        .map(|r| {
            format!(
                "<input type=\"hidden\" name=\"redirectTo\" value=\"{}\">",
                escape_html(r)
            )
        })
        .unwrap_or_default();
    let body = format!(
        "<h1>Sign in</h1>\n{}\n<form method=\"post\" action=\"/auth/signin\">\n{hidden}\n\
         <label>Email <input type=\"email\" name=\"email\" required></label>\n\
         <label>Password <input type=\"password\" name=\"password\" required></label>\n\
         <button>Sign in</button>\n</form>\n<p><a href=\"/auth/signup\">Create an account</a></p>",
        error_banner(error)
    );
    layout("Sign in", &body)
}

fn signup_form(error: Option<&str>, notice: Option<&str>) -> Html<String> {
    let notice = notice
        .map(|n| format!("<p class=\"notice\">{}</p>", escape_html(n)))
        .unwrap_or_default();
    let body = format!(
        "<h1>Create an account</h1>\n{}{notice}\n<form method=\"post\" action=\"/auth/signup\">\n\
         <label>Email <input type=\"email\" name=\"email\" required></label>\n\
         <label>Password <input type=\"password\" name=\"password\" minlength=\"6\" required></label>\n\
         <button>Sign up</button>\n</form>\n<p><a href=\"/auth/signin\">Already have an account?</a></p>",
        error_banner(error)
    );
    layout("Sign up", &body)
}

async fn signin_page(params: Result<Query<SigninParams>, QueryRejection>) -> Html<String> {
    let redirect_to = params.ok().and_then(|Query(p)| p.redirect_to);
    signin_form(redirect_to.as_deref(), None)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

async fn signin_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Form(form), _): WithRejection<Form<SigninForm>, ApiError>,
) -> Response {
    let redirect_to = form.redirect_to.as_deref().filter(|r| !r.is_empty());
    match state
        .auth
        .sign_in_with_password(form.email.trim(), &form.password)
        .await
    {
        Ok(session) => {
            if let Err(e) = ensure_user(&state, &session.user).await {
                return e.into_response();
            }
            tracing::info!(user_id = %session.user.id, "signed in via form");
            let jar = set_session_cookies(jar, &session, &state.config.auth);
            (jar, Redirect::to(&safe_next(redirect_to))).into_response()
        }
        Err(ProviderError::Rejected(message)) => (
            StatusCode::UNAUTHORIZED,
            signin_form(redirect_to, Some(&message)),
        )
            .into_response(),
        Err(ProviderError::Unavailable(reason)) => {
            tracing::error!(%reason, "sign-in failed: provider unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                signin_form(redirect_to, Some("sign-in is temporarily unavailable")),
            )
                .into_response()
        }
    }
}

async fn signup_page() -> Html<String> {
    signup_form(None, None)
}

async fn signup_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Form(credentials), _): WithRejection<Form<Credentials>, ApiError>,
) -> Response {
    if let Err(ApiError::Validation(violations)) = credentials.validate() {
        let message = violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return (StatusCode::BAD_REQUEST, signup_form(Some(&message), None)).into_response();
    }

    match state
        .auth
        .sign_up(credentials.email.trim(), &credentials.password)
        .await
    {
        Ok(Some(session)) => {
            if let Err(e) = ensure_user(&state, &session.user).await {
                return e.into_response();
            }
            let jar = set_session_cookies(jar, &session, &state.config.auth);
            (jar, Redirect::to(&safe_next(None))).into_response()
        }
        Ok(None) => signup_form(
            None,
            Some("Account created. Check your email to activate it."),
        )
        .into_response(),
        Err(ProviderError::Rejected(message)) => {
            (StatusCode::BAD_REQUEST, signup_form(Some(&message), None)).into_response()
        }
        Err(ProviderError::Unavailable(reason)) => {
            tracing::error!(%reason, "sign-up failed: provider unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                signup_form(Some("sign-up is temporarily unavailable"), None),
            )
                .into_response()
        }
    }
}

async fn signout_submit(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = access_token(&jar, &state.config.auth) {
        if let Err(ProviderError::Unavailable(reason)) = state.auth.sign_out(&token).await {
            tracing::warn!(%reason, "could not revoke session at provider");
        }
    }
    let jar = clear_session_cookies(jar, &state.config.auth);
    (jar, Redirect::to(SIGNIN_PATH)).into_response()
}

async fn auth_code_error() -> Html<String> {
    layout(
        "Confirmation failed",
        "<h1>Confirmation failed</h1>\n<p>The link is invalid or has expired.</p>\n\
         <p><a href=\"/auth/signin\">Back to sign in</a></p>",
    )
}
