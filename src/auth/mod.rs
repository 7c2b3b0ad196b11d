//! Session resolution against the external auth provider.
//!
//! Every request carries (at most) two cookies: a short-lived access token
//! and a refresh token. [`resolve_session`] turns them into an [`Identity`],
//! rotating the pair through the provider when the access token is missing
//! or stale. The returned [`CookieJar`] must be applied to the response.

pub mod guard;
pub mod provider;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use provider::{AuthProvider, ProviderError, Session};

/// The authenticated user, as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No usable session. The client should sign in again.
    #[error("not authenticated")]
    Unauthenticated,
    /// The provider could not answer; retrying later may succeed.
    #[error("auth provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Outcome of [`resolve_session`] plus the cookie changes to send back.
#[derive(Debug)]
pub struct SessionResolution {
    pub outcome: Result<Identity, SessionError>,
    pub jar: CookieJar,
}

/// Resolve the session carried by `jar`.
///
/// 1. A valid access token yields its identity and leaves the jar untouched.
/// 2. Otherwise a refresh token, if present, is exchanged; on success the
///    rotated tokens are written into the jar.
/// 3. A rejected refresh removes both cookies.
///
/// Provider outages surface as [`SessionError::ProviderUnavailable`] and never
/// touch the cookies.
pub async fn resolve_session(
    provider: &dyn AuthProvider,
    jar: CookieJar,
    config: &AuthConfig,
) -> SessionResolution {
    if let Some(access) = jar.get(&config.access_cookie).map(|c| c.value().to_string()) {
        match provider.get_user(&access).await {
            Ok(identity) => {
                return SessionResolution {
                    outcome: Ok(identity),
                    jar,
                }
            }
            Err(ProviderError::Rejected(reason)) => {
                tracing::debug!(%reason, "access token rejected");
            }
            Err(ProviderError::Unavailable(reason)) => {
                return SessionResolution {
                    outcome: Err(SessionError::ProviderUnavailable(reason)),
                    jar,
                }
            }
        }
    }

    let Some(refresh) = jar.get(&config.refresh_cookie).map(|c| c.value().to_string()) else {
        return SessionResolution {
            outcome: Err(SessionError::Unauthenticated),
            jar,
        };
    };

    match provider.refresh_session(&refresh).await {
        Ok(session) => {
            tracing::debug!(user_id = %session.user.id, "session refreshed");
            let identity = session.user.clone();
            SessionResolution {
                outcome: Ok(identity),
                jar: set_session_cookies(jar, &session, config),
            }
        }
        Err(ProviderError::Rejected(reason)) => {
            tracing::debug!(%reason, "refresh token rejected, clearing session cookies");
            SessionResolution {
                outcome: Err(SessionError::Unauthenticated),
                jar: clear_session_cookies(jar, config),
            }
        }
        Err(ProviderError::Unavailable(reason)) => SessionResolution {
            outcome: Err(SessionError::ProviderUnavailable(reason)),
            jar,
        },
    }
}

fn session_cookie(name: &str, value: &str, config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .build()
}

/// Store a session's tokens in the jar.
pub fn set_session_cookies(jar: CookieJar, session: &Session, config: &AuthConfig) -> CookieJar {
    jar.add(session_cookie(&config.access_cookie, &session.access_token, config))
        .add(session_cookie(&config.refresh_cookie, &session.refresh_token, config))
}

/// Expire both session cookies.
pub fn clear_session_cookies(jar: CookieJar, config: &AuthConfig) -> CookieJar {
    jar.remove(Cookie::build((config.access_cookie.clone(), "")).path("/"))
        .remove(Cookie::build((config.refresh_cookie.clone(), "")).path("/"))
}

/// The raw access token, for provider calls such as sign-out.
pub fn access_token(jar: &CookieJar, config: &AuthConfig) -> Option<String> {
    jar.get(&config.access_cookie).map(|c| c.value().to_string())
}
