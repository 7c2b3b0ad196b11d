//! External auth provider abstraction and the GoTrue REST implementation.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Identity;
use crate::config::AuthConfig;

/// Failure talking to the auth provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered and refused the credentials or token (4xx other
    /// than 408 and 429).
    #[error("rejected by auth provider: {0}")]
    Rejected(String),
    /// The provider could not be reached, was throttling or timing out (408, 429, 5xx),
    /// or sent an unreadable body.
    #[error("auth provider unavailable: {0}")]
    Unavailable(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Tokens issued by the provider for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Identity,
}

/// Kinds of one-time token delivered by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Signup,
    Email,
    Recovery,
    Invite,
    #[serde(rename = "magiclink")]
    MagicLink,
    EmailChange,
}

impl FromStr for OtpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup" => Ok(Self::Signup),
            "email" => Ok(Self::Email),
            "recovery" => Ok(Self::Recovery),
            "invite" => Ok(Self::Invite),
            "magiclink" => Ok(Self::MagicLink),
            "email_change" => Ok(Self::EmailChange),
            other => Err(format!("unknown otp type: {other}")),
        }
    }
}

/// Everything Memora needs from the identity service.
///
/// Implementations must be cheap to share (`Arc<dyn AuthProvider>`).
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Look up the user behind an access token.
    async fn get_user(&self, access_token: &str) -> ProviderResult<Identity>;

    /// Exchange a refresh token for a rotated session.
    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Session>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ProviderResult<Session>;

    /// Register a new account. `None` means the provider wants the email confirmed first.
    async fn sign_up(&self, email: &str, password: &str) -> ProviderResult<Option<Session>>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> ProviderResult<()>;

    /// Redeem an emailed token hash.
    async fn verify_otp(&self, token_hash: &str, otp_type: OtpType) -> ProviderResult<Session>;
}

/// Create an auth provider from config.
///
/// Currently only `"gotrue"` is supported.
pub fn create_provider(config: &AuthConfig) -> anyhow::Result<Box<dyn AuthProvider>> {
    match config.provider.as_str() {
        "gotrue" => Ok(Box::new(GoTrueProvider::new(config)?)),
        other => anyhow::bail!("unknown auth provider: {other}. Supported: gotrue"),
    }
}

/// Client for a GoTrue-compatible `/auth/v1` REST API.
pub struct GoTrueProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    created_at: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    user_metadata: Option<GoTrueUserMetadata>,
}

#[derive(Deserialize, Default)]
struct GoTrueUserMetadata {
    #[serde(default, alias = "full_name")]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<GoTrueUser> for Identity {
    fn from(user: GoTrueUser) -> Self {
        let metadata = user.user_metadata.unwrap_or_default();
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
            email_confirmed_at: user.email_confirmed_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
            name: metadata.name,
            avatar_url: metadata.avatar_url,
        }
    }
}

#[derive(Deserialize)]
struct GoTrueSession {
    access_token: String,
    refresh_token: String,
    user: GoTrueUser,
}

impl From<GoTrueSession> for Session {
    fn from(session: GoTrueSession) -> Self {
        Session {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            user: session.user.into(),
        }
    }
}

/// `/signup` returns a session when autoconfirm is on, otherwise the bare user.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpReply {
    Session(GoTrueSession),
    User(#[allow(dead_code)] GoTrueUser),
}

#[derive(Deserialize)]
struct GoTrueErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GoTrueProvider {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.endpoint(path));
        if self.api_key.is_empty() {
            builder
        } else {
            builder.header("apikey", &self.api_key)
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> ProviderResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = classify_failure(status, error_message(status, &body));
        match &error {
            ProviderError::Rejected(message) => {
                tracing::debug!(%status, %message, "auth provider rejected request");
            }
            ProviderError::Unavailable(message) => {
                tracing::warn!(%status, %message, "auth provider error");
            }
        }
        Err(error)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> ProviderResult<T> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("malformed reply: {e}")))
    }
}

/// Only a definite refusal is `Rejected`; throttling and timeouts say nothing
/// about the token.
fn classify_failure(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::Unavailable(message)
        }
        s if s.is_client_error() => ProviderError::Rejected(message),
        _ => ProviderError::Unavailable(message),
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<GoTrueErrorBody>(body)
        .ok()
        .and_then(|b| b.msg.or(b.message).or(b.error_description).or(b.error))
        .unwrap_or_else(|| status.to_string())
}

#[async_trait]
impl AuthProvider for GoTrueProvider {
    async fn get_user(&self, access_token: &str) -> ProviderResult<Identity> {
        let user: GoTrueUser = self
            .send_json(
                self.request(reqwest::Method::GET, "user")
                    .bearer_auth(access_token),
            )
            .await?;
        Ok(user.into())
    }

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Session> {
        let session: GoTrueSession = self
            .send_json(
                self.request(reqwest::Method::POST, "token?grant_type=refresh_token")
                    .json(&serde_json::json!({ "refresh_token": refresh_token })),
            )
            .await?;
        Ok(session.into())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ProviderResult<Session> {
        let session: GoTrueSession = self
            .send_json(
                self.request(reqwest::Method::POST, "token?grant_type=password")
                    .json(&serde_json::json!({ "email": email, "password": password })),
            )
            .await?;
        Ok(session.into())
    }

    async fn sign_up(&self, email: &str, password: &str) -> ProviderResult<Option<Session>> {
        let reply: SignUpReply = self
            .send_json(
                self.request(reqwest::Method::POST, "signup")
                    .json(&serde_json::json!({ "email": email, "password": password })),
            )
            .await?;
        Ok(match reply {
            SignUpReply::Session(session) => Some(session.into()),
            SignUpReply::User(_) => None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> ProviderResult<()> {
        self.send(
            self.request(reqwest::Method::POST, "logout")
                .bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }

    async fn verify_otp(&self, token_hash: &str, otp_type: OtpType) -> ProviderResult<Session> {
        let session: GoTrueSession = self
            .send_json(
                self.request(reqwest::Method::POST, "verify")
                    .json(&serde_json::json!({ "type": otp_type, "token_hash": token_hash })),
            )
            .await?;
        Ok(session.into())
    }
}
