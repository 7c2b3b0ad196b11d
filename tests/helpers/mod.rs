#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use memora::api::AppState;
use memora::auth::provider::{AuthProvider, OtpType, ProviderError, ProviderResult, Session};
use memora::auth::Identity;
use memora::config::MemoraConfig;
use memora::db;
use memora::memo::store::insert_memo_at;
use memora::memo::types::{Memo, NewMemo};
use rusqlite::Connection;

pub const ACCESS_COOKIE: &str = "memora-access-token";
pub const REFRESH_COOKIE: &str = "memora-refresh-token";
/// Token hash accepted by [`FakeAuthProvider::verify_otp`].
pub const GOOD_TOKEN_HASH: &str = "confirm-ok";

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn identity(id: &str, email: &str) -> Identity {
    Identity {
        id: id.into(),
        email: email.into(),
        email_confirmed_at: Some("2026-01-01T00:00:00Z".into()),
        created_at: "2026-01-01T00:00:00Z".into(),
        updated_at: None,
        name: None,
        avatar_url: None,
    }
}

#[derive(Default)]
struct FakeState {
    /// email -> (password, identity)
    accounts: HashMap<String, (String, Identity)>,
    access: HashMap<String, Identity>,
    refresh: HashMap<String, Identity>,
    unavailable: bool,
}

/// In-process stand-in for the GoTrue provider. Tokens are opaque counters;
/// refresh tokens are single use.
#[derive(Default)]
pub struct FakeAuthProvider {
    state: Mutex<FakeState>,
    counter: AtomicU64,
}

impl FakeAuthProvider {
    pub fn add_account(&self, email: &str, password: &str, identity: Identity) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.into(), (password.into(), identity));
    }

    /// Issue a token pair for `identity` without going through sign-in.
    pub fn issue(&self, identity: &Identity) -> Session {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            access_token: format!("access-{n}"),
            refresh_token: format!("refresh-{n}"),
            user: identity.clone(),
        };
        let mut state = self.state.lock().unwrap();
        state
            .access
            .insert(session.access_token.clone(), identity.clone());
        state
            .refresh
            .insert(session.refresh_token.clone(), identity.clone());
        session
    }

    /// Invalidate an access token, as if it had expired.
    pub fn expire(&self, access_token: &str) {
        self.state.lock().unwrap().access.remove(access_token);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    fn check_available(&self) -> ProviderResult<()> {
        if self.state.lock().unwrap().unavailable {
            Err(ProviderError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn get_user(&self, access_token: &str) -> ProviderResult<Identity> {
        self.check_available()?;
        self.state
            .lock()
            .unwrap()
            .access
            .get(access_token)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected("invalid JWT".into()))
    }

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Session> {
        self.check_available()?;
        let identity = self
            .state
            .lock()
            .unwrap()
            .refresh
            .remove(refresh_token)
            .ok_or_else(|| ProviderError::Rejected("Invalid Refresh Token".into()))?;
        Ok(self.issue(&identity))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ProviderResult<Session> {
        self.check_available()?;
        let account = self.state.lock().unwrap().accounts.get(email).cloned();
        match account {
            Some((expected, identity)) if expected == password => Ok(self.issue(&identity)),
            _ => Err(ProviderError::Rejected("Invalid login credentials".into())),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> ProviderResult<Option<Session>> {
        self.check_available()?;
        if self.state.lock().unwrap().accounts.contains_key(email) {
            return Err(ProviderError::Rejected("User already registered".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let identity = identity(&format!("user-{n}"), email);
        self.add_account(email, password, identity.clone());
        Ok(Some(self.issue(&identity)))
    }

    async fn sign_out(&self, access_token: &str) -> ProviderResult<()> {
        self.check_available()?;
        self.state.lock().unwrap().access.remove(access_token);
        Ok(())
    }

    async fn verify_otp(&self, token_hash: &str, _otp_type: OtpType) -> ProviderResult<Session> {
        self.check_available()?;
        if token_hash == GOOD_TOKEN_HASH {
            Ok(self.issue(&identity("confirmed-user", "confirmed@example.com")))
        } else {
            Err(ProviderError::Rejected("Token has expired or is invalid".into()))
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub auth: Arc<FakeAuthProvider>,
}

impl TestApp {
    /// Register a user with the fake provider and return its access token.
    pub fn login(&self, id: &str, email: &str) -> String {
        self.auth.issue(&identity(id, email)).access_token
    }

    /// Insert `count` memos for `user_id`, one minute apart, oldest first.
    /// Titles are `Memo 0`..`Memo {count-1}`.
    pub fn seed_memos(&self, user_id: &str, count: usize) -> Vec<Memo> {
        seed_memos(&self.state, user_id, count)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }
}

pub fn test_app() -> TestApp {
    let auth = Arc::new(FakeAuthProvider::default());
    let provider: Arc<dyn AuthProvider> = auth.clone();
    let state = AppState::new(test_db(), provider, MemoraConfig::default());
    let router = memora::server::build_router(state.clone());
    TestApp {
        router,
        state,
        auth,
    }
}

pub fn seed_memos(state: &AppState, user_id: &str, count: usize) -> Vec<Memo> {
    let mut conn = state.db.lock().unwrap();
    memora::memo::users::upsert_user(&conn, user_id, &format!("{user_id}@example.com"), None, None)
        .unwrap();
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let memo = NewMemo {
                title: format!("Memo {i}"),
                content: format!("content {i}"),
                ..Default::default()
            };
            insert_memo_at(&mut conn, user_id, &memo, base + Duration::minutes(i as i64)).unwrap()
        })
        .collect()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// All `Set-Cookie` header values.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    /// The value assigned to `name` by a `Set-Cookie` header, if any.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies().into_iter().find_map(|c| {
            c.strip_prefix(&prefix)
                .map(|rest| rest.split(';').next().unwrap_or("").to_string())
        })
    }
}

/// Build a request, with the access cookie when `token` is given and a JSON body when `body` is.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("{ACCESS_COOKIE}={token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Request carrying an arbitrary `Cookie` header.
pub fn request_with_cookies(method: Method, uri: &str, cookies: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Serve the full router on an ephemeral loopback port. Returns the base URL.
pub async fn spawn_server(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Percent-encode a query parameter value.
pub fn encode(value: &str) -> String {
    memora::auth::guard::encode_query_value(value)
}
