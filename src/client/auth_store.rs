//! Local mirror of the current identity.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError, ClientResult};
use crate::auth::Identity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user: Option<Identity>,
    pub is_authenticated: bool,
    #[serde(skip)]
    pub is_loading: bool,
    #[serde(skip)]
    pub error: Option<String>,
}

pub struct AuthStore {
    client: ApiClient,
    state: AuthState,
}

impl AuthStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: AuthState::default(),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn user(&self) -> Option<&Identity> {
        self.state.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated
    }

    fn begin(&mut self) {
        self.state.is_loading = true;
        self.state.error = None;
    }

    fn fail<T>(&mut self, err: ClientError) -> ClientResult<T> {
        tracing::debug!(error = %err, "auth store action failed");
        self.state.error = Some(err.to_string());
        self.state.is_loading = false;
        Err(err)
    }

    /// Ask the server who we are. A 401 leaves the store signed out without
    /// recording an error.
    pub async fn init(&mut self) -> ClientResult<()> {
        self.begin();
        match self.client.session().await {
            Ok(identity) => {
                self.set_user(Some(identity));
                self.state.is_loading = false;
                Ok(())
            }
            Err(ClientError::Api { status: 401, .. }) => {
                self.set_user(None);
                self.state.is_loading = false;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> ClientResult<Identity> {
        self.begin();
        match self.client.sign_in(email, password).await {
            Ok(identity) => {
                self.set_user(Some(identity.clone()));
                self.state.is_loading = false;
                Ok(identity)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Register; returns the server's message. The store stays signed out
    /// until [`init`](Self::init) or [`sign_in`](Self::sign_in) succeeds.
    pub async fn sign_up(&mut self, email: &str, password: &str) -> ClientResult<String> {
        self.begin();
        match self.client.sign_up(email, password).await {
            Ok(message) => {
                self.state.is_loading = false;
                Ok(message)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn sign_out(&mut self) -> ClientResult<()> {
        self.begin();
        match self.client.sign_out().await {
            Ok(_) => {
                self.reset();
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn set_user(&mut self, user: Option<Identity>) {
        self.state.is_authenticated = user.is_some();
        self.state.user = user;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.state.error = error;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
    }

    pub fn reset(&mut self) {
        self.state = AuthState::default();
    }

    /// Write `user` and `is_authenticated` to a JSON file.
    pub fn persist_to(&self, path: impl AsRef<Path>) -> ClientResult<()> {
        std::fs::write(path, serde_json::to_vec_pretty(&self.state)?)?;
        Ok(())
    }

    pub fn restore_from(&mut self, path: impl AsRef<Path>) -> ClientResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        let restored: AuthState = serde_json::from_slice(&std::fs::read(path)?)?;
        self.set_user(restored.user);
        Ok(())
    }
}
