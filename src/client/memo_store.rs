//! Local mirror of the signed-in user's memo list.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientError, ClientResult};
use crate::memo::list::ListQuery;
use crate::memo::types::{Memo, MemoPatch, NewMemo};

/// Observable store state. Actions update it only after the server agrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoState {
    pub memos: Vec<Memo>,
    pub current_memo: Option<Memo>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Filters used by the last [`MemoStore::fetch`]; reused by `fetch_next`.
    pub query: Option<ListQuery>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}

/// The persisted subset of [`MemoState`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoSnapshot {
    memos: Vec<Memo>,
    current_memo: Option<Memo>,
}

pub struct MemoStore {
    client: ApiClient,
    state: MemoState,
}

impl MemoStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: MemoState::default(),
        }
    }

    pub fn state(&self) -> &MemoState {
        &self.state
    }

    pub fn memos(&self) -> &[Memo] {
        &self.state.memos
    }

    fn begin(&mut self) {
        self.state.is_loading = true;
        self.state.error = None;
    }

    /// Record a failure. The message is kept verbatim; nothing is retried.
    fn fail<T>(&mut self, err: ClientError) -> ClientResult<T> {
        tracing::debug!(error = %err, "memo store action failed");
        self.state.error = Some(err.to_string());
        self.state.is_loading = false;
        Err(err)
    }

    /// Load the first page for `query`, replacing the local list.
    pub async fn fetch(&mut self, query: ListQuery) -> ClientResult<()> {
        self.begin();
        let query = ListQuery {
            cursor: None,
            ..query
        };
        match self.client.list_memos(&query).await {
            Ok(page) => {
                self.state.memos = page.data;
                self.state.next_cursor = page.pagination.next_cursor;
                self.state.has_next_page = page.pagination.has_next_page;
                self.state.query = Some(query);
                self.state.is_loading = false;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Append the next page. Returns `false` when there is nothing more to load.
    pub async fn fetch_next(&mut self) -> ClientResult<bool> {
        let Some(cursor) = self.state.next_cursor.clone() else {
            return Ok(false);
        };
        self.begin();
        let query = ListQuery {
            cursor: Some(cursor),
            ..self.state.query.clone().unwrap_or_default()
        };
        match self.client.list_memos(&query).await {
            Ok(page) => {
                self.state.memos.extend(page.data);
                self.state.next_cursor = page.pagination.next_cursor;
                self.state.has_next_page = page.pagination.has_next_page;
                self.state.is_loading = false;
                Ok(true)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Create on the server, then put the new memo at the front and make it current.
    pub async fn create(&mut self, memo: &NewMemo) -> ClientResult<Memo> {
        self.begin();
        match self.client.create_memo(memo).await {
            Ok(created) => {
                self.state.memos.insert(0, created.clone());
                self.state.current_memo = Some(created.clone());
                self.state.is_loading = false;
                Ok(created)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn update(&mut self, id: &str, patch: &MemoPatch) -> ClientResult<Memo> {
        self.begin();
        match self.client.update_memo(id, patch).await {
            Ok(updated) => {
                self.replace_local(&updated);
                self.state.is_loading = false;
                Ok(updated)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn toggle_favorite(&mut self, id: &str) -> ClientResult<Memo> {
        self.begin();
        match self.client.toggle_favorite(id).await {
            Ok(updated) => {
                self.replace_local(&updated);
                self.state.is_loading = false;
                Ok(updated)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn delete(&mut self, id: &str) -> ClientResult<()> {
        self.begin();
        match self.client.delete_memo(id).await {
            Ok(_) => {
                self.state.memos.retain(|m| m.id != id);
                if self.state.current_memo.as_ref().is_some_and(|m| m.id == id) {
                    self.state.current_memo = None;
                }
                self.state.is_loading = false;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn replace_local(&mut self, memo: &Memo) {
        if let Some(slot) = self.state.memos.iter_mut().find(|m| m.id == memo.id) {
            *slot = memo.clone();
        }
        if self.state.current_memo.as_ref().is_some_and(|m| m.id == memo.id) {
            self.state.current_memo = Some(memo.clone());
        }
    }

    pub fn set_current(&mut self, memo: Option<Memo>) {
        self.state.current_memo = memo;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.state.error = error;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
    }

    /// Drop everything, e.g. on sign-out.
    pub fn reset(&mut self) {
        self.state = MemoState::default();
    }

    /// Write `memos` and `current_memo` to a JSON file.
    pub fn persist_to(&self, path: impl AsRef<Path>) -> ClientResult<()> {
        let snapshot = MemoSnapshot {
            memos: self.state.memos.clone(),
            current_memo: self.state.current_memo.clone(),
        };
        std::fs::write(path, serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(())
    }

    /// Load a snapshot written by [`persist_to`](Self::persist_to). A missing file is not an error.
    pub fn restore_from(&mut self, path: impl AsRef<Path>) -> ClientResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        let snapshot: MemoSnapshot = serde_json::from_slice(&std::fs::read(path)?)?;
        self.state.memos = snapshot.memos;
        self.state.current_memo = snapshot.current_memo;
        Ok(())
    }
}
