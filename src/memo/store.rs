//! Memo write path and point lookups: create, get, update, delete, favorite toggle.
//!
//! Multi-statement writes (a memo row plus its tag associations) run inside a
//! transaction. [`toggle_favorite`] is one atomic `UPDATE`.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::tags::{load_memo_tags, set_memo_tags};
use super::types::{Memo, MemoPatch, NewMemo};
use super::validate::{normalize_tags, validate_new_memo, validate_patch};
use super::{canonical_timestamp, now_timestamp, timestamp, MemoError, MemoResult};

/// Column list shared by every `SELECT` that hydrates a [`Memo`] through [`memo_from_row`].
pub(crate) const MEMO_COLUMNS: &str = "id, user_id, title, content, summary, category, \
     audio_url, is_favorite, is_archived, metadata, created_at, updated_at";

/// Map a row selected with [`MEMO_COLUMNS`]. Tags are attached separately.
pub(crate) fn memo_from_row(row: &Row<'_>) -> rusqlite::Result<Memo> {
    let metadata: Option<String> = row.get(9)?;
    Ok(Memo {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        summary: row.get(4)?,
        category: row.get(5)?,
        tags: Vec::new(),
        audio_url: row.get(6)?,
        is_favorite: row.get(7)?,
        is_archived: row.get(8)?,
        metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Fetch a memo by primary key, with its tags.
pub fn get_memo(conn: &Connection, id: &str) -> MemoResult<Option<Memo>> {
    let memo = conn
        .query_row(
            &format!("SELECT {MEMO_COLUMNS} FROM memos WHERE id = ?1"),
            params![id],
            memo_from_row,
        )
        .optional()?;

    match memo {
        Some(mut memo) => {
            memo.tags = load_memo_tags(conn, &memo.id)?;
            Ok(Some(memo))
        }
        None => Ok(None),
    }
}

/// Validate and insert a new memo owned by `user_id`, timestamped now.
pub fn create_memo(conn: &mut Connection, user_id: &str, memo: &NewMemo) -> MemoResult<Memo> {
    insert_memo_at(conn, user_id, memo, Utc::now())
}

/// Same as [`create_memo`] with an explicit creation time.
/// `createdAt` and `updatedAt` are both set to `at`.
pub fn insert_memo_at(
    conn: &mut Connection,
    user_id: &str,
    memo: &NewMemo,
    at: DateTime<Utc>,
) -> MemoResult<Memo> {
    validate_new_memo(memo)?;

    let id = uuid::Uuid::now_v7().to_string();
    let now = timestamp(at);
    let metadata_json = memo.metadata.as_ref().map(serde_json::to_string).transpose()?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memos (id, user_id, title, content, summary, category, audio_url, \
         is_favorite, is_archived, metadata, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8, ?9, ?9)",
        params![
            id,
            user_id,
            memo.title,
            memo.content,
            non_blank(memo.summary.as_deref()),
            non_blank(memo.category.as_deref()),
            non_blank(memo.audio_url.as_deref()),
            metadata_json,
            now,
        ],
    )?;

    let tags = normalize_tags(memo.tags.as_deref().unwrap_or_default());
    set_memo_tags(&tx, user_id, &id, &tags, &now)?;
    tx.commit()?;

    tracing::debug!(memo_id = %id, user_id = %user_id, tags = tags.len(), "memo created");

    get_memo(conn, &id)?.ok_or(MemoError::NotFound(id))
}

/// Insert a complete memo record as-is (id, flags, and timestamps preserved).
/// Timestamps are rewritten in canonical form and rejected if unparseable.
///
/// Returns `false` without writing when a memo with the same id already exists.
pub fn restore_memo(conn: &mut Connection, memo: &Memo) -> MemoResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM memos WHERE id = ?1",
        params![memo.id],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }

    validate_new_memo(&NewMemo {
        title: memo.title.clone(),
        content: memo.content.clone(),
        category: memo.category.clone(),
        tags: Some(memo.tags.clone()),
        summary: memo.summary.clone(),
        audio_url: memo.audio_url.clone(),
        metadata: memo.metadata.clone(),
    })?;
    let created_at = canonical_timestamp("createdAt", &memo.created_at)?;
    let updated_at = canonical_timestamp("updatedAt", &memo.updated_at)?;

    let metadata_json = memo.metadata.as_ref().map(serde_json::to_string).transpose()?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memos (id, user_id, title, content, summary, category, audio_url, \
         is_favorite, is_archived, metadata, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            memo.id,
            memo.user_id,
            memo.title,
            memo.content,
            memo.summary,
            memo.category,
            memo.audio_url,
            memo.is_favorite,
            memo.is_archived,
            metadata_json,
            created_at,
            updated_at,
        ],
    )?;
    set_memo_tags(
        &tx,
        &memo.user_id,
        &memo.id,
        &normalize_tags(&memo.tags),
        &created_at,
    )?;
    tx.commit()?;

    Ok(true)
}

/// Apply a partial update. Only supplied fields change; `updatedAt` is always refreshed.
///
/// Rejects an empty patch. Returns [`MemoError::NotFound`] when no memo has this id.
pub fn update_memo(conn: &mut Connection, id: &str, patch: &MemoPatch) -> MemoResult<Memo> {
    validate_patch(patch)?;

    let tx = conn.transaction()?;
    let owner: Option<String> = tx
        .query_row(
            "SELECT user_id FROM memos WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(owner) = owner else {
        return Err(MemoError::NotFound(id.to_string()));
    };

    let now = now_timestamp();
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(title) = &patch.title {
        sets.push("title = ?");
        values.push(Value::Text(title.clone()));
    }
    if let Some(content) = &patch.content {
        sets.push("content = ?");
        values.push(Value::Text(content.clone()));
    }
    if let Some(summary) = &patch.summary {
        sets.push("summary = ?");
        values.push(nullable_text(summary));
    }
    if let Some(category) = &patch.category {
        sets.push("category = ?");
        values.push(nullable_text(category));
    }
    if let Some(audio_url) = &patch.audio_url {
        sets.push("audio_url = ?");
        values.push(nullable_text(audio_url));
    }
    if let Some(is_favorite) = patch.is_favorite {
        sets.push("is_favorite = ?");
        values.push(Value::Integer(is_favorite.into()));
    }
    if let Some(is_archived) = patch.is_archived {
        sets.push("is_archived = ?");
        values.push(Value::Integer(is_archived.into()));
    }
    if let Some(metadata) = &patch.metadata {
        sets.push("metadata = ?");
        values.push(Value::Text(serde_json::to_string(metadata)?));
    }
    sets.push("updated_at = ?");
    values.push(Value::Text(now.clone()));
    values.push(Value::Text(id.to_string()));

    let sql = format!("UPDATE memos SET {} WHERE id = ?", sets.join(", "));
    tx.execute(&sql, params_from_iter(values))?;

    if let Some(tags) = &patch.tags {
        set_memo_tags(&tx, &owner, id, &normalize_tags(tags), &now)?;
    }
    tx.commit()?;

    tracing::debug!(memo_id = %id, fields = sets.len() - 1, "memo updated");

    get_memo(conn, id)?.ok_or_else(|| MemoError::NotFound(id.to_string()))
}

/// Hard-delete a memo. Join rows in `memo_tags` go with it via `ON DELETE CASCADE`.
///
/// Returns `false` if nothing was deleted.
pub fn delete_memo(conn: &Connection, id: &str) -> MemoResult<bool> {
    let rows = conn.execute("DELETE FROM memos WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

/// Flip `is_favorite` in a single statement, so concurrent toggles cannot
/// lose an update. Returns `None` if the memo does not exist.
pub fn toggle_favorite(conn: &Connection, id: &str) -> MemoResult<Option<Memo>> {
    let rows = conn.execute(
        "UPDATE memos SET is_favorite = 1 - is_favorite, updated_at = ?1 WHERE id = ?2",
        params![now_timestamp(), id],
    )?;
    if rows == 0 {
        return Ok(None);
    }
    get_memo(conn, id)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn nullable_text(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::Text(value.to_string())
    }
}
