//! Tag catalog and memo/tag associations.
//!
//! `tags` + `memo_tags` are the source of truth for a memo's labels; the
//! `tags` array on [`Memo`](super::types::Memo) is always derived from them.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{NewTag, Tag};
use super::validate::validate_new_tag;
use super::{canonical_timestamp, now_timestamp, MemoError, MemoResult};

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Tag labels attached to a memo, in position order.
pub fn load_memo_tags(conn: &Connection, memo_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM memo_tags mt JOIN tags t ON t.id = mt.tag_id \
         WHERE mt.memo_id = ?1 ORDER BY mt.position",
    )?;
    let names = stmt
        .query_map(params![memo_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Make sure every name exists in the user's catalog. Returns tag ids in input order.
pub fn ensure_tags(
    conn: &Connection,
    user_id: &str,
    names: &[String],
    now: &str,
) -> rusqlite::Result<Vec<String>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        conn.execute(
            "INSERT INTO tags (id, user_id, name, color, created_at) VALUES (?1, ?2, ?3, NULL, ?4) \
             ON CONFLICT(user_id, name) DO NOTHING",
            params![uuid::Uuid::now_v7().to_string(), user_id, name, now],
        )?;
        let id: String = conn.query_row(
            "SELECT id FROM tags WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
            |row| row.get(0),
        )?;
        ids.push(id);
    }
    Ok(ids)
}

/// Replace a memo's associations with `names` (already normalized).
/// Callers wrap this in the same transaction as the memo write.
pub fn set_memo_tags(
    conn: &Connection,
    user_id: &str,
    memo_id: &str,
    names: &[String],
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM memo_tags WHERE memo_id = ?1", params![memo_id])?;

    let tag_ids = ensure_tags(conn, user_id, names, now)?;
    for (position, tag_id) in tag_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO memo_tags (id, memo_id, tag_id, position, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::now_v7().to_string(),
                memo_id,
                tag_id,
                position as i64,
                now
            ],
        )?;
    }
    Ok(())
}

/// All tags owned by a user, ordered by name.
pub fn list_tags(conn: &Connection, user_id: &str) -> MemoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, color, created_at FROM tags WHERE user_id = ?1 ORDER BY name",
    )?;
    let tags = stmt
        .query_map(params![user_id], tag_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

pub fn get_tag(conn: &Connection, id: &str) -> MemoResult<Option<Tag>> {
    let tag = conn
        .query_row(
            "SELECT id, user_id, name, color, created_at FROM tags WHERE id = ?1",
            params![id],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

/// Add a tag to the user's catalog. A name already in the catalog is a validation error.
pub fn create_tag(conn: &Connection, user_id: &str, tag: &NewTag) -> MemoResult<Tag> {
    validate_new_tag(tag)?;
    let name = tag.name.trim();

    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM tags WHERE user_id = ?1 AND name = ?2",
        params![user_id, name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(MemoError::invalid(
            "name",
            "duplicate",
            format!("tag '{name}' already exists"),
        ));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO tags (id, user_id, name, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, name, tag.color, now_timestamp()],
    )?;

    get_tag(conn, &id)?.ok_or(MemoError::NotFound(id))
}

/// Insert a catalog entry as-is. Skipped (returns `false`) when the id or the
/// user's tag name already exists.
pub fn restore_tag(conn: &Connection, tag: &Tag) -> MemoResult<bool> {
    let created_at = canonical_timestamp("createdAt", &tag.created_at)?;
    let rows = conn.execute(
        "INSERT OR IGNORE INTO tags (id, user_id, name, color, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![tag.id, tag.user_id, tag.name, tag.color, created_at],
    )?;
    Ok(rows > 0)
}

/// Delete a tag; its associations cascade, so the label disappears from every memo.
pub fn delete_tag(conn: &Connection, id: &str) -> MemoResult<bool> {
    let rows = conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
