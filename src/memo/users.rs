//! Local mirror of auth-provider identities.
//!
//! Users are created by the external auth provider; Memora only upserts the
//! identity it resolved so that `memos.user_id` / `tags.user_id` have a row to
//! reference.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::User;
use super::{now_timestamp, MemoResult};

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert or refresh the mirrored user row. Profile fields are overwritten
/// only when the provider supplies them.
pub fn upsert_user(
    conn: &Connection,
    id: &str,
    email: &str,
    name: Option<&str>,
    avatar_url: Option<&str>,
) -> MemoResult<User> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO users (id, email, name, avatar_url, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
         ON CONFLICT(id) DO UPDATE SET \
           email = excluded.email, \
           name = COALESCE(excluded.name, users.name), \
           avatar_url = COALESCE(excluded.avatar_url, users.avatar_url), \
           updated_at = excluded.updated_at",
        params![id, email, name, avatar_url, now],
    )?;

    let user = conn.query_row(
        "SELECT id, email, name, avatar_url, created_at, updated_at FROM users WHERE id = ?1",
        params![id],
        user_from_row,
    )?;
    Ok(user)
}

pub fn get_user(conn: &Connection, id: &str) -> MemoResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, name, avatar_url, created_at, updated_at FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Every mirrored user, oldest first.
pub fn list_users(conn: &Connection) -> MemoResult<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, name, avatar_url, created_at, updated_at FROM users ORDER BY created_at",
    )?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}
