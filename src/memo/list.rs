//! Filtered, cursor-paginated memo listing.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

use super::store::{memo_from_row, MEMO_COLUMNS};
use super::tags::load_memo_tags;
use super::types::Memo;
use super::{normalize_timestamp, MemoError, MemoResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 50;

/// Filters and paging for [`list_memos`]. `None` filters match everything.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// `createdAt` of the last memo on the previous page; only strictly older rows are returned.
    pub cursor: Option<String>,
    pub limit: usize,
    pub category: Option<String>,
    pub is_favorite: Option<bool>,
    pub is_archived: Option<bool>,
    /// Case-sensitive substring matched against title, content, or summary.
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: DEFAULT_PAGE_SIZE,
            category: None,
            is_favorite: None,
            is_archived: None,
            search: None,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoPage {
    pub memos: Vec<Memo>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
    pub limit: usize,
}

/// List a user's memos newest first (`created_at DESC, id DESC`).
///
/// Fetches `limit + 1` rows so `has_next_page` needs no second query.
pub fn list_memos(conn: &Connection, user_id: &str, query: &ListQuery) -> MemoResult<MemoPage> {
    let limit = query.limit.max(1);

    let mut clauses = vec!["user_id = ?".to_string()];
    let mut values: Vec<Value> = vec![Value::Text(user_id.to_string())];

    if let Some(raw) = &query.cursor {
        let cursor = normalize_timestamp(raw).ok_or_else(|| {
            MemoError::invalid("cursor", "invalid_cursor", "cursor must be an RFC 3339 timestamp")
        })?;
        clauses.push("created_at < ?".into());
        values.push(Value::Text(cursor));
    }
    if let Some(category) = &query.category {
        clauses.push("category = ?".into());
        values.push(Value::Text(category.clone()));
    }
    if let Some(is_favorite) = query.is_favorite {
        clauses.push("is_favorite = ?".into());
        values.push(Value::Integer(is_favorite.into()));
    }
    if let Some(is_archived) = query.is_archived {
        clauses.push("is_archived = ?".into());
        values.push(Value::Integer(is_archived.into()));
    }
    if let Some(search) = &query.search {
        // instr() is case-sensitive, unlike LIKE
        clauses.push(
            "(instr(title, ?) > 0 OR instr(content, ?) > 0 OR instr(COALESCE(summary, ''), ?) > 0)"
                .into(),
        );
        for _ in 0..3 {
            values.push(Value::Text(search.clone()));
        }
    }
    values.push(Value::Integer((limit + 1) as i64));

    let sql = format!(
        "SELECT {MEMO_COLUMNS} FROM memos WHERE {} ORDER BY created_at DESC, id DESC LIMIT ?",
        clauses.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut memos = stmt
        .query_map(params_from_iter(values), memo_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let has_next_page = memos.len() > limit;
    memos.truncate(limit);
    for memo in &mut memos {
        memo.tags = load_memo_tags(conn, &memo.id)?;
    }

    let next_cursor = if has_next_page {
        memos.last().map(|m| m.created_at.clone())
    } else {
        None
    };

    tracing::debug!(
        user_id = %user_id,
        returned = memos.len(),
        has_next_page,
        "listed memos"
    );

    Ok(MemoPage {
        memos,
        next_cursor,
        has_next_page,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::store::{insert_memo_at, update_memo};
    use crate::memo::types::{MemoPatch, NewMemo};
    use crate::memo::users::upsert_user;
    use chrono::{Duration, TimeZone, Utc};

    fn seeded(count: i64) -> Connection {
        let mut conn = crate::db::open_memory_database().unwrap();
        upsert_user(&conn, "user-a", "a@example.com", None, None).unwrap();
        upsert_user(&conn, "user-b", "b@example.com", None, None).unwrap();
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        for i in 0..count {
            let memo = NewMemo {
                title: format!("Memo {i}"),
                content: if i % 2 == 0 { "Even body".into() } else { "odd body".into() },
                category: Some(if i % 3 == 0 { "work" } else { "home" }.into()),
                ..Default::default()
            };
            insert_memo_at(&mut conn, "user-a", &memo, base + Duration::minutes(i)).unwrap();
        }
        conn
    }

    #[test]
    fn test_pages_walk_the_whole_set() {
        let conn = seeded(25);

        let first = list_memos(&conn, "user-a", &ListQuery::default()).unwrap();
        assert_eq!(first.memos.len(), 20);
        assert!(first.has_next_page);
        assert_eq!(first.next_cursor.as_deref(), Some(first.memos[19].created_at.as_str()));
        assert_eq!(first.memos[0].title, "Memo 24");

        let second = list_memos(
            &conn,
            "user-a",
            &ListQuery {
                cursor: first.next_cursor.clone(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(second.memos.len(), 5);
        assert!(!second.has_next_page);
        assert!(second.next_cursor.is_none());
        assert_eq!(second.memos[4].title, "Memo 0");
    }

    #[test]
    fn test_exact_page_has_no_next() {
        let conn = seeded(20);
        let page = list_memos(&conn, "user-a", &ListQuery::default()).unwrap();
        assert_eq!(page.memos.len(), 20);
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_filters_combine() {
        let mut conn = seeded(6);
        let work = list_memos(
            &conn,
            "user-a",
            &ListQuery {
                category: Some("work".into()),
                ..Default::default()
            },
        )
        .unwrap();
        // i = 0, 3
        assert_eq!(work.memos.len(), 2);

        let target = work.memos[0].id.clone();
        update_memo(
            &mut conn,
            &target,
            &MemoPatch {
                is_favorite: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        let favorites = list_memos(
            &conn,
            "user-a",
            &ListQuery {
                is_favorite: Some(true),
                category: Some("work".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(favorites.memos.len(), 1);
        assert_eq!(favorites.memos[0].id, target);
    }

    #[test]
    fn test_search_is_case_sensitive() {
        let conn = seeded(4);
        let hits = |needle: &str| {
            list_memos(
                &conn,
                "user-a",
                &ListQuery {
                    search: Some(needle.into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .memos
            .len()
        };
        assert_eq!(hits("Even"), 2);
        assert_eq!(hits("even"), 0);
        assert_eq!(hits("body"), 4);
        assert_eq!(hits("Memo 3"), 1);
    }

    #[test]
    fn test_other_users_memos_are_invisible() {
        let conn = seeded(3);
        let page = list_memos(&conn, "user-b", &ListQuery::default()).unwrap();
        assert!(page.memos.is_empty());
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_bad_cursor_is_a_validation_error() {
        let conn = seeded(1);
        let err = list_memos(
            &conn,
            "user-a",
            &ListQuery {
                cursor: Some("last tuesday".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        match err {
            MemoError::Validation(v) => assert_eq!(v[0].field, "cursor"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cursor_with_offset_is_normalized() {
        let conn = seeded(3);
        // 09:02Z expressed as +01:00 selects the two older memos
        let page = list_memos(
            &conn,
            "user-a",
            &ListQuery {
                cursor: Some("2026-03-01T10:02:00+01:00".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.memos.len(), 2);
    }
}
