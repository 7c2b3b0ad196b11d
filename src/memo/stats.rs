//! Per-user memo statistics for the dashboard and `memora stats`.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use super::{timestamp, MemoResult};

pub const DEFAULT_STATS_SCAN_LIMIT: usize = 1000;

/// Aggregates over a user's most recent memos.
///
/// Counts cover at most `scan_limit` memos (newest first), so `total` is
/// capped by that limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoStats {
    pub total: u64,
    pub favorites: u64,
    pub archived: u64,
    /// Distinct non-empty categories, alphabetical.
    pub categories: Vec<String>,
    /// Distinct tag labels in use, alphabetical.
    pub tags: Vec<String>,
    pub category_count: u64,
    pub tag_count: u64,
    /// Memos created in the last 7 days.
    pub recent_count: u64,
}

const RECENT_SCAN: &str = "SELECT id, category, is_favorite, is_archived, created_at FROM memos \
     WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2";

pub fn memo_stats(conn: &Connection, user_id: &str, scan_limit: usize) -> MemoResult<MemoStats> {
    let week_ago = timestamp(Utc::now() - Duration::days(7));
    let limit = scan_limit as i64;

    let (total, favorites, archived, recent_count): (i64, i64, i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(is_favorite), 0), COALESCE(SUM(is_archived), 0), \
             COALESCE(SUM(created_at > ?3), 0) FROM ({RECENT_SCAN})"
        ),
        params![user_id, limit, week_ago],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    let categories = distinct_strings(
        conn,
        &format!(
            "SELECT DISTINCT category FROM ({RECENT_SCAN}) \
             WHERE category IS NOT NULL AND category != '' ORDER BY category"
        ),
        user_id,
        limit,
    )?;

    let tags = distinct_strings(
        conn,
        &format!(
            "SELECT DISTINCT t.name FROM ({RECENT_SCAN}) m \
             JOIN memo_tags mt ON mt.memo_id = m.id \
             JOIN tags t ON t.id = mt.tag_id ORDER BY t.name"
        ),
        user_id,
        limit,
    )?;

    Ok(MemoStats {
        total: total as u64,
        favorites: favorites as u64,
        archived: archived as u64,
        category_count: categories.len() as u64,
        tag_count: tags.len() as u64,
        categories,
        tags,
        recent_count: recent_count as u64,
    })
}

fn distinct_strings(
    conn: &Connection,
    sql: &str,
    user_id: &str,
    limit: i64,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![user_id, limit], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::store::{create_memo, insert_memo_at, toggle_favorite};
    use crate::memo::types::NewMemo;
    use crate::memo::users::upsert_user;

    fn memo(title: &str, category: Option<&str>, tags: &[&str]) -> NewMemo {
        NewMemo {
            title: title.into(),
            content: "body".into(),
            category: category.map(Into::into),
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_user_has_zero_stats() {
        let conn = crate::db::open_memory_database().unwrap();
        let stats = memo_stats(&conn, "nobody", DEFAULT_STATS_SCAN_LIMIT).unwrap();
        assert_eq!(stats, MemoStats::default());
    }

    #[test]
    fn test_counts_and_distinct_labels() {
        let mut conn = crate::db::open_memory_database().unwrap();
        upsert_user(&conn, "u", "u@example.com", None, None).unwrap();

        let a = create_memo(&mut conn, "u", &memo("a", Some("work"), &["x", "y"])).unwrap();
        create_memo(&mut conn, "u", &memo("b", Some("work"), &["y"])).unwrap();
        create_memo(&mut conn, "u", &memo("c", None, &[])).unwrap();
        // older than a week
        insert_memo_at(
            &mut conn,
            "u",
            &memo("old", Some("home"), &["z"]),
            Utc::now() - Duration::days(30),
        )
        .unwrap();
        toggle_favorite(&conn, &a.id).unwrap();

        let stats = memo_stats(&conn, "u", DEFAULT_STATS_SCAN_LIMIT).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.archived, 0);
        assert_eq!(stats.categories, vec!["home".to_string(), "work".to_string()]);
        assert_eq!(stats.tags, vec!["x".to_string(), "y".to_string(), "z".to_string()]);
        assert_eq!(stats.category_count, 2);
        assert_eq!(stats.tag_count, 3);
        assert_eq!(stats.recent_count, 3);
    }

    #[test]
    fn test_scan_limit_caps_window() {
        let mut conn = crate::db::open_memory_database().unwrap();
        upsert_user(&conn, "u", "u@example.com", None, None).unwrap();
        insert_memo_at(
            &mut conn,
            "u",
            &memo("old", Some("home"), &["z"]),
            Utc::now() - Duration::days(30),
        )
        .unwrap();
        create_memo(&mut conn, "u", &memo("new", Some("work"), &[])).unwrap();

        let stats = memo_stats(&conn, "u", 1).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.categories, vec!["work".to_string()]);
        assert!(stats.tags.is_empty());
    }
}
