//! JSON export/import of users, tags and memos (`memora export` / `memora import`).

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::store::{memo_from_row, restore_memo, MEMO_COLUMNS};
use super::tags::{list_tags, load_memo_tags, restore_tag};
use super::types::{Memo, Tag, User};
use super::users::{get_user, list_users, upsert_user};
use super::MemoResult;

/// Export document. Import accepts the same shape.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub memos: Vec<Memo>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: u64,
    pub tags_created: u64,
    pub memos_imported: u64,
    /// Memos whose id already existed.
    pub memos_skipped: u64,
}

/// Collect everything, or only `user_id`'s data, oldest memo first.
pub fn export_data(conn: &Connection, user_id: Option<&str>) -> MemoResult<ExportData> {
    let users = match user_id {
        Some(id) => get_user(conn, id)?.into_iter().collect(),
        None => list_users(conn)?,
    };

    let mut tags = Vec::new();
    for user in &users {
        tags.extend(list_tags(conn, &user.id)?);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMO_COLUMNS} FROM memos WHERE (?1 IS NULL OR user_id = ?1) ORDER BY created_at, id"
    ))?;
    let mut memos = stmt
        .query_map(params![user_id], memo_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for memo in &mut memos {
        memo.tags = load_memo_tags(conn, &memo.id)?;
    }

    Ok(ExportData { users, tags, memos })
}

/// Load an export. Existing memo ids and tag names are left alone; timestamps
/// and ids of new rows are preserved. Users referenced only by memos are
/// created with a placeholder email.
pub fn import_data(conn: &mut Connection, data: &ExportData) -> MemoResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for user in &data.users {
        upsert_user(
            conn,
            &user.id,
            &user.email,
            user.name.as_deref(),
            user.avatar_url.as_deref(),
        )?;
        summary.users += 1;
    }

    for memo in &data.memos {
        if get_user(conn, &memo.user_id)?.is_none() {
            upsert_user(
                conn,
                &memo.user_id,
                &format!("{}@imported.invalid", memo.user_id),
                None,
                None,
            )?;
            summary.users += 1;
        }
    }

    for tag in &data.tags {
        if get_user(conn, &tag.user_id)?.is_none() {
            continue;
        }
        if restore_tag(conn, tag)? {
            summary.tags_created += 1;
        }
    }

    for memo in &data.memos {
        if restore_memo(conn, memo)? {
            summary.memos_imported += 1;
        } else {
            summary.memos_skipped += 1;
        }
    }

    tracing::info!(
        imported = summary.memos_imported,
        skipped = summary.memos_skipped,
        "import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::list::{list_memos, ListQuery};
    use crate::memo::store::create_memo;
    use crate::memo::tags::create_tag;
    use crate::memo::types::{NewMemo, NewTag};
    use crate::memo::MemoError;

    fn populated() -> Connection {
        let mut conn = crate::db::open_memory_database().unwrap();
        for (id, email) in [("u1", "one@example.com"), ("u2", "two@example.com")] {
            upsert_user(&conn, id, email, None, None).unwrap();
            create_tag(
                &conn,
                id,
                &NewTag {
                    name: "pinned".into(),
                    color: Some("#00ff00".into()),
                },
            )
            .unwrap();
            create_memo(
                &mut conn,
                id,
                &NewMemo {
                    title: format!("{id} memo"),
                    content: "body".into(),
                    tags: Some(vec!["pinned".into(), "todo".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        conn
    }

    #[test]
    fn export_can_be_scoped_to_one_user() {
        let conn = populated();
        let all = export_data(&conn, None).unwrap();
        assert_eq!(all.users.len(), 2);
        assert_eq!(all.memos.len(), 2);
        assert_eq!(all.tags.len(), 4);

        let one = export_data(&conn, Some("u2")).unwrap();
        assert_eq!(one.users.len(), 1);
        assert_eq!(one.memos.len(), 1);
        assert_eq!(one.memos[0].user_id, "u2");
        assert_eq!(one.memos[0].tags, vec!["pinned".to_string(), "todo".to_string()]);
    }

    #[test]
    fn import_into_empty_db_preserves_records() {
        let source = populated();
        let exported = export_data(&source, None).unwrap();

        let mut target = crate::db::open_memory_database().unwrap();
        let summary = import_data(&mut target, &exported).unwrap();
        assert_eq!(summary.memos_imported, 2);
        assert_eq!(summary.memos_skipped, 0);
        assert_eq!(summary.tags_created, 4);

        let reexported = export_data(&target, None).unwrap();
        assert_eq!(reexported.memos, exported.memos);
        let colors: Vec<_> = reexported
            .tags
            .iter()
            .filter(|t| t.name == "pinned")
            .map(|t| t.color.clone())
            .collect();
        assert_eq!(colors, vec![Some("#00ff00".to_string()); 2]);
    }

    #[test]
    fn reimport_skips_existing_memos() {
        let mut conn = populated();
        let exported = export_data(&conn, None).unwrap();
        let summary = import_data(&mut conn, &exported).unwrap();
        assert_eq!(summary.memos_imported, 0);
        assert_eq!(summary.memos_skipped, 2);
        assert_eq!(summary.tags_created, 0);
    }

    #[test]
    fn memos_without_user_records_get_placeholder_users() {
        let source = populated();
        let mut exported = export_data(&source, Some("u1")).unwrap();
        exported.users.clear();
        exported.tags.clear();

        let mut target = crate::db::open_memory_database().unwrap();
        let summary = import_data(&mut target, &exported).unwrap();
        assert_eq!(summary.memos_imported, 1);
        let user = get_user(&target, "u1").unwrap().unwrap();
        assert_eq!(user.email, "u1@imported.invalid");
    }

    #[test]
    fn imported_timestamps_are_stored_in_canonical_form() {
        let source = populated();
        let mut exported = export_data(&source, Some("u1")).unwrap();
        let template = exported.memos.remove(0);
        for (id, created_at) in [
            ("m-millis", "2026-01-01T00:00:00.000Z"),
            ("m-micros", "2026-01-01T00:00:00.500000Z"),
            ("m-offset", "2026-01-01T02:00:01+02:00"),
        ] {
            exported.memos.push(Memo {
                id: id.into(),
                created_at: created_at.into(),
                updated_at: created_at.into(),
                ..template.clone()
            });
        }
        for tag in &mut exported.tags {
            tag.created_at = "2026-01-01T00:00:00Z".into();
        }

        let mut target = crate::db::open_memory_database().unwrap();
        let summary = import_data(&mut target, &exported).unwrap();
        assert_eq!(summary.memos_imported, 3);
        assert!(list_tags(&target, "u1")
            .unwrap()
            .iter()
            .all(|t| t.created_at == "2026-01-01T00:00:00.000000Z"));

        // walking one memo per page reaches every imported memo
        let mut cursor = None;
        let mut seen = Vec::new();
        loop {
            let page = list_memos(
                &target,
                "u1",
                &ListQuery {
                    limit: 1,
                    cursor: cursor.clone(),
                    ..Default::default()
                },
            )
            .unwrap();
            seen.extend(page.memos.iter().map(|m| (m.id.clone(), m.created_at.clone())));
            if page.next_cursor.is_none() {
                break;
            }
            cursor = page.next_cursor;
        }
        assert_eq!(
            seen,
            vec![
                ("m-offset".to_string(), "2026-01-01T00:00:01.000000Z".to_string()),
                ("m-micros".to_string(), "2026-01-01T00:00:00.500000Z".to_string()),
                ("m-millis".to_string(), "2026-01-01T00:00:00.000000Z".to_string()),
            ]
        );
    }

    #[test]
    fn unparseable_imported_timestamp_is_rejected() {
        let source = populated();
        let mut exported = export_data(&source, Some("u1")).unwrap();
        exported.memos[0].created_at = "yesterday".into();

        let mut target = crate::db::open_memory_database().unwrap();
        let err = import_data(&mut target, &exported).unwrap_err();
        match err {
            MemoError::Validation(violations) => {
                assert_eq!(violations[0].field, "createdAt");
                assert_eq!(violations[0].code, "invalid_format");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(export_data(&target, None).unwrap().memos.is_empty());
    }
}
