//! `/api/memos` handlers.
//!
//! Order of checks for item routes: session (401), existence (404),
//! ownership (403), payload (400).

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::{ensure_user, parse_json, AppState, Authenticated};
use crate::memo::list::ListQuery;
use crate::memo::types::{Memo, MemoPatch, NewMemo};
use crate::memo::validate::FieldViolation;
use crate::memo::{list, normalize_timestamp, stats, store};

/// Raw query string for the list endpoint. Parsed by hand so bad values
/// produce field-level 400s.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub is_favorite: Option<String>,
    pub is_archived: Option<String>,
    pub search: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse `limit`: absent means `default`, above `max` is clamped, below 1 is an error.
pub fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> ApiResult<usize> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Ok(default.min(max));
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::invalid("limit", "invalid_type", "limit must be an integer"))?;
    if value < 1 {
        return Err(ApiError::invalid(
            "limit",
            "too_small",
            "limit must be at least 1",
        ));
    }
    Ok((value as usize).min(max))
}

pub fn parse_flag(field: &str, raw: Option<&str>) -> ApiResult<Option<bool>> {
    match raw {
        None | Some("") => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(_) => Err(ApiError::invalid(
            field,
            "invalid_type",
            format!("{field} must be true or false"),
        )),
    }
}

/// Keep the value, or move its violations into `violations`.
fn collect<T>(violations: &mut Vec<FieldViolation>, result: ApiResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(ApiError::Validation(mut v)) => {
            violations.append(&mut v);
            None
        }
        Err(_) => None,
    }
}

impl ListParams {
    pub fn into_query(self, default_limit: usize, max_limit: usize) -> ApiResult<ListQuery> {
        let mut violations = Vec::new();

        let limit = collect(
            &mut violations,
            parse_limit(self.limit.as_deref(), default_limit, max_limit),
        );
        let is_favorite = collect(
            &mut violations,
            parse_flag("isFavorite", self.is_favorite.as_deref()),
        );
        let is_archived = collect(
            &mut violations,
            parse_flag("isArchived", self.is_archived.as_deref()),
        );
        let cursor = non_empty(self.cursor);
        if let Some(raw) = &cursor {
            if normalize_timestamp(raw).is_none() {
                violations.push(FieldViolation::new(
                    "cursor",
                    "invalid_cursor",
                    "cursor must be an RFC 3339 timestamp",
                ));
            }
        }

        if !violations.is_empty() {
            return Err(ApiError::Validation(violations));
        }

        Ok(ListQuery {
            cursor,
            limit: limit.unwrap_or(default_limit),
            category: non_empty(self.category),
            is_favorite: is_favorite.flatten(),
            is_archived: is_archived.flatten(),
            search: non_empty(self.search),
        })
    }
}

/// Fetch a memo and check it belongs to `user_id`. 404 wins over 403.
async fn load_owned(state: &AppState, id: String, user_id: &str) -> ApiResult<Memo> {
    let memo = state
        .run_db(move |conn| store::get_memo(conn, &id))
        .await?
        .ok_or(ApiError::NotFound("memo not found"))?;
    if memo.user_id != user_id {
        tracing::warn!(memo_id = %memo.id, user_id = %user_id, "memo access denied");
        return Err(ApiError::Forbidden);
    }
    Ok(memo)
}

/// `GET /api/memos`
pub async fn list_memos(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let api = &state.config.api;
    let query = params.into_query(api.default_page_size, api.max_page_size)?;
    let user_id = user.id.clone();
    let page = state
        .run_db(move |conn| list::list_memos(conn, &user_id, &query))
        .await?;

    Ok(Json(json!({
        "data": page.memos,
        "pagination": {
            "nextCursor": page.next_cursor,
            "hasNextPage": page.has_next_page,
            "limit": page.limit,
        }
    })))
}

/// `POST /api/memos`
pub async fn create_memo(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let new_memo: NewMemo = parse_json(&body)?;
    ensure_user(&state, &user).await?;

    let user_id = user.id.clone();
    let memo = state
        .run_db(move |conn| store::create_memo(conn, &user_id, &new_memo))
        .await?;

    tracing::info!(memo_id = %memo.id, user_id = %user.id, "memo created");
    Ok((StatusCode::CREATED, Json(json!({ "data": memo }))))
}

/// `GET /api/memos/{id}`
pub async fn get_memo(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let memo = load_owned(&state, id, &user.id).await?;
    Ok(Json(json!({ "data": memo })))
}

/// `PUT /api/memos/{id}`
pub async fn update_memo(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    load_owned(&state, id.clone(), &user.id).await?;
    let patch: MemoPatch = parse_json(&body)?;

    let memo = state
        .run_db(move |conn| store::update_memo(conn, &id, &patch))
        .await?;

    tracing::info!(memo_id = %memo.id, "memo updated");
    Ok(Json(json!({ "data": memo })))
}

/// `DELETE /api/memos/{id}`
pub async fn delete_memo(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let memo = load_owned(&state, id, &user.id).await?;
    let memo_id = memo.id.clone();
    let deleted = state
        .run_db(move |conn| store::delete_memo(conn, &memo_id))
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("memo not found"));
    }

    tracing::info!(memo_id = %memo.id, "memo deleted");
    Ok(Json(json!({ "message": "memo deleted" })))
}

/// `POST /api/memos/{id}/favorite`
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    load_owned(&state, id.clone(), &user.id).await?;
    let memo = state
        .run_db(move |conn| store::toggle_favorite(conn, &id))
        .await?
        .ok_or(ApiError::NotFound("memo not found"))?;
    Ok(Json(json!({ "data": memo })))
}

/// `GET /api/memos/stats`
pub async fn memo_stats(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<impl IntoResponse> {
    let scan_limit = state.config.api.stats_scan_limit;
    let user_id = user.id.clone();
    let stats = state
        .run_db(move |conn| stats::memo_stats(conn, &user_id, scan_limit))
        .await?;
    Ok(Json(json!({ "data": stats })))
}
