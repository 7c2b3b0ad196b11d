//! `/api/tags` handlers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::{ensure_user, parse_json, AppState, Authenticated};
use crate::memo::tags;
use crate::memo::types::NewTag;

pub async fn list_tags(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> ApiResult<impl IntoResponse> {
    let tags = state
        .run_db(move |conn| tags::list_tags(conn, &user.id))
        .await?;
    Ok(Json(json!({ "data": tags })))
}

pub async fn create_tag(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let new_tag: NewTag = parse_json(&body)?;
    ensure_user(&state, &user).await?;

    let tag = state
        .run_db(move |conn| tags::create_tag(conn, &user.id, &new_tag))
        .await?;
    tracing::info!(tag_id = %tag.id, name = %tag.name, "tag created");
    Ok((StatusCode::CREATED, Json(json!({ "data": tag }))))
}

/// Removes the tag from the catalog and from every memo carrying it.
pub async fn delete_tag(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let lookup_id = id.clone();
    let tag = state
        .run_db(move |conn| tags::get_tag(conn, &lookup_id))
        .await?
        .ok_or(ApiError::NotFound("tag not found"))?;
    if tag.user_id != user.id {
        return Err(ApiError::Forbidden);
    }

    state
        .run_db(move |conn| tags::delete_tag(conn, &id))
        .await?;
    tracing::info!(tag_id = %tag.id, "tag deleted");
    Ok(Json(json!({ "message": "tag deleted" })))
}
