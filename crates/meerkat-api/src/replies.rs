use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use meerkat_db::models::ReplyRow;
use meerkat_types::api::{Claims, CreateReplyRequest, ReplyResponse, UpdateReplyRequest};

use crate::authz::{Actor, can_mutate};
use crate::convert::{parse_uuid, reply_response};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_replies(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // Run blocking DB queries off the async runtime
    let db = state.clone();
    let pid = post_id.to_string();
    let rows = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Vec<ReplyRow>>> {
        if db.db.get_post(&pid)?.is_none() {
            return Ok(None);
        }
        Ok(Some(db.db.get_replies_by_post(&pid)?))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
    .ok_or(ApiError::NotFound("post"))?;

    let replies: Vec<ReplyResponse> = rows.into_iter().map(reply_response).collect();
    Ok(Json(replies))
}

pub async fn create_reply(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.is_empty() {
        return Err(ApiError::Validation("reply content must not be empty".into()));
    }

    let reply_id = Uuid::new_v4();
    let db = state.clone();
    let pid = post_id.to_string();
    let rid = reply_id.to_string();
    let aid = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<ReplyRow>> {
        if db.db.get_post(&pid)?.is_none() {
            return Ok(None);
        }
        db.db.insert_reply(&rid, &pid, &aid, &req.content)?;
        let row = db
            .db
            .get_reply(&rid)?
            .ok_or_else(|| anyhow!("freshly created reply {rid} missing"))?;
        Ok(Some(row))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
    .ok_or(ApiError::NotFound("post"))?;

    Ok((StatusCode::CREATED, Json(reply_response(row))))
}

pub async fn update_reply(
    State(state): State<AppState>,
    Path((post_id, reply_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rid = reply_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_reply(&rid))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
        // A reply is only addressable under its own post.
        .filter(|r| r.post_id == post_id.to_string())
        .ok_or(ApiError::NotFound("reply"))?;

    let author_id = parse_uuid("author_id", &row.author_id);
    if !can_mutate(&Actor::from(&claims), author_id) {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    let rid = reply_id.to_string();
    let row = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<ReplyRow>> {
        db.db.update_reply(&rid, req.content.as_deref())?;
        db.db.get_reply(&rid)
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
    .ok_or(ApiError::NotFound("reply"))?;

    Ok(Json(reply_response(row)))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    Path((post_id, reply_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rid = reply_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_reply(&rid))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
        .filter(|r| r.post_id == post_id.to_string())
        .ok_or(ApiError::NotFound("reply"))?;

    let author_id = parse_uuid("author_id", &row.author_id);
    if !can_mutate(&Actor::from(&claims), author_id) {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    let rid = reply_id.to_string();
    tokio::task::spawn_blocking(move || db.db.delete_reply(&rid))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;

    Ok(StatusCode::NO_CONTENT)
}
