use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use meerkat_db::models::PostRow;
use meerkat_types::api::{Claims, CreatePostRequest, PostResponse, UpdatePostRequest};

use crate::authz::{Actor, can_mutate};
use crate::convert::{parse_uuid, post_response};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_posts(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // Run blocking DB queries off the async runtime
    let db = state.clone();
    let bid = board_id.to_string();
    let rows = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Vec<PostRow>>> {
        if db.db.get_board(&bid)?.is_none() {
            return Ok(None);
        }
        Ok(Some(db.db.get_posts_by_board(&bid)?))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
    .ok_or(ApiError::NotFound("board"))?;

    let posts: Vec<PostResponse> = rows.into_iter().map(post_response).collect();
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path((board_id, post_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let pid = post_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_post(&pid))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
        // A post is only addressable under its own board.
        .filter(|p| p.board_id == board_id.to_string())
        .ok_or(ApiError::NotFound("post"))?;

    Ok(Json(post_response(row)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.is_empty() {
        return Err(ApiError::Validation("post title must not be empty".into()));
    }

    let post_id = Uuid::new_v4();
    let db = state.clone();
    let bid = board_id.to_string();
    let pid = post_id.to_string();
    let aid = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<PostRow>> {
        if db.db.get_board(&bid)?.is_none() {
            return Ok(None);
        }
        db.db.insert_post(&pid, &bid, &aid, &req.title, &req.content)?;
        let row = db
            .db
            .get_post(&pid)?
            .ok_or_else(|| anyhow!("freshly created post {pid} missing"))?;
        Ok(Some(row))
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
    .ok_or(ApiError::NotFound("board"))?;

    Ok((StatusCode::CREATED, Json(post_response(row))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path((board_id, post_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let pid = post_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_post(&pid))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
        .filter(|p| p.board_id == board_id.to_string())
        .ok_or(ApiError::NotFound("post"))?;

    let author_id = parse_uuid("author_id", &row.author_id);
    if !can_mutate(&Actor::from(&claims), author_id) {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    let pid = post_id.to_string();
    let row = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<PostRow>> {
        db.db
            .update_post(&pid, req.title.as_deref(), req.content.as_deref())?;
        db.db.get_post(&pid)
    })
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
    .ok_or(ApiError::NotFound("post"))?;

    Ok(Json(post_response(row)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path((board_id, post_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let pid = post_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_post(&pid))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??
        .filter(|p| p.board_id == board_id.to_string())
        .ok_or(ApiError::NotFound("post"))?;

    let author_id = parse_uuid("author_id", &row.author_id);
    if !can_mutate(&Actor::from(&claims), author_id) {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    let pid = post_id.to_string();
    tokio::task::spawn_blocking(move || db.db.delete_post(&pid))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;

    Ok(StatusCode::NO_CONTENT)
}
