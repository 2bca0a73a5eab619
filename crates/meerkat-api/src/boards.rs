use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use meerkat_types::api::{BoardResponse, CreateBoardRequest, UpdateBoardRequest};

use crate::convert::board_response;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_boards(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_boards())
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;
    let boards: Vec<BoardResponse> = rows.into_iter().map(board_response).collect();
    Ok(Json(boards))
}

pub async fn create_board(
    State(state): State<AppState>,
    Json(req): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_empty() || req.name.len() > 64 {
        return Err(ApiError::Validation(
            "board name must be between 1 and 64 characters".into(),
        ));
    }
    if state.db.board_name_exists(&req.name)? {
        return Err(ApiError::Conflict("board name is already taken".into()));
    }

    let board_id = Uuid::new_v4();
    state
        .db
        .create_board(&board_id.to_string(), &req.name, &req.description)?;

    let row = state
        .db
        .get_board(&board_id.to_string())?
        .ok_or_else(|| anyhow!("freshly created board {board_id} missing"))?;

    Ok((StatusCode::CREATED, Json(board_response(row))))
}

pub async fn update_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(req): Json<UpdateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = state
        .db
        .get_board(&board_id.to_string())?
        .ok_or(ApiError::NotFound("board"))?;

    if let Some(name) = &req.name {
        if *name != current.name && state.db.board_name_exists(name)? {
            return Err(ApiError::Conflict("board name is already taken".into()));
        }
    }

    let changed = state.db.update_board(
        &board_id.to_string(),
        req.name.as_deref(),
        req.description.as_deref(),
    )?;
    if changed == 0 {
        return Err(ApiError::NotFound("board"));
    }

    let row = state
        .db
        .get_board(&board_id.to_string())?
        .ok_or(ApiError::NotFound("board"))?;

    Ok(Json(board_response(row)))
}

pub async fn delete_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.delete_board(&board_id.to_string())?;
    if deleted == 0 {
        return Err(ApiError::NotFound("board"));
    }

    Ok(StatusCode::NO_CONTENT)
}
