use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use meerkat_types::api::{Claims, CreateUserRequest, InfoResponse, UpdateUserRequest, UserResponse};

use crate::auth::{
    generate_confirmation_code, hash_password, validate_email, validate_password,
    validate_username,
};
use crate::convert::user_response;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_users())
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;
    let users: Vec<UserResponse> = rows.into_iter().map(user_response).collect();
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_user_by_username(&username)?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(user_response(row)))
}

/// Admin-only: create an account with an explicit role. Self-service
/// signup goes through /auth/register.
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    if state.db.username_exists(&req.username)? {
        return Err(ApiError::Conflict("username is already taken".into()));
    }
    if state.db.email_exists(&req.email)? {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;

    let user_id = Uuid::new_v4();
    let code = generate_confirmation_code();

    state.db.create_user(
        &user_id.to_string(),
        &req.username,
        &req.email,
        &password_hash,
        req.role.as_str(),
        &code,
    )?;

    let row = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| anyhow!("freshly created user {user_id} missing"))?;

    Ok((StatusCode::CREATED, Json(user_response(row))))
}

/// Update the authenticated user's own account.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    if let Some(username) = &req.username {
        validate_username(username)?;
        if *username != current.username && state.db.username_exists(username)? {
            return Err(ApiError::Conflict("username is already taken".into()));
        }
    }
    if let Some(email) = &req.email {
        validate_email(email)?;
        if *email != current.email && state.db.email_exists(email)? {
            return Err(ApiError::Conflict("email is already registered".into()));
        }
    }

    let password_hash = match req.password {
        Some(password) => {
            validate_password(&password)?;
            Some(
                tokio::task::spawn_blocking(move || hash_password(&password))
                    .await
                    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??,
            )
        }
        None => None,
    };

    state.db.update_user(
        &claims.sub.to_string(),
        req.username.as_deref(),
        req.email.as_deref(),
        password_hash.as_deref(),
    )?;

    let row = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(user_response(row)))
}

/// Delete the authenticated user's own account. Owned posts and replies
/// go with it.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.delete_user(&claims.sub.to_string())?;
    if deleted == 0 {
        return Err(ApiError::NotFound("user"));
    }

    Ok(Json(InfoResponse {
        message: "account deleted".into(),
    }))
}
