use std::sync::LazyLock;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use meerkat_db::models::UserRow;
use meerkat_types::api::{Claims, InfoResponse, LoginRequest, LoginResponse, RegisterRequest};
use meerkat_types::models::Role;

use crate::convert::user_response;
use crate::error::ApiError;
use crate::middleware::TOKEN_COOKIE;
use crate::state::AppState;

pub const CONFIRMATION_CODE_LEN: usize = 25;

/// Verified against when the username does not exist, so a miss costs the
/// same as a wrong password and login timing does not enumerate users.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"placeholder", &salt)
        .map(|h| h.to_string())
        .expect("hashing a fixed placeholder password")
});

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
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

    // Argon2 is CPU-bound; keep it off the async runtime.
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
        Role::User.as_str(),
        &code,
    )?;

    let row = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| anyhow!("freshly created user {user_id} missing"))?;

    Ok((StatusCode::CREATED, Json(user_response(row))))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // The lookup and the Argon2 verify are both blocking; run them off
    // the async runtime in one hop.
    let db = state.clone();
    let (row, verified) = tokio::task::spawn_blocking(
        move || -> anyhow::Result<(Option<UserRow>, bool)> {
            let row = db.db.get_user_by_username(&req.username)?;
            let stored_hash = match &row {
                Some(row) => row.password.clone(),
                None => DUMMY_HASH.clone(),
            };
            let verified = verify_password(&req.password, &stored_hash);
            Ok((row, verified))
        },
    )
    .await
    .map_err(|e| anyhow!("spawn_blocking join error: {e}"))??;

    let row = match (row, verified) {
        (Some(row), true) => row,
        _ => return Err(ApiError::InvalidCredentials),
    };

    let user_id = crate::convert::parse_uuid("user id", &row.id);
    let role = crate::convert::parse_role(&row.role);

    let token = create_token(
        &state.jwt_secret,
        user_id,
        &row.username,
        role,
        state.token_ttl_hours,
    )?;

    Ok((
        jar.add(session_cookie(token)),
        Json(LoginResponse {
            user_id,
            username: row.username,
            role,
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    (
        jar,
        Json(InfoResponse {
            message: "logged out".into(),
        }),
    )
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(user_response(row)))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    role: Role,
    ttl_hours: i64,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// One-time email confirmation code: 25 characters from the 62-symbol
/// alphanumeric alphabet, drawn from the thread-local CSPRNG.
pub fn generate_confirmation_code() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(CONFIRMATION_CODE_LEN)
        .map(char::from)
        .collect()
}

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be between 3 and 32 characters".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::Validation("email address is invalid".into()));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("pw12345678").unwrap();
        assert!(verify_password("pw12345678", &hash));
        assert!(!verify_password("pw12345679", &hash));
    }

    #[test]
    fn garbage_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn confirmation_codes_are_long_and_alphanumeric() {
        let code = generate_confirmation_code();
        assert_eq!(code.len(), CONFIRMATION_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(code, generate_confirmation_code());
    }

    #[test]
    fn validation_bounds() {
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("pw12345678").is_ok());
    }
}
