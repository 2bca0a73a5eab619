use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};

use meerkat_types::api::Claims;
use meerkat_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the HTTP-only session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// Extract and validate the JWT carried by the request, then inject the
/// claims into request extensions for downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from_request(&jar, &req).ok_or(ApiError::InvalidToken)?;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::InvalidToken)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Admin gate for role-restricted routes. Must be layered inside
/// `require_auth` so the claims are already present.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(ApiError::InvalidToken)?;

    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// The session cookie is the primary transport; a bearer header is
/// accepted as a fallback for non-browser clients.
fn token_from_request(jar: &CookieJar, req: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use uuid::Uuid;

    fn decode_with(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
    }

    #[test]
    fn token_round_trips_identity_and_role() {
        let user_id = Uuid::new_v4();
        let token = create_token("secret", user_id, "alice", Role::Admin, 24).unwrap();

        let claims = decode_with("secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "alice", Role::User, 24).unwrap();
        assert!(decode_with("other-secret", &token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "alice", Role::User, 24).unwrap();
        // Flip a character in the payload segment.
        let mut bytes = token.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(decode_with("secret", &tampered).is_err());
    }
}
