//! Email verification: the Pending → Active half of the account
//! lifecycle. Sending is fire-and-forget; confirming is a single
//! conditional write keyed on the pending status, so a code is accepted
//! at most once.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::warn;

use meerkat_types::api::{Claims, InfoResponse};
use meerkat_types::models::AccountStatus;

use crate::convert::{parse_status, user_response};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /users/email-verification/send
pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    if parse_status(&row.status) == AccountStatus::Active {
        return Ok(Json(InfoResponse {
            message: "account is already active".into(),
        }));
    }

    let mailer = state.mailer.clone();
    let to = row.email.clone();
    let body = confirmation_body(&state.base_url, &row.username, &row.confirmation_code);

    tokio::spawn(async move {
        if let Err(e) = mailer.send(&to, "Please confirm your account", &body).await {
            warn!("failed to send confirmation email to {to}: {e:#}");
        }
    });

    Ok(Json(InfoResponse {
        message: "verification email sent".into(),
    }))
}

/// GET /users/email-verification/verify/{code}
///
/// Public: the link lands here from the user's mail client, before any
/// session exists.
pub async fn verify(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // The code only matches a pending account; an already-consumed or
    // unknown code is indistinguishable from absent.
    if !state.db.activate_user(&code)? {
        return Err(ApiError::NotFound("account"));
    }

    let row = state
        .db
        .get_user_by_confirmation_code(&code)?
        .ok_or(ApiError::NotFound("account"))?;

    Ok(Json(user_response(row)))
}

fn confirmation_body(base_url: &str, username: &str, code: &str) -> String {
    format!(
        "<h1>Email Confirmation</h1>\
         <h2>Hello {username}</h2>\
         <div>\
         <p>Thank you for creating an account. Please confirm your email by clicking the link below.</p>\
         <a href=\"{base_url}/users/email-verification/verify/{code}\">Confirm my account</a>\
         </div>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_body_links_the_code() {
        let body = confirmation_body("https://forum.example.com", "alice", "abc123");
        assert!(body.contains("Hello alice"));
        assert!(body.contains("https://forum.example.com/users/email-verification/verify/abc123"));
    }
}
