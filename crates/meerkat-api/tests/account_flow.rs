//! Handler-level flows against a real on-disk database: the account
//! lifecycle (register → confirm → login) and the ownership rules on
//! post mutation.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use tempfile::TempDir;
use uuid::Uuid;

use meerkat_api::error::ApiError;
use meerkat_api::mail::LogMailer;
use meerkat_api::rate_limit::AuthRateLimiter;
use meerkat_api::state::{AppState, AppStateInner};
use meerkat_api::{auth, posts, verification};
use meerkat_db::Database;
use meerkat_types::api::{Claims, LoginRequest, RegisterRequest, UpdatePostRequest};
use meerkat_types::models::Role;

fn test_state(dir: &TempDir) -> AppState {
    let db = Database::open(&dir.path().join("forum.db")).unwrap();
    Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".into(),
        token_ttl_hours: 1,
        base_url: "http://localhost:3000".into(),
        mailer: Arc::new(LogMailer),
        auth_limiter: AuthRateLimiter::new(1000),
    })
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn claims_for(id: Uuid, username: &str, role: Role) -> Claims {
    Claims {
        sub: id,
        username: username.to_string(),
        role,
        exp: usize::MAX,
    }
}

#[tokio::test]
async fn register_confirm_login_round_trip() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let resp = auth::register(
        State(state.clone()),
        Json(RegisterRequest {
            username: "alice".into(),
            email: "alice@x.com".into(),
            password: "pw12345678".into(),
        }),
    )
    .await
    .unwrap()
    .into_response();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["role"], "user");
    // The registration response must not leak secrets.
    assert!(body.get("password").is_none());
    assert!(body.get("confirmation_code").is_none());

    // Login is possible while pending, but with the wrong password it
    // always fails InvalidCredentials.
    let err = auth::login(
        State(state.clone()),
        CookieJar::default(),
        Json(LoginRequest {
            username: "alice".into(),
            password: "wrong-password".into(),
        }),
    )
    .await
    .map(|_| ())
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredentials));

    // Unknown usernames fail the same way.
    let err = auth::login(
        State(state.clone()),
        CookieJar::default(),
        Json(LoginRequest {
            username: "nobody".into(),
            password: "pw12345678".into(),
        }),
    )
    .await
    .map(|_| ())
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredentials));

    // Confirm the email with the stored code.
    let code = state
        .db
        .get_user_by_username("alice")
        .unwrap()
        .unwrap()
        .confirmation_code;
    let resp = verification::verify(State(state.clone()), Path(code.clone()))
        .await
        .unwrap()
        .into_response();
    let body = body_json(resp).await;
    assert_eq!(body["status"], "active");

    // The code is single-use: a second confirm finds nothing.
    let err = verification::verify(State(state.clone()), Path(code))
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // Correct credentials now issue a session cookie.
    let resp = auth::login(
        State(state.clone()),
        CookieJar::default(),
        Json(LoginRequest {
            username: "alice".into(),
            password: "pw12345678".into(),
        }),
    )
    .await
    .unwrap()
    .into_response();
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));

    let body = body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let register = |username: &str, email: &str| {
        let state = state.clone();
        let req = RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "pw12345678".into(),
        };
        async move { auth::register(State(state), Json(req)).await.map(|_| ()) }
    };

    register("alice", "alice@x.com").await.unwrap();

    let err = register("alice", "other@x.com").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let err = register("bob", "alice@x.com").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // A concurrent registration that slips past the exists checks hits
    // the UNIQUE constraint; that still reports as Conflict, not 500.
    let err = state
        .db
        .create_user(
            &Uuid::new_v4().to_string(),
            "alice",
            "third@x.com",
            "hash",
            "user",
            "code-race",
        )
        .unwrap_err();
    assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
}

#[tokio::test]
async fn posts_are_scoped_to_their_board() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let author_id = Uuid::new_v4();
    state
        .db
        .create_user(&author_id.to_string(), "author", "author@x.com", "hash", "user", "code")
        .unwrap();

    let board_a = Uuid::new_v4();
    let board_b = Uuid::new_v4();
    state.db.create_board(&board_a.to_string(), "general", "talk").unwrap();
    state.db.create_board(&board_b.to_string(), "random", "misc").unwrap();

    let post_id = Uuid::new_v4();
    state
        .db
        .insert_post(&post_id.to_string(), &board_a.to_string(), &author_id.to_string(), "hi", "body")
        .unwrap();

    // Under its own board the post resolves.
    let resp = posts::get_post(State(state.clone()), Path((board_a, post_id)))
        .await
        .unwrap()
        .into_response();
    assert_eq!(resp.status(), StatusCode::OK);

    // Under any other board it does not exist, for reads or writes.
    let err = posts::get_post(State(state.clone()), Path((board_b, post_id)))
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = posts::update_post(
        State(state.clone()),
        Path((board_b, post_id)),
        Extension(claims_for(author_id, "author", Role::User)),
        Json(UpdatePostRequest {
            title: Some("retitled".into()),
            content: None,
        }),
    )
    .await
    .map(|_| ())
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = posts::delete_post(
        State(state.clone()),
        Path((board_b, post_id)),
        Extension(claims_for(author_id, "author", Role::User)),
    )
    .await
    .map(|_| ())
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(state.db.get_post(&post_id.to_string()).unwrap().is_some());
}

#[tokio::test]
async fn only_the_author_or_an_admin_may_edit_a_post() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let author_id = Uuid::new_v4();
    let stranger_id = Uuid::new_v4();
    let admin_id = Uuid::new_v4();
    for (id, name) in [(author_id, "author"), (stranger_id, "stranger"), (admin_id, "admin")] {
        state
            .db
            .create_user(&id.to_string(), name, &format!("{name}@x.com"), "hash", "user", &format!("code-{name}"))
            .unwrap();
    }

    let board_id = Uuid::new_v4();
    state.db.create_board(&board_id.to_string(), "general", "talk").unwrap();
    let post_id = Uuid::new_v4();
    state
        .db
        .insert_post(&post_id.to_string(), &board_id.to_string(), &author_id.to_string(), "hi", "body")
        .unwrap();

    let edit = |claims: Claims| {
        let state = state.clone();
        let req = UpdatePostRequest {
            title: Some("edited".into()),
            content: None,
        };
        async move {
            posts::update_post(
                State(state),
                Path((board_id, post_id)),
                Extension(claims),
                Json(req),
            )
            .await
            .map(|_| ())
        }
    };

    // A plain user who does not own the post is rejected.
    let err = edit(claims_for(stranger_id, "stranger", Role::User))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));
    assert!(!state.db.get_post(&post_id.to_string()).unwrap().unwrap().edited);

    // The author may edit.
    edit(claims_for(author_id, "author", Role::User)).await.unwrap();
    let row = state.db.get_post(&post_id.to_string()).unwrap().unwrap();
    assert!(row.edited);
    assert_eq!(row.title, "edited");

    // An admin may edit someone else's post.
    edit(claims_for(admin_id, "admin", Role::Admin)).await.unwrap();

    // And may delete it.
    posts::delete_post(
        State(state.clone()),
        Path((board_id, post_id)),
        Extension(claims_for(admin_id, "admin", Role::Admin)),
    )
    .await
    .unwrap();
    assert!(state.db.get_post(&post_id.to_string()).unwrap().is_none());
}
