use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use meerkat_api::mail::{LogMailer, Mailer, SmtpMailer};
use meerkat_api::middleware::{require_admin, require_auth};
use meerkat_api::rate_limit::{AuthRateLimiter, limit_auth};
use meerkat_api::state::{AppState, AppStateInner};
use meerkat_api::{auth, boards, posts, replies, users, verification};

mod config;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meerkat=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = meerkat_db::Database::open(&PathBuf::from(&config.db_path))?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(
            &smtp.relay,
            smtp.username.clone(),
            smtp.password.clone(),
            &smtp.from,
        )?),
        None => Arc::new(LogMailer),
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl_hours: config.token_ttl_hours,
        base_url: config.base_url.clone(),
        mailer,
        auth_limiter: AuthRateLimiter::new(config.auth_requests_per_minute),
    });

    // Credential endpoints carry the per-IP limiter; nothing else does.
    let credential_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .layer(middleware::from_fn_with_state(state.clone(), limit_auth));

    // The verification link lands here from a mail client, before any
    // session exists.
    let public_routes = Router::new()
        .merge(credential_routes)
        .route(
            "/users/email-verification/verify/{code}",
            get(verification::verify),
        );

    let admin_routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/boards", post(boards::create_board))
        .route(
            "/boards/{board_id}",
            patch(boards::update_board).delete(boards::delete_board),
        )
        .layer(middleware::from_fn(require_admin));

    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::profile))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/users",
            get(users::list_users)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{username}", get(users::get_user))
        .route("/users/email-verification/send", get(verification::send))
        .route("/boards", get(boards::list_boards))
        .route(
            "/boards/{board_id}/posts",
            get(posts::list_posts).post(posts::create_post),
        )
        .route(
            "/boards/{board_id}/posts/{post_id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/boards/posts/{post_id}/replies",
            get(replies::list_replies).post(replies::create_reply),
        )
        .route(
            "/boards/posts/{post_id}/replies/{reply_id}",
            patch(replies::update_reply).delete(replies::delete_reply),
        )
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Meerkat forum listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
