use std::sync::Arc;

use meerkat_db::Database;

use crate::mail::Mailer;
use crate::rate_limit::AuthRateLimiter;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Public base URL embedded in verification links.
    pub base_url: String,
    pub mailer: Arc<dyn Mailer>,
    pub auth_limiter: AuthRateLimiter,
}
