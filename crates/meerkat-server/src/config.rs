use std::env;

use anyhow::{Context, Result};
use tracing::warn;

pub struct SmtpConfig {
    pub relay: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Public base URL embedded in verification links.
    pub base_url: String,
    pub auth_requests_per_minute: u32,
    /// `None` falls back to the logging mailer.
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env::var("MEERKAT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("MEERKAT_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("MEERKAT_PORT must be a port number")?;

        let db_path = env::var("MEERKAT_DB_PATH").unwrap_or_else(|_| "meerkat.db".into());

        let jwt_secret =
            env::var("MEERKAT_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        if jwt_secret == "dev-secret-change-me" {
            warn!("MEERKAT_JWT_SECRET not set, using the development secret");
        }

        let token_ttl_hours: i64 = env::var("MEERKAT_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "720".into())
            .parse()
            .context("MEERKAT_TOKEN_TTL_HOURS must be a number of hours")?;

        let base_url = env::var("MEERKAT_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let auth_requests_per_minute: u32 = env::var("MEERKAT_AUTH_RPM")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .context("MEERKAT_AUTH_RPM must be a number of requests")?;

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            token_ttl_hours,
            base_url,
            auth_requests_per_minute,
            smtp: smtp_from_env(),
        })
    }
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let vars = [
        "MEERKAT_SMTP_RELAY",
        "MEERKAT_SMTP_USERNAME",
        "MEERKAT_SMTP_PASSWORD",
        "MEERKAT_SMTP_FROM",
    ];
    let values: Vec<Option<String>> = vars.iter().map(|v| env::var(v).ok()).collect();

    match values.iter().filter(|v| v.is_some()).count() {
        4 => Some(SmtpConfig {
            relay: values[0].clone().unwrap_or_default(),
            username: values[1].clone().unwrap_or_default(),
            password: values[2].clone().unwrap_or_default(),
            from: values[3].clone().unwrap_or_default(),
        }),
        0 => None,
        _ => {
            warn!("Partial SMTP configuration, falling back to the logging mailer");
            None
        }
    }
}
