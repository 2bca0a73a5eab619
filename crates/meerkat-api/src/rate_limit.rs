//! Per-IP rate limiting for the credential endpoints.
//!
//! Token buckets from the `governor` crate, one per client IP. Only
//! /auth/register and /auth/login are limited; everything behind a valid
//! session is not.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Entry cap to bound memory under address churn.
const MAX_TRACKED_IPS: usize = 10_000;

pub struct AuthRateLimiter {
    limiters: DashMap<IpAddr, DirectRateLimiter>,
    per_minute: NonZeroU32,
}

impl AuthRateLimiter {
    pub fn new(per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute)
            .unwrap_or(NonZeroU32::new(10).expect("nonzero literal"));
        Self {
            limiters: DashMap::new(),
            per_minute,
        }
    }

    /// Returns `true` if the request is within quota.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiters.len() > MAX_TRACKED_IPS {
            self.limiters.clear();
            debug!("cleared auth rate limiters (exceeded {MAX_TRACKED_IPS} entries)");
        }

        let limiter = self
            .limiters
            .entry(ip)
            .or_insert_with(|| RateLimiter::direct(Quota::per_minute(self.per_minute)));

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(ip = %ip, "auth rate limit exceeded");
        }
        allowed
    }
}

pub async fn limit_auth(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth_limiter.check(addr.ip()) {
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}
