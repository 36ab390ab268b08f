use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sqlx::PgPool;

use crate::config::Config;
use crate::ratelimit::RateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Shared HTTP client; per-request LLM clients borrow it so connection
    /// pools are reused across callers.
    pub http: reqwest::Client,
    pub config: Config,
    /// Signing key for the session cookie, derived from SECRET_KEY.
    pub cookie_key: Key,
    pub limiter: Arc<RateLimiter>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}
