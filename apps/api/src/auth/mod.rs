//! Session and credential handling.
//!
//! Sessions are a signed cookie carrying the username (key derived from
//! SECRET_KEY). Passwords are stored as argon2id hashes only. Route guards
//! insert a `CurrentUser` into request extensions so handlers never re-check
//! the cookie themselves.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::user::{User, ROLE_ADMIN, ROLE_MANAGER};
use crate::state::AppState;

pub mod handlers;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Session lifetime. Refreshed on login only.
const SESSION_TTL_DAYS: i64 = 1;

// ────────────────────────────────────────────────────────────────────────────
// Cookie signing
// ────────────────────────────────────────────────────────────────────────────

/// Derives a 64-byte cookie signing key from the configured secret.
/// SECRET_KEY may be any length; the sha2 expansion gives `Key::from` the
/// exact material size it requires.
pub fn derive_cookie_key(secret: &str) -> Key {
    let mut material = [0u8; 64];
    let first = Sha256::digest(secret.as_bytes());
    let second = Sha256::digest(first);
    material[..32].copy_from_slice(&first);
    material[32..].copy_from_slice(&second);
    Key::from(&material)
}

/// Builds the signed session cookie set on login.
pub fn session_cookie(username: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, username.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

/// Cookie used to clear the session. Path must match `session_cookie`.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

// ────────────────────────────────────────────────────────────────────────────
// Passwords
// ────────────────────────────────────────────────────────────────────────────

/// Hashes a password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

/// Verifies a password against a stored argon2 hash.
/// An unparseable hash verifies as false rather than erroring.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// ────────────────────────────────────────────────────────────────────────────
// Request identity
// ────────────────────────────────────────────────────────────────────────────

/// Authenticated caller, inserted into request extensions by `require_session`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub email: String,
    pub role: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn is_manager_or_admin(&self) -> bool {
        self.role == ROLE_MANAGER || self.role == ROLE_ADMIN
    }
}

pub async fn fetch_user(db: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(db)
        .await
}

// ────────────────────────────────────────────────────────────────────────────
// Route guards
// ────────────────────────────────────────────────────────────────────────────

/// Resolves the session cookie to a live user and stores the identity in
/// request extensions. 401 when the cookie is missing, unsigned, or stale.
pub async fn require_session(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let username = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let user = fetch_user(&state.db, &username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(CurrentUser {
        username: user.username,
        email: user.email,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Guard for `/admin` routes. Must be layered inside `require_session`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;

    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Guard for manager reporting routes. Must be layered inside `require_session`.
pub async fn require_manager_or_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;

    if !user.is_manager_or_admin() {
        return Err(AppError::Forbidden(
            "Manager or admin access required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hash = hash_password("hunter2").unwrap();
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_garbage_hash_verifies_false() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_cookie_key_is_deterministic() {
        let a = derive_cookie_key("supersecret");
        let b = derive_cookie_key("supersecret");
        assert_eq!(a.master(), b.master());

        let c = derive_cookie_key("othersecret");
        assert_ne!(a.master(), c.master());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("alice");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "alice");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
