//! Axum route handlers for registration and session lifecycle.

use axum::{extract::State, Json};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{
    fetch_user, hash_password, removal_cookie, session_cookie, verify_password, SESSION_COOKIE,
};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// POST /login
///
/// Verifies credentials and sets the signed session cookie. A missing user
/// and a wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(SignedCookieJar, Json<Value>), AppError> {
    let user = fetch_user(&state.db, &request.username).await?;

    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => return Err(AppError::InvalidCredentials),
    };

    tracing::info!("User {} logged in", user.username);

    let jar = jar.add(session_cookie(&user.username));
    Ok((
        jar,
        Json(json!({
            "message": "Login successful",
            "username": user.username,
            "email": user.email,
        })),
    ))
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    if request.username.trim().is_empty()
        || request.password.is_empty()
        || request.email.trim().is_empty()
    {
        return Err(AppError::Validation("Missing required fields".to_string()));
    }

    let username_taken: Option<(i64,)> =
        sqlx::query_as("SELECT 1::BIGINT FROM users WHERE username = $1")
            .bind(&request.username)
            .fetch_optional(&state.db)
            .await?;
    if username_taken.is_some() {
        return Err(AppError::Validation("Username already exists".to_string()));
    }

    let email_taken: Option<(i64,)> =
        sqlx::query_as("SELECT 1::BIGINT FROM users WHERE email = $1")
            .bind(&request.email)
            .fetch_optional(&state.db)
            .await?;
    if email_taken.is_some() {
        return Err(AppError::Validation("Email already registered".to_string()));
    }

    let password_hash = hash_password(&request.password)?;

    sqlx::query("INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3)")
        .bind(&request.username)
        .bind(&request.email)
        .bind(&password_hash)
        .execute(&state.db)
        .await?;

    tracing::info!("Registered user {}", request.username);

    Ok(Json(json!({ "message": "Registration successful" })))
}

/// POST /logout
pub async fn logout(jar: SignedCookieJar) -> (SignedCookieJar, Json<Value>) {
    let jar = jar.remove(removal_cookie());
    (jar, Json(json!({ "message": "Logged out successfully" })))
}

/// GET /check_session
///
/// Never 401s: reports whether the caller has a live session. Exempt from
/// rate limiting so polling frontends cannot lock themselves out.
pub async fn check_session(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Json<Value>, AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(user) = fetch_user(&state.db, cookie.value()).await? {
            return Ok(Json(json!({
                "logged_in": true,
                "username": user.username,
                "email": user.email,
            })));
        }
    }

    Ok(Json(json!({ "logged_in": false })))
}
