//! Admin user management.
//!
//! Users are addressable by UUID or username. Password material is hashed on
//! the way in and never serialized on the way out.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{hash_password, CurrentUser};
use crate::errors::AppError;
use crate::models::user::{User, VALID_ROLES};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

fn validate_role(role: &str) -> Result<(), AppError> {
    if VALID_ROLES.contains(&role) {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "Invalid role. Must be one of: {VALID_ROLES:?}"
    )))
}

/// Looks a user up by UUID when the path segment parses as one, by username
/// otherwise.
async fn find_user_by_ident(db: &PgPool, ident: &str) -> Result<Option<User>, sqlx::Error> {
    if let Ok(id) = Uuid::parse_str(ident) {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    } else {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(ident)
            .fetch_optional(db)
            .await
    }
}

/// GET /admin/users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "users": users })))
}

/// GET /admin/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(ident): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user = find_user_by_ident(&state.db, &ident)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "user": user })))
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let role = request.role.unwrap_or_else(|| "user".to_string());
    validate_role(&role)?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT 1::BIGINT FROM users WHERE username = $1")
        .bind(&request.username)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_some() {
        return Err(AppError::Validation("Username already exists".to_string()));
    }

    // Email falls back to the username when not supplied.
    let email = request.email.unwrap_or_else(|| request.username.clone());
    let email_taken: Option<(i64,)> = sqlx::query_as("SELECT 1::BIGINT FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if email_taken.is_some() {
        return Err(AppError::Validation("Email already registered".to_string()));
    }

    let password_hash = hash_password(&request.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, role, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&request.username)
    .bind(&email)
    .bind(&password_hash)
    .bind(&role)
    .bind(&current.username)
    .fetch_one(&state.db)
    .await?;

    tracing::info!("Admin {} created user {}", current.username, user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "user": user })),
    ))
}

/// PUT /admin/users/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(ident): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    let user = find_user_by_ident(&state.db, &ident)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if let Some(role) = &request.role {
        validate_role(role)?;
    }

    let password_hash = match &request.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET email = COALESCE($2, email),
            role = COALESCE($3, role),
            password_hash = COALESCE($4, password_hash),
            updated_at = now(),
            updated_by = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&request.email)
    .bind(&request.role)
    .bind(&password_hash)
    .bind(&current.username)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "message": "User updated successfully",
        "user": updated,
    })))
}

/// DELETE /admin/users/:user_id
///
/// An admin can never delete their own account.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(ident): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user = find_user_by_ident(&state.db, &ident)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.username == current.username {
        return Err(AppError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    tracing::info!("Admin {} deleted user {}", current.username, user.username);

    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_role_accepts_known_roles() {
        for role in VALID_ROLES {
            assert!(validate_role(role).is_ok());
        }
    }

    #[test]
    fn test_validate_role_rejects_unknown_role() {
        assert!(matches!(
            validate_role("superuser"),
            Err(AppError::Validation(_))
        ));
    }
}
