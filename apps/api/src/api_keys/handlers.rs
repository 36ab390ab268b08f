//! Axum route handlers for per-user API key storage.
//!
//! Keys are listed masked; creating a key for a slot that already holds one
//! replaces it.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::api_key::{ApiKey, MaskedApiKey};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveApiKeyRequest {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

/// GET /api_keys
pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let keys = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE username = $1 ORDER BY created_at",
    )
    .bind(&user.username)
    .fetch_all(&state.db)
    .await?;

    let keys: Vec<MaskedApiKey> = keys.into_iter().map(MaskedApiKey::from).collect();

    Ok(Json(json!({ "api_keys": keys })))
}

/// POST /api_keys
///
/// Upserts the caller's key for the given slot (global when project_id is
/// absent, project-scoped otherwise).
pub async fn save_api_key(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<SaveApiKeyRequest>,
) -> Result<Json<Value>, AppError> {
    if request.api_key.trim().is_empty() {
        return Err(AppError::Validation("API key is required".to_string()));
    }

    let existing: Option<(Uuid,)> = match request.project_id {
        Some(project_id) => {
            sqlx::query_as("SELECT id FROM api_keys WHERE username = $1 AND project_id = $2")
                .bind(&user.username)
                .bind(project_id)
                .fetch_optional(&state.db)
                .await?
        }
        None => {
            sqlx::query_as("SELECT id FROM api_keys WHERE username = $1 AND project_id IS NULL")
                .bind(&user.username)
                .fetch_optional(&state.db)
                .await?
        }
    };

    match existing {
        Some((key_id,)) => {
            sqlx::query("UPDATE api_keys SET api_key = $2 WHERE id = $1")
                .bind(key_id)
                .bind(&request.api_key)
                .execute(&state.db)
                .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO api_keys (username, project_id, api_key) VALUES ($1, $2, $3)",
            )
            .bind(&user.username)
            .bind(request.project_id)
            .bind(&request.api_key)
            .execute(&state.db)
            .await?;
        }
    }

    Ok(Json(json!({ "message": "API key saved successfully" })))
}

/// DELETE /api_keys/:key_id
pub async fn delete_api_key(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(key_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND username = $2")
        .bind(key_id)
        .bind(&user.username)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Key not found or not authorized".to_string(),
        ));
    }

    Ok(Json(json!({ "message": "API key deleted successfully" })))
}
