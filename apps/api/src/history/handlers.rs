//! Axum route handlers for the generation/chat history log.
//!
//! The log is append-only from the caller's perspective: entries are written
//! by the streaming relay and can only be read or deleted here, always scoped
//! to the session user.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::history::HistoryEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryPage {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub skip: i64,
}

fn default_limit() -> i64 {
    10
}

/// GET /history?limit=&skip=
pub async fn list_history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<HistoryPage>,
) -> Result<Json<Value>, AppError> {
    let history = sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT * FROM history
        WHERE username = $1
        ORDER BY created_at DESC
        OFFSET $2 LIMIT $3
        "#,
    )
    .bind(&user.username)
    .bind(page.skip.max(0))
    .bind(page.limit.clamp(1, 100))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "history": history })))
}

/// GET /history/:history_id
pub async fn get_history_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(history_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let item = sqlx::query_as::<_, HistoryEntry>(
        "SELECT * FROM history WHERE id = $1 AND username = $2",
    )
    .bind(history_id)
    .bind(&user.username)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("History item not found".to_string()))?;

    Ok(Json(json!({ "item": item })))
}

/// DELETE /history/:history_id
pub async fn delete_history_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(history_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let result = sqlx::query("DELETE FROM history WHERE id = $1 AND username = $2")
        .bind(history_id)
        .bind(&user.username)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("History item not found".to_string()));
    }

    Ok(Json(json!({ "message": "History item deleted successfully" })))
}
