//! Axum route handlers for requirement CRUD.
//!
//! A requirement is reachable by anyone who can reach its project (owner or
//! collaborator). Creation requires a live, accessible project.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::requirement::Requirement;
use crate::projects::find_project_for_member;
use crate::requirements::fetch_requirement;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRequirementRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequirementRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

fn default_category() -> String {
    "functional".to_string()
}

fn default_priority() -> String {
    "medium".to_string()
}

fn default_status() -> String {
    "draft".to_string()
}

/// Resolves a requirement and checks the caller can reach its project.
/// 404 for a missing requirement, 403 for an inaccessible project.
async fn fetch_accessible_requirement(
    state: &AppState,
    requirement_id: Uuid,
    username: &str,
) -> Result<Requirement, AppError> {
    let requirement = fetch_requirement(&state.db, requirement_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Requirement not found".to_string()))?;

    find_project_for_member(&state.db, requirement.project_id, username)
        .await?
        .ok_or_else(|| AppError::Forbidden("Access denied".to_string()))?;

    Ok(requirement)
}

/// GET /projects/:project_id/requirements
pub async fn list_requirements(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    find_project_for_member(&state.db, project_id, &user.username)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found or access denied".to_string()))?;

    let requirements = sqlx::query_as::<_, Requirement>(
        "SELECT * FROM requirements WHERE project_id = $1 ORDER BY created_at",
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "requirements": requirements })))
}

/// POST /projects/:project_id/requirements
pub async fn create_requirement(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<CreateRequirementRequest>,
) -> Result<Json<Value>, AppError> {
    find_project_for_member(&state.db, project_id, &user.username)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found or access denied".to_string()))?;

    if request.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let requirement = sqlx::query_as::<_, Requirement>(
        r#"
        INSERT INTO requirements (project_id, author, title, description, category, priority, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(&user.username)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.category)
    .bind(&request.priority)
    .bind(&request.status)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "message": "Requirement created",
        "requirement": requirement,
    })))
}

/// GET /requirements/:requirement_id
pub async fn get_requirement(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(requirement_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let requirement =
        fetch_accessible_requirement(&state, requirement_id, &user.username).await?;

    Ok(Json(json!({ "requirement": requirement })))
}

/// PUT /requirements/:requirement_id
pub async fn update_requirement(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(requirement_id): Path<Uuid>,
    Json(request): Json<UpdateRequirementRequest>,
) -> Result<Json<Value>, AppError> {
    fetch_accessible_requirement(&state, requirement_id, &user.username).await?;

    let has_changes = request.title.is_some()
        || request.description.is_some()
        || request.category.is_some()
        || request.priority.is_some()
        || request.status.is_some();

    if has_changes {
        sqlx::query(
            r#"
            UPDATE requirements
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                priority = COALESCE($5, priority),
                status = COALESCE($6, status),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(requirement_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.category)
        .bind(&request.priority)
        .bind(&request.status)
        .execute(&state.db)
        .await?;
    }

    Ok(Json(json!({ "message": "Requirement updated successfully" })))
}

/// DELETE /requirements/:requirement_id
pub async fn delete_requirement(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(requirement_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    fetch_accessible_requirement(&state, requirement_id, &user.username).await?;

    sqlx::query("DELETE FROM requirements WHERE id = $1")
        .bind(requirement_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "message": "Requirement deleted successfully" })))
}
