//! Admin project management: all projects regardless of ownership.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::project::{Collaborator, Project};
use crate::models::requirement::Requirement;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminUpdateProjectRequest {
    pub name: Option<String>,
    pub context: Option<String>,
}

/// Project row with the counts the admin listing shows.
#[derive(Debug, Serialize, FromRow)]
pub struct ProjectOverview {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub context: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub collaborator_count: i64,
    pub requirements_count: i64,
}

/// GET /admin/projects
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let projects = sqlx::query_as::<_, ProjectOverview>(
        r#"
        SELECT p.*,
               (SELECT COUNT(*) FROM collaborators c WHERE c.project_id = p.id)
                   AS collaborator_count,
               (SELECT COUNT(*) FROM requirements r WHERE r.project_id = p.id)
                   AS requirements_count
        FROM projects p
        ORDER BY p.created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "projects": projects })))
}

/// GET /admin/projects/:project_id
///
/// Full detail view: collaborators, requirements, and how many generation
/// runs this project has accumulated.
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    let collaborators = sqlx::query_as::<_, Collaborator>(
        "SELECT * FROM collaborators WHERE project_id = $1 ORDER BY added_at",
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    let requirements = sqlx::query_as::<_, Requirement>(
        "SELECT * FROM requirements WHERE project_id = $1 ORDER BY created_at",
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    let (test_cases_count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM history
        WHERE project_id = $1
          AND test_cases IS NOT NULL AND test_cases <> ''
        "#,
    )
    .bind(project_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "project": {
            "id": project.id,
            "owner": project.owner,
            "name": project.name,
            "context": project.context,
            "created_at": project.created_at,
            "updated_at": project.updated_at,
            "collaborator_details": collaborators,
            "requirements": requirements,
            "test_cases_count": test_cases_count,
        },
    })))
}

/// PUT /admin/projects/:project_id
pub async fn update_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<AdminUpdateProjectRequest>,
) -> Result<Json<Value>, AppError> {
    let updated = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET name = COALESCE($2, name),
            context = COALESCE($3, context),
            updated_at = now(),
            updated_by = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(&request.name)
    .bind(&request.context)
    .bind(&current.username)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    Ok(Json(json!({
        "message": "Project updated successfully",
        "project": updated,
    })))
}

/// DELETE /admin/projects/:project_id
///
/// Cascades to requirements and collaborator records.
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(project_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Project not found".to_string()));
    }

    tracing::info!("Admin {} deleted project {}", current.username, project_id);

    Ok(Json(json!({
        "message": "Project and its collaborators deleted successfully",
    })))
}
