//! Axum route handlers for project CRUD and collaborator management.
//!
//! Reads are open to the owner and collaborators; metadata and collaborator
//! mutations are owner-only. Failed access checks answer 404, not 403, so
//! existence is never confirmed to outsiders.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::project::{Collaborator, Project, ProjectWithCollaborators};
use crate::projects::{find_project_for_member, find_project_owned};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCollaboratorRequest {
    pub username: String,
}

/// A project as seen by one caller: row + collaborator usernames + whether
/// the caller owns it.
#[derive(Debug, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: ProjectWithCollaborators,
    pub is_owner: bool,
}

const PROJECT_WITH_COLLABORATORS: &str = r#"
    SELECT p.id, p.owner, p.name, p.context, p.created_at, p.updated_at,
           COALESCE(
               array_agg(c.username ORDER BY c.added_at)
                   FILTER (WHERE c.username IS NOT NULL),
               '{}'
           ) AS collaborators
    FROM projects p
    LEFT JOIN collaborators c ON c.project_id = p.id
"#;

// ────────────────────────────────────────────────────────────────────────────
// Project CRUD
// ────────────────────────────────────────────────────────────────────────────

/// GET /projects
///
/// Everything the caller owns or collaborates on.
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let query = format!(
        r#"{PROJECT_WITH_COLLABORATORS}
        WHERE p.owner = $1 OR EXISTS (
            SELECT 1 FROM collaborators m
            WHERE m.project_id = p.id AND m.username = $1
        )
        GROUP BY p.id
        ORDER BY p.created_at DESC"#
    );

    let projects = sqlx::query_as::<_, ProjectWithCollaborators>(&query)
        .bind(&user.username)
        .fetch_all(&state.db)
        .await?;

    let projects: Vec<ProjectView> = projects
        .into_iter()
        .map(|project| ProjectView {
            is_owner: project.owner == user.username,
            project,
        })
        .collect();

    Ok(Json(json!({ "projects": projects })))
}

/// POST /projects
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<Json<Value>, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Project name is required".to_string()));
    }

    let project = sqlx::query_as::<_, Project>(
        "INSERT INTO projects (owner, name, context) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&user.username)
    .bind(&request.name)
    .bind(&request.context)
    .fetch_one(&state.db)
    .await?;

    tracing::info!("User {} created project {}", user.username, project.id);

    let view = ProjectView {
        project: ProjectWithCollaborators {
            id: project.id,
            owner: project.owner,
            name: project.name,
            context: project.context,
            collaborators: Vec::new(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        },
        is_owner: true,
    };

    Ok(Json(json!({ "message": "Project created", "project": view })))
}

/// GET /projects/:project_id
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let query = format!(
        r#"{PROJECT_WITH_COLLABORATORS}
        WHERE p.id = $1
          AND (p.owner = $2 OR EXISTS (
              SELECT 1 FROM collaborators m
              WHERE m.project_id = p.id AND m.username = $2
          ))
        GROUP BY p.id"#
    );

    let project = sqlx::query_as::<_, ProjectWithCollaborators>(&query)
        .bind(project_id)
        .bind(&user.username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found or access denied".to_string()))?;

    let view = ProjectView {
        is_owner: project.owner == user.username,
        project,
    };

    Ok(Json(json!({ "project": view })))
}

/// PUT /projects/:project_id (owner only)
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<Value>, AppError> {
    find_project_owned(&state.db, project_id, &user.username)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Project not found or you don't have permission".to_string())
        })?;

    if request.name.is_some() || request.context.is_some() {
        sqlx::query(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                context = COALESCE($3, context),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(project_id)
        .bind(&request.name)
        .bind(&request.context)
        .execute(&state.db)
        .await?;
    }

    Ok(Json(json!({ "message": "Project updated successfully" })))
}

/// DELETE /projects/:project_id (owner only)
///
/// Requirements and collaborator records go with it (schema cascade).
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    find_project_owned(&state.db, project_id, &user.username)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Project not found or you don't have permission".to_string())
        })?;

    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(project_id)
        .execute(&state.db)
        .await?;

    tracing::info!("User {} deleted project {}", user.username, project_id);

    Ok(Json(json!({ "message": "Project deleted successfully" })))
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborators
// ────────────────────────────────────────────────────────────────────────────

/// GET /projects/:project_id/collaborators
pub async fn list_collaborators(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    find_project_for_member(&state.db, project_id, &user.username)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found or access denied".to_string()))?;

    let collaborators = sqlx::query_as::<_, Collaborator>(
        "SELECT * FROM collaborators WHERE project_id = $1 ORDER BY added_at",
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "collaborators": collaborators })))
}

/// POST /projects/:project_id/collaborators (owner only)
pub async fn add_collaborator(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<AddCollaboratorRequest>,
) -> Result<Json<Value>, AppError> {
    if request.username.trim().is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }

    find_project_owned(&state.db, project_id, &user.username)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Project not found or you don't have permission".to_string())
        })?;

    let collaborator = crate::auth::fetch_user(&state.db, &request.username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let already: Option<(i64,)> = sqlx::query_as(
        "SELECT 1::BIGINT FROM collaborators WHERE project_id = $1 AND username = $2",
    )
    .bind(project_id)
    .bind(&collaborator.username)
    .fetch_optional(&state.db)
    .await?;
    if already.is_some() {
        return Err(AppError::Validation(
            "User is already a collaborator".to_string(),
        ));
    }

    sqlx::query(
        "INSERT INTO collaborators (project_id, username, email, added_by) VALUES ($1, $2, $3, $4)",
    )
    .bind(project_id)
    .bind(&collaborator.username)
    .bind(&collaborator.email)
    .bind(&user.username)
    .execute(&state.db)
    .await?;

    tracing::info!(
        "User {} added collaborator {} to project {}",
        user.username,
        collaborator.username,
        project_id
    );

    Ok(Json(json!({
        "message": "Collaborator added successfully",
        "collaborator": {
            "username": collaborator.username,
            "email": collaborator.email,
        },
    })))
}

/// DELETE /projects/:project_id/collaborators/:username (owner only)
///
/// Idempotent: removing a non-collaborator succeeds.
pub async fn remove_collaborator(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((project_id, collaborator_username)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    find_project_owned(&state.db, project_id, &user.username)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Project not found or you don't have permission".to_string())
        })?;

    sqlx::query("DELETE FROM collaborators WHERE project_id = $1 AND username = $2")
        .bind(project_id)
        .bind(&collaborator_username)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "message": "Collaborator removed successfully" })))
}
