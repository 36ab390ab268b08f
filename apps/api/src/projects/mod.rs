pub mod handlers;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::project::Project;

/// Loads a project if the user is its owner or one of its collaborators.
/// Returns None for both "does not exist" and "no access" so callers can
/// answer 404 without confirming existence to unauthorized users.
pub async fn find_project_for_member(
    db: &PgPool,
    project_id: Uuid,
    username: &str,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        r#"
        SELECT * FROM projects
        WHERE id = $1
          AND (owner = $2 OR EXISTS (
              SELECT 1 FROM collaborators
              WHERE project_id = projects.id AND username = $2
          ))
        "#,
    )
    .bind(project_id)
    .bind(username)
    .fetch_optional(db)
    .await
}

/// Loads a project only if the user owns it. Owner-only mutations
/// (metadata, collaborator list) go through this.
pub async fn find_project_owned(
    db: &PgPool,
    project_id: Uuid,
    username: &str,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND owner = $2")
        .bind(project_id)
        .bind(username)
        .fetch_optional(db)
        .await
}
