pub mod handlers;

use sqlx::PgPool;
use uuid::Uuid;

/// Resolves the upstream API key for a caller: project-scoped key first,
/// then the user's global key, then the environment default.
pub async fn resolve_api_key(
    db: &PgPool,
    username: &str,
    project_id: Option<Uuid>,
    default_key: Option<&str>,
) -> Result<Option<String>, sqlx::Error> {
    if let Some(project_id) = project_id {
        let project_key: Option<(String,)> = sqlx::query_as(
            "SELECT api_key FROM api_keys WHERE username = $1 AND project_id = $2",
        )
        .bind(username)
        .bind(project_id)
        .fetch_optional(db)
        .await?;

        if let Some((key,)) = project_key {
            return Ok(Some(key));
        }
    }

    let user_key: Option<(String,)> =
        sqlx::query_as("SELECT api_key FROM api_keys WHERE username = $1 AND project_id IS NULL")
            .bind(username)
            .fetch_optional(db)
            .await?;

    if let Some((key,)) = user_key {
        return Ok(Some(key));
    }

    Ok(default_key.map(|key| key.to_string()))
}
