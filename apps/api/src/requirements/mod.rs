pub mod handlers;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::requirement::Requirement;

pub async fn fetch_requirement(
    db: &PgPool,
    requirement_id: Uuid,
) -> Result<Option<Requirement>, sqlx::Error> {
    sqlx::query_as::<_, Requirement>("SELECT * FROM requirements WHERE id = $1")
        .bind(requirement_id)
        .fetch_optional(db)
        .await
}
