use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub context: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

/// Project row joined with its collaborator usernames.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectWithCollaborators {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub context: String,
    pub collaborators: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Collaborator {
    pub id: Uuid,
    pub project_id: Uuid,
    pub username: String,
    pub email: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}
