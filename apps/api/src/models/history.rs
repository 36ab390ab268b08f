use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One persisted AI interaction: a test-case generation run or a chat turn.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub username: String,
    pub kind: String,
    pub test_cases: Option<String>,
    pub response: Option<String>,
    pub requirements: Option<String>,
    pub context: Option<String>,
    pub message: Option<String>,
    pub project_id: Option<Uuid>,
    pub requirement_id: Option<Uuid>,
    pub requirement_title: Option<String>,
    pub created_at: DateTime<Utc>,
}
