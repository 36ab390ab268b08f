#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub username: String,
    pub project_id: Option<Uuid>,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

/// Listing projection: the key value is masked down to its last four characters.
#[derive(Debug, Clone, Serialize)]
pub struct MaskedApiKey {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for MaskedApiKey {
    fn from(key: ApiKey) -> Self {
        MaskedApiKey {
            id: key.id,
            project_id: key.project_id,
            api_key: mask_key(&key.api_key),
            created_at: key.created_at,
        }
    }
}

fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("*****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key_keeps_last_four() {
        assert_eq!(mask_key("sk-ant-abcdef1234"), "*****1234");
    }

    #[test]
    fn test_mask_key_short_value() {
        assert_eq!(mask_key("abc"), "*****abc");
    }
}
