use chrono::{DateTime, Utc};
use serde::Serialize;

/// A row in the canonical `blogs` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Record {
    pub id: u64,
    pub client_msg_id: Option<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub genre: String,
    pub location: String,
    pub content: String,
}

/// A row awaiting insertion. `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub client_msg_id: Option<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub genre: String,
    pub location: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub author: Option<String>,
    pub genre: Option<String>,
    pub location: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Fields to set during a bulk update. A `None` field is left unchanged;
/// this is the internal absent/present representation the facade translates
/// the wire's empty-string sentinel into before it reaches the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUpdateFields {
    pub genre: Option<String>,
    pub location: Option<String>,
    pub content: Option<String>,
}

impl BulkUpdateFields {
    pub fn is_empty(&self) -> bool {
        self.genre.is_none() && self.location.is_none() && self.content.is_none()
    }
}
