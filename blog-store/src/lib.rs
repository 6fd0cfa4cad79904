mod models;
mod ops;
pub mod pool;
mod schema_check;

pub use models::{BulkUpdateFields, ListFilter, NewRecord, Record};
pub use ops::*;
pub use schema_check::verify_schema;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("could not connect to the record store")]
    Connect(#[source] sqlx::Error),

    #[error("record store query failed")]
    Query(#[source] sqlx::Error),

    #[error("could not run pending migrations")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

pub use sqlx::MySqlPool;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn bulk_update_fields_empty_detection() {
        let empty = BulkUpdateFields::default();
        assert!(empty.is_empty());

        let with_genre = BulkUpdateFields {
            genre: Some("rust".to_string()),
            ..Default::default()
        };
        assert!(!with_genre.is_empty());
    }

    #[test]
    fn new_record_round_trips_fields() {
        let now = Utc::now();
        let row = NewRecord {
            client_msg_id: Some("11111111-1111-1111-1111-111111111111".to_string()),
            author: "a".to_string(),
            created_at: now,
            updated_at: now,
            genre: "g1".to_string(),
            location: "l1".to_string(),
            content: "hi".to_string(),
        };
        assert_eq!(row.author, "a");
        assert!(row.updated_at >= row.created_at);
    }
}
