use std::collections::HashSet;

use log::{error, info};
use sqlx::mysql::MySqlPool;

use crate::StoreError;

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "client_msg_id",
    "author",
    "created_at",
    "updated_at",
    "genre",
    "location",
    "content",
];

/// Verifies the `blogs` table carries every column the bulk operations
/// assume. Missing columns are logged, never raised: the ingest path can
/// still enqueue onto the stream bus even if the schema isn't ready yet, and
/// flushes will simply fail and retry until it is (see the spec's startup
/// schema error kind).
pub async fn verify_schema(pool: &MySqlPool, database: &str) -> Result<HashSet<String>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = 'blogs'",
    )
    .bind(database)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Query)?;

    let present: HashSet<String> = rows.into_iter().map(|(name,)| name).collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !present.contains(**col))
        .copied()
        .collect();

    if missing.is_empty() {
        info!("schema check: all required columns present on 'blogs' in '{database}'");
    } else {
        error!(
            "schema check: missing columns on 'blogs' in '{database}': {}",
            missing.join(", ")
        );
    }

    Ok(present)
}
