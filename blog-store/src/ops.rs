use sqlx::mysql::MySqlPool;
use sqlx::QueryBuilder;

use crate::models::{BulkUpdateFields, ListFilter, NewRecord, Record};
use crate::StoreError;

/// Bulk-inserts `rows` in a single statement/transaction. On a duplicate
/// `client_msg_id`, the conflicting row's `updated_at` is refreshed and the
/// rest of the row is left untouched; this absorbs at-least-once redelivery
/// without creating a second row. A no-op call (`rows` empty) is a cheap
/// success, matching callers that flush empty buffers defensively.
pub async fn bulk_insert(pool: &MySqlPool, rows: &[NewRecord]) -> Result<(), StoreError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::new(
        "INSERT INTO blogs (client_msg_id, author, created_at, updated_at, genre, location, content) ",
    );
    qb.push_values(rows, |mut b, row| {
        b.push_bind(row.client_msg_id.as_deref())
            .push_bind(&row.author)
            .push_bind(row.created_at)
            .push_bind(row.updated_at)
            .push_bind(&row.genre)
            .push_bind(&row.location)
            .push_bind(&row.content);
    });
    qb.push(" ON DUPLICATE KEY UPDATE updated_at = VALUES(updated_at)");

    qb.build()
        .execute(pool)
        .await
        .map_err(StoreError::Query)?;
    Ok(())
}

/// Inserts a single row and returns its assigned id. Used by the synchronous
/// create path, which needs the id back on the same statement that
/// `LAST_INSERT_ID()` reports against.
pub async fn insert_one(pool: &MySqlPool, row: &NewRecord) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "INSERT INTO blogs (client_msg_id, author, created_at, updated_at, genre, location, content) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE updated_at = VALUES(updated_at), id = LAST_INSERT_ID(id)",
    )
    .bind(row.client_msg_id.as_deref())
    .bind(&row.author)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(&row.genre)
    .bind(&row.location)
    .bind(&row.content)
    .execute(pool)
    .await
    .map_err(StoreError::Query)?;

    Ok(result.last_insert_id())
}

pub async fn bulk_delete(pool: &MySqlPool, ids: &[u64]) -> Result<u64, StoreError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::new("DELETE FROM blogs WHERE id IN (");
    push_id_list(&mut qb, ids);
    qb.push(")");

    let result = qb.build().execute(pool).await.map_err(StoreError::Query)?;
    Ok(result.rows_affected())
}

/// Empty-string fields in [`BulkUpdateFields`] must already have been turned
/// into `None` by the caller; `None` here means "leave unchanged".
pub async fn bulk_update(
    pool: &MySqlPool,
    ids: &[u64],
    fields: &BulkUpdateFields,
) -> Result<u64, StoreError> {
    if ids.is_empty() || fields.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::new("UPDATE blogs SET ");
    let mut wrote_a_field = false;
    if let Some(genre) = &fields.genre {
        qb.push("genre = ");
        qb.push_bind(genre.clone());
        wrote_a_field = true;
    }
    if let Some(location) = &fields.location {
        if wrote_a_field {
            qb.push(", ");
        }
        qb.push("location = ");
        qb.push_bind(location.clone());
        wrote_a_field = true;
    }
    if let Some(content) = &fields.content {
        if wrote_a_field {
            qb.push(", ");
        }
        qb.push("content = ");
        qb.push_bind(content.clone());
    }
    qb.push(" WHERE id IN (");
    push_id_list(&mut qb, ids);
    qb.push(")");

    let result = qb.build().execute(pool).await.map_err(StoreError::Query)?;
    Ok(result.rows_affected())
}

pub async fn update_content(
    pool: &MySqlPool,
    id: u64,
    content: &str,
    updated_at: chrono::DateTime<chrono::Utc>,
) -> Result<u64, StoreError> {
    let result = sqlx::query("UPDATE blogs SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(updated_at)
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::Query)?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &MySqlPool, id: u64) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::Query)?;
    Ok(result.rows_affected())
}

pub async fn select_by_id(pool: &MySqlPool, id: u64) -> Result<Option<Record>, StoreError> {
    let row = sqlx::query_as::<_, Record>(
        "SELECT id, client_msg_id, author, created_at, updated_at, genre, location, content \
         FROM blogs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(StoreError::Query)?;
    Ok(row)
}

pub async fn list(pool: &MySqlPool, filter: &ListFilter) -> Result<Vec<Record>, StoreError> {
    let mut qb = QueryBuilder::new(
        "SELECT id, client_msg_id, author, created_at, updated_at, genre, location, content FROM blogs",
    );

    let mut wrote_where = false;
    let mut push_filter = |qb: &mut QueryBuilder<sqlx::MySql>, column: &str, value: &Option<String>| {
        if let Some(value) = value {
            qb.push(if wrote_where { " AND " } else { " WHERE " });
            qb.push(column);
            qb.push(" = ");
            qb.push_bind(value.clone());
            wrote_where = true;
        }
    };
    push_filter(&mut qb, "author", &filter.author);
    push_filter(&mut qb, "genre", &filter.genre);
    push_filter(&mut qb, "location", &filter.location);

    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(filter.limit);
    qb.push(" OFFSET ");
    qb.push_bind(filter.offset);

    let rows = qb
        .build_query_as::<Record>()
        .fetch_all(pool)
        .await
        .map_err(StoreError::Query)?;
    Ok(rows)
}

fn push_id_list(qb: &mut QueryBuilder<sqlx::MySql>, ids: &[u64]) {
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
}
