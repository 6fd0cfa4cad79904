//! Thin adapter over the durable, per-category stream bus (a Redis-compatible
//! store) described in the system spec: append-with-maxlen, a category
//! registry set, consumer groups, group reads, ack and delete.
//!
//! Every blocking or fallible Redis round trip lives behind the [`StreamBus`]
//! methods below; callers never see a raw `redis::RedisError`.

use std::collections::HashMap;

use deadpool_redis::{Config, Pool, Runtime};
use log::warn;
use miette::Diagnostic;
use redis::AsyncCommands;
use thiserror::Error;

pub const CATEGORY_REGISTRY: &str = "blogs:genres";
/// Sentinel id handed to `XREADGROUP` meaning "only entries never delivered
/// to this consumer name before".
pub const NEW_ENTRIES: &str = ">";
/// Start position for a freshly created consumer group: the beginning of the
/// stream, so entries published before the group existed are not lost.
pub const GROUP_START: &str = "0";

#[derive(Debug, Error, Diagnostic)]
pub enum BusError {
    #[error("could not build redis connection pool")]
    PoolConfig(#[source] deadpool_redis::CreatePoolError),

    #[error("could not check out a redis connection")]
    PoolCheckout(#[source] deadpool_redis::PoolError),

    #[error("redis command failed")]
    Command(#[source] redis::RedisError),
}

/// A single entry read from a stream, still addressed by its bus-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub entry_id: String,
    pub fields: HashMap<String, String>,
}

/// One stream's worth of messages from a single `group_read` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBatch {
    pub stream: String,
    pub messages: Vec<StreamMessage>,
}

#[derive(Clone)]
pub struct StreamBus {
    pool: Pool,
}

impl StreamBus {
    pub fn connect(redis_url: &str) -> Result<Self, BusError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(BusError::PoolConfig)?;
        Ok(Self { pool })
    }

    /// `blogs:genre:<category>`, verbatim per the stream naming contract.
    pub fn stream_for_category(category: &str) -> String {
        format!("blogs:genre:{category}")
    }

    pub async fn set_add(&self, set_name: &str, member: &str) -> Result<(), BusError> {
        let mut conn = self.pool.get().await.map_err(BusError::PoolCheckout)?;
        let _: i64 = conn
            .sadd(set_name, member)
            .await
            .map_err(BusError::Command)?;
        Ok(())
    }

    pub async fn set_members(&self, set_name: &str) -> Result<Vec<String>, BusError> {
        let mut conn = self.pool.get().await.map_err(BusError::PoolCheckout)?;
        let members: Vec<String> = conn.smembers(set_name).await.map_err(BusError::Command)?;
        Ok(members)
    }

    /// Appends `fields` to `stream`, capping it to approximately `maxlen`
    /// entries. Returns the entry id the bus assigned.
    pub async fn append(
        &self,
        stream: &str,
        fields: &HashMap<String, String>,
        maxlen: usize,
    ) -> Result<String, BusError> {
        let mut conn = self.pool.get().await.map_err(BusError::PoolCheckout)?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(maxlen)
            .arg("*");
        for (key, value) in fields {
            cmd.arg(key).arg(value);
        }
        let entry_id: String = cmd.query_async(&mut conn).await.map_err(BusError::Command)?;
        Ok(entry_id)
    }

    /// Creates `group` on `stream` starting at [`GROUP_START`], creating the
    /// stream if absent. An already-exists error (`BUSYGROUP`) is swallowed;
    /// any other error is logged and returned to the caller so the loop can
    /// decide whether it's fatal for this iteration.
    pub async fn group_create(&self, stream: &str, group: &str) -> Result<(), BusError> {
        let mut conn = self.pool.get().await.map_err(BusError::PoolCheckout)?;
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg(GROUP_START)
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.to_string().contains("BUSYGROUP") => Ok(()),
            Err(err) => {
                warn!("xgroup create failed on {stream}: {err}");
                Err(BusError::Command(err))
            }
        }
    }

    /// Reads up to `count` new entries (per stream) for `consumer` in
    /// `group`, blocking for up to `block_ms` if nothing is immediately
    /// available. `streams` is the full discovered set for this iteration.
    pub async fn group_read(
        &self,
        group: &str,
        consumer: &str,
        streams: &[String],
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamBatch>, BusError> {
        if streams.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.get().await.map_err(BusError::PoolCheckout)?;
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS");
        for stream in streams {
            cmd.arg(stream);
        }
        for _ in streams {
            cmd.arg(NEW_ENTRIES);
        }

        let raw: Option<Vec<(String, Vec<(String, Vec<String>)>)>> =
            cmd.query_async(&mut conn).await.map_err(BusError::Command)?;

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        Ok(raw
            .into_iter()
            .map(|(stream, entries)| StreamBatch {
                stream,
                messages: entries
                    .into_iter()
                    .map(|(entry_id, flat_fields)| StreamMessage {
                        entry_id,
                        fields: flatten_field_pairs(flat_fields),
                    })
                    .collect(),
            })
            .collect())
    }

    pub async fn ack(&self, stream: &str, group: &str, entry_ids: &[String]) -> Result<(), BusError> {
        if entry_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await.map_err(BusError::PoolCheckout)?;
        let mut cmd = redis::cmd("XACK");
        cmd.arg(stream).arg(group);
        for id in entry_ids {
            cmd.arg(id);
        }
        let _: i64 = cmd.query_async(&mut conn).await.map_err(BusError::Command)?;
        Ok(())
    }

    pub async fn delete(&self, stream: &str, entry_ids: &[String]) -> Result<(), BusError> {
        if entry_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await.map_err(BusError::PoolCheckout)?;
        let mut cmd = redis::cmd("XDEL");
        cmd.arg(stream);
        for id in entry_ids {
            cmd.arg(id);
        }
        let _: i64 = cmd.query_async(&mut conn).await.map_err(BusError::Command)?;
        Ok(())
    }
}

/// `XREADGROUP` returns each entry's fields as a flat `[k1, v1, k2, v2, ...]`
/// array; reassemble it into a map.
fn flatten_field_pairs(flat: Vec<String>) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        map.insert(key, value);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_name_is_namespaced_by_category() {
        assert_eq!(StreamBus::stream_for_category("rust"), "blogs:genre:rust");
        assert_eq!(
            StreamBus::stream_for_category("with spaces"),
            "blogs:genre:with spaces"
        );
    }

    #[test]
    fn flatten_field_pairs_builds_a_map() {
        let flat = vec![
            "genre".to_string(),
            "rust".to_string(),
            "author".to_string(),
            "ferris".to_string(),
        ];
        let map = flatten_field_pairs(flat);
        assert_eq!(map.get("genre").map(String::as_str), Some("rust"));
        assert_eq!(map.get("author").map(String::as_str), Some("ferris"));
    }

    #[test]
    fn flatten_field_pairs_drops_a_trailing_unpaired_key() {
        let flat = vec!["genre".to_string(), "rust".to_string(), "orphan".to_string()];
        let map = flatten_field_pairs(flat);
        assert_eq!(map.len(), 1);
    }
}
