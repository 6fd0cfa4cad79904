use std::time::Duration;

use blog_bus::{StreamBatch, StreamBus, CATEGORY_REGISTRY};
use blog_store::{MySqlPool, NewRecord};
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::buffer::{BufferedItem, FlushThresholds, KeyState, StagedRecord};
use crate::error::WorkerError;

type BufferKey = (String, String);

const DISCOVERY_EMPTY_BACKOFF: Duration = Duration::from_millis(500);
const LOOP_ERROR_BACKOFF: Duration = Duration::from_millis(1000);
const GROUP_READ_BLOCK_MS: u64 = 1000;

pub struct BatchConsumer {
    bus: StreamBus,
    store: MySqlPool,
    group: String,
    consumer_name: String,
    thresholds: FlushThresholds,
    buffers: HashMap<BufferKey, KeyState>,
}

impl BatchConsumer {
    pub fn new(
        bus: StreamBus,
        store: MySqlPool,
        group: String,
        consumer_name: String,
        thresholds: FlushThresholds,
    ) -> Self {
        Self {
            bus,
            store,
            group,
            consumer_name,
            thresholds,
            buffers: HashMap::new(),
        }
    }

    /// Runs until `shutdown` is cancelled. Observed cooperatively at the top
    /// of each iteration; an in-flight flush is always allowed to finish
    /// before the loop exits.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(err) = self.run_once(&shutdown).await {
                warn!("worker loop error, retrying in {LOOP_ERROR_BACKOFF:?}: {err}");
                tokio::select! {
                    _ = tokio::time::sleep(LOOP_ERROR_BACKOFF) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }
        info!("batch consumer {} shutting down", self.consumer_name);
    }

    async fn run_once(&mut self, shutdown: &CancellationToken) -> Result<(), WorkerError> {
        let streams = self.discover_streams().await?;
        if streams.is_empty() {
            debug!("no categories discovered yet, sleeping");
            tokio::select! {
                _ = tokio::time::sleep(DISCOVERY_EMPTY_BACKOFF) => {}
                _ = shutdown.cancelled() => {}
            }
            return Ok(());
        }

        self.ensure_groups(&streams).await;

        let batches = self
            .bus
            .group_read(
                &self.group,
                &self.consumer_name,
                &streams,
                self.thresholds.max_count,
                GROUP_READ_BLOCK_MS,
            )
            .await?;

        for batch in batches {
            self.buffer_batch(batch);
        }

        let now = Utc::now();
        let eligible: Vec<BufferKey> = self
            .buffers
            .iter()
            .filter(|(_, state)| state.is_eligible(now, &self.thresholds))
            .map(|(key, _)| key.clone())
            .collect();

        for key in eligible {
            if let Err(err) = self.flush_key(&key).await {
                warn!(
                    "flush failed for ({}, {}), items remain buffered for retry: {err}",
                    key.0, key.1
                );
            }
        }

        Ok(())
    }

    async fn discover_streams(&self) -> Result<Vec<String>, WorkerError> {
        let mut categories = self.bus.set_members(CATEGORY_REGISTRY).await?;
        categories.sort();
        Ok(categories
            .iter()
            .map(|category| StreamBus::stream_for_category(category))
            .collect())
    }

    async fn ensure_groups(&self, streams: &[String]) {
        for stream in streams {
            if let Err(err) = self.bus.group_create(stream, &self.group).await {
                warn!("could not ensure consumer group on {stream}: {err}");
            }
        }
    }

    fn buffer_batch(&mut self, batch: StreamBatch) {
        let now = Utc::now();
        for message in batch.messages {
            let fields = message.fields;
            let genre = fields.get("genre").cloned().unwrap_or_default();
            let location = fields.get("location").cloned().unwrap_or_default();
            let author = fields.get("author").cloned().unwrap_or_default();
            let content = fields.get("content").cloned().unwrap_or_default();
            let client_msg_id = fields.get("client_msg_id").cloned().unwrap_or_default();
            let created_at = fields
                .get("created_at_iso")
                .and_then(|iso| parse_iso(iso))
                .unwrap_or(now);

            let record = StagedRecord {
                client_msg_id,
                author,
                content,
                genre: genre.clone(),
                location: location.clone(),
                created_at,
                updated_at: now,
            };
            let item = BufferedItem {
                record,
                source_stream: batch.stream.clone(),
                source_entry_id: message.entry_id,
            };

            self.buffers.entry((genre, location)).or_default().push(item, now);
        }
    }

    async fn flush_key(&mut self, key: &BufferKey) -> Result<(), WorkerError> {
        let Some(state) = self.buffers.get(key) else {
            return Ok(());
        };
        if state.items.is_empty() {
            return Ok(());
        }

        let rows: Vec<NewRecord> = state
            .items
            .iter()
            .map(|item| {
                let record = &item.record;
                NewRecord {
                    client_msg_id: non_empty(&record.client_msg_id),
                    author: record.author.clone(),
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                    genre: record.genre.clone(),
                    location: record.location.clone(),
                    content: record.content.clone(),
                }
            })
            .collect();

        blog_store::bulk_insert(&self.store, &rows).await?;

        let mut entries_by_stream: HashMap<String, Vec<String>> = HashMap::new();
        for item in &state.items {
            entries_by_stream
                .entry(item.source_stream.clone())
                .or_default()
                .push(item.source_entry_id.clone());
        }

        for (stream, entry_ids) in entries_by_stream {
            if let Err(err) = self.bus.ack(&stream, &self.group, &entry_ids).await {
                warn!("ack failed on {stream} after a committed flush: {err}");
            }
            if let Err(err) = self.bus.delete(&stream, &entry_ids).await {
                warn!("delete failed on {stream} after a committed flush: {err}");
            }
        }

        if let Some(state) = self.buffers.get_mut(key) {
            state.clear();
        }

        Ok(())
    }
}

fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
