use chrono::{DateTime, Utc};

/// A record as reconstructed from a stream entry's fields, ready to become a
/// [`blog_store::NewRecord`] once its key's buffer flushes.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRecord {
    pub client_msg_id: String,
    pub author: String,
    pub content: String,
    pub genre: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item read from the bus but not yet flushed. Exclusively owned by the
/// consumer instance that read it until the owning key's buffer flushes and
/// acks it.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedItem {
    pub record: StagedRecord,
    pub source_stream: String,
    pub source_entry_id: String,
}

/// The three independent thresholds that make a key eligible to flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushThresholds {
    pub max_count: usize,
    pub max_age_ms: u64,
    pub max_bytes: usize,
}

/// `len(content) + len(author) + len(location) + len(genre) + 64`, the
/// spec's approximate per-item byte cost.
pub fn approx_byte_cost(record: &StagedRecord) -> usize {
    record.content.len() + record.author.len() + record.location.len() + record.genre.len() + 64
}

/// Per-`(category, location)` buffer state. Lifecycle: created lazily on
/// first insertion (via `Default`), reset on flush.
#[derive(Debug, Default)]
pub struct KeyState {
    pub items: Vec<BufferedItem>,
    pub first_at: Option<DateTime<Utc>>,
    pub bytes: usize,
}

impl KeyState {
    pub fn push(&mut self, item: BufferedItem, now: DateTime<Utc>) {
        let cost = approx_byte_cost(&item.record);
        if self.first_at.is_none() {
            self.first_at = Some(now);
        }
        self.bytes += cost;
        self.items.push(item);
    }

    /// Eligible when count, age, or accumulated bytes crosses its threshold.
    /// An empty buffer is never eligible.
    pub fn is_eligible(&self, now: DateTime<Utc>, thresholds: &FlushThresholds) -> bool {
        if self.items.is_empty() {
            return false;
        }
        if self.items.len() >= thresholds.max_count {
            return true;
        }
        if let Some(first_at) = self.first_at {
            let age_ms = (now - first_at).num_milliseconds().max(0) as u64;
            if age_ms >= thresholds.max_age_ms {
                return true;
            }
        }
        self.bytes >= thresholds.max_bytes
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.first_at = None;
        self.bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(content: &str) -> BufferedItem {
        BufferedItem {
            record: StagedRecord {
                client_msg_id: "id".to_string(),
                author: "a".to_string(),
                content: content.to_string(),
                genre: "g".to_string(),
                location: "l".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            source_stream: "blogs:genre:g".to_string(),
            source_entry_id: "1-0".to_string(),
        }
    }

    fn thresholds() -> FlushThresholds {
        FlushThresholds {
            max_count: 1000,
            max_age_ms: 300,
            max_bytes: 2_097_152,
        }
    }

    #[test]
    fn empty_buffer_is_never_eligible() {
        let state = KeyState::default();
        assert!(!state.is_eligible(Utc::now(), &thresholds()));
    }

    #[test]
    fn count_threshold_triggers_flush() {
        let mut state = KeyState::default();
        let now = Utc::now();
        for _ in 0..999 {
            state.push(item("x"), now);
        }
        assert!(!state.is_eligible(now, &thresholds()), "999 items shouldn't flush yet");
        state.push(item("x"), now);
        assert!(state.is_eligible(now, &thresholds()), "1000th item should trigger a flush");
    }

    #[test]
    fn age_threshold_triggers_flush_after_inactivity() {
        let mut state = KeyState::default();
        let first_at = Utc::now() - Duration::milliseconds(301);
        state.push(item("x"), first_at);
        assert!(state.is_eligible(Utc::now(), &thresholds()));
    }

    #[test]
    fn age_threshold_does_not_trigger_early() {
        let mut state = KeyState::default();
        let now = Utc::now();
        state.push(item("x"), now);
        assert!(!state.is_eligible(now, &thresholds()));
    }

    #[test]
    fn byte_threshold_triggers_flush() {
        let mut state = KeyState::default();
        let now = Utc::now();
        let big = "x".repeat(2_097_152);
        state.push(item(&big), now);
        assert!(state.is_eligible(now, &thresholds()));
    }

    #[test]
    fn clear_resets_all_state() {
        let mut state = KeyState::default();
        let now = Utc::now();
        state.push(item("x"), now);
        state.clear();
        assert!(state.items.is_empty());
        assert!(state.first_at.is_none());
        assert_eq!(state.bytes, 0);
        assert!(!state.is_eligible(now, &thresholds()));
    }

    #[test]
    fn byte_cost_matches_spec_formula() {
        let record = item("hello").record;
        assert_eq!(approx_byte_cost(&record), 5 + 1 + 1 + 1 + 64);
    }
}
