use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use comanda_core::{AggregateId, RestaurantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    restaurant_id: RestaurantId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// The default backend for dev/tests. One write lock covers the whole map, so
/// `append_multi` is trivially atomic: every batch's optimistic check runs
/// under the lock before the first event is written, and a failed check
/// leaves no partial state behind.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Validate one batch and return its stream key.
    fn batch_key(batch: &StreamAppend) -> Result<StreamKey, EventStoreError> {
        let first = batch.events.first().ok_or_else(|| {
            EventStoreError::InvalidAppend("append batch contains no events".to_string())
        })?;

        let restaurant_id = first.restaurant_id;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in batch.events.iter().enumerate() {
            if e.restaurant_id != restaurant_id {
                return Err(EventStoreError::ScopeIsolation(format!(
                    "batch contains multiple restaurant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        Ok(StreamKey {
            restaurant_id,
            aggregate_id,
        })
    }
}

impl EventStore for InMemoryEventStore {
    fn append_multi(&self, appends: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let appends: Vec<StreamAppend> =
            appends.into_iter().filter(|b| !b.events.is_empty()).collect();
        if appends.is_empty() {
            return Ok(vec![]);
        }

        // Per-batch shape checks before taking the lock.
        let mut keys = Vec::with_capacity(appends.len());
        for batch in &appends {
            keys.push(Self::batch_key(batch)?);
        }

        // One commit spans one restaurant; distinct streams only.
        let restaurant_id = keys[0].restaurant_id;
        let mut seen = HashSet::new();
        for key in &keys {
            if key.restaurant_id != restaurant_id {
                return Err(EventStoreError::ScopeIsolation(
                    "multi-stream append spans multiple restaurants".to_string(),
                ));
            }
            if !seen.insert(key.aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "duplicate stream in multi-stream append: {}",
                    key.aggregate_id
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Phase 1: every optimistic check must pass before anything commits.
        for (batch, key) in appends.iter().zip(&keys) {
            let stream = streams.get(key).map(Vec::as_slice).unwrap_or(&[]);
            let current = Self::current_version(stream);

            if !batch.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    key.aggregate_id, batch.expected_version
                )));
            }

            // Enforce aggregate type stability across the stream.
            if let (Some(existing), Some(incoming)) = (stream.first(), batch.events.first()) {
                if existing.aggregate_type != incoming.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, incoming.aggregate_type
                    )));
                }
            }
        }

        // Phase 2: all checks passed — assign sequence numbers and append.
        let mut committed = Vec::new();
        for (batch, key) in appends.into_iter().zip(keys) {
            let stream = streams.entry(key).or_default();
            let mut next = Self::current_version(stream) + 1;

            for e in batch.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    restaurant_id: e.restaurant_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        restaurant_id: RestaurantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            restaurant_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use comanda_core::ExpectedVersion;
    use serde_json::json;
    use uuid::Uuid;

    fn event(
        restaurant_id: RestaurantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
    ) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            restaurant_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.event".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let r = RestaurantId::new();
        let a = AggregateId::new();

        let first = store
            .append(vec![event(r, a, "t")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(first[0].sequence_number, 1);

        let second = store
            .append(
                vec![event(r, a, "t"), event(r, a, "t")],
                ExpectedVersion::Exact(1),
            )
            .unwrap();
        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(second[1].sequence_number, 3);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let r = RestaurantId::new();
        let a = AggregateId::new();

        store
            .append(vec![event(r, a, "t")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![event(r, a, "t")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn multi_stream_append_is_all_or_nothing() {
        let store = InMemoryEventStore::new();
        let r = RestaurantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        // Seed stream `a` at version 1.
        store
            .append(vec![event(r, a, "t")], ExpectedVersion::Exact(0))
            .unwrap();

        // Batch: `b` at Exact(0) would pass, but `a` at Exact(0) is stale.
        let err = store
            .append_multi(vec![
                StreamAppend {
                    expected_version: ExpectedVersion::Exact(0),
                    events: vec![event(r, b, "t")],
                },
                StreamAppend {
                    expected_version: ExpectedVersion::Exact(0),
                    events: vec![event(r, a, "t")],
                },
            ])
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));

        // Nothing was written to either stream.
        assert!(store.load_stream(r, b).unwrap().is_empty());
        assert_eq!(store.load_stream(r, a).unwrap().len(), 1);
    }

    #[test]
    fn multi_stream_append_commits_all_batches_together() {
        let store = InMemoryEventStore::new();
        let r = RestaurantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        let committed = store
            .append_multi(vec![
                StreamAppend {
                    expected_version: ExpectedVersion::Exact(0),
                    events: vec![event(r, a, "order")],
                },
                StreamAppend {
                    expected_version: ExpectedVersion::Exact(0),
                    events: vec![event(r, b, "ledger")],
                },
            ])
            .unwrap();

        assert_eq!(committed.len(), 2);
        assert_eq!(store.load_stream(r, a).unwrap().len(), 1);
        assert_eq!(store.load_stream(r, b).unwrap().len(), 1);
    }

    #[test]
    fn cross_restaurant_batches_are_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        let err = store
            .append_multi(vec![
                StreamAppend {
                    expected_version: ExpectedVersion::Exact(0),
                    events: vec![event(RestaurantId::new(), a, "t")],
                },
                StreamAppend {
                    expected_version: ExpectedVersion::Exact(0),
                    events: vec![event(RestaurantId::new(), b, "t")],
                },
            ])
            .unwrap_err();
        assert!(matches!(err, EventStoreError::ScopeIsolation(_)));
    }

    #[test]
    fn streams_are_isolated_per_restaurant() {
        let store = InMemoryEventStore::new();
        let r1 = RestaurantId::new();
        let r2 = RestaurantId::new();
        let a = AggregateId::new();

        store
            .append(vec![event(r1, a, "t")], ExpectedVersion::Exact(0))
            .unwrap();

        assert!(store.load_stream(r2, a).unwrap().is_empty());
    }

    #[test]
    fn aggregate_type_is_stable_per_stream() {
        let store = InMemoryEventStore::new();
        let r = RestaurantId::new();
        let a = AggregateId::new();

        store
            .append(vec![event(r, a, "menu.item")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(
                vec![event(r, a, "inventory.ledger")],
                ExpectedVersion::Exact(1),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}
