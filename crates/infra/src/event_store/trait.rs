use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use comanda_core::{AggregateId, ExpectedVersion, RestaurantId};

/// An event ready to be appended to a stream (no sequence number yet).
///
/// Lifecycle: domain event → `UncommittedEvent` (wrapped with stream
/// metadata) → `StoredEvent` (sequence number assigned by the store) →
/// `EventEnvelope` (published to the bus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub restaurant_id: RestaurantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream.
///
/// Sequence numbers are assigned by the store during append: monotonically
/// increasing, scoped per stream (`restaurant_id` + `aggregate_id`),
/// immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub restaurant_id: RestaurantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert into a restaurant-scoped envelope for publication.
    pub fn to_envelope(&self) -> comanda_events::EventEnvelope<JsonValue> {
        comanda_events::EventEnvelope::new(
            self.event_id,
            self.restaurant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error (infrastructure-level, not domain-level).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("restaurant scope violation: {0}")]
    ScopeIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// One stream's contribution to a multi-stream append.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    /// Optimistic expectation for the target stream's current version.
    pub expected_version: ExpectedVersion,
    /// Events to append; all must target the same stream.
    pub events: Vec<UncommittedEvent>,
}

/// Append-only, restaurant-scoped event store.
///
/// Events are organized into streams, one per aggregate instance, keyed by
/// `(restaurant_id, aggregate_id)`. Within a stream, sequence numbers are
/// assigned 1, 2, 3, … with no gaps.
///
/// `append_multi` is the store's **transactional write primitive**: every
/// batch's optimistic check must pass against its own stream, and either all
/// batches commit or none do. This is what lets a checkout write one order
/// stream and N ledger streams as a single all-or-nothing commit, with a
/// stale ledger read rejected by its version check rather than silently
/// over-selling.
///
/// Implementations must:
/// - enforce restaurant isolation on reads and writes
/// - enforce optimistic concurrency per stream
/// - assign sequence numbers monotonically (no gaps, no duplicates)
/// - make `append_multi` atomic across its batches
pub trait EventStore: Send + Sync {
    /// Append to several streams atomically (all-or-nothing).
    ///
    /// All batches must belong to the same restaurant and target distinct
    /// streams; each batch's `expected_version` is checked against its
    /// stream before anything is written.
    fn append_multi(&self, appends: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for a restaurant + aggregate.
    fn load_stream(
        &self,
        restaurant_id: RestaurantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append events to a single aggregate stream (append-only).
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.append_multi(vec![StreamAppend {
            expected_version,
            events,
        }])
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append_multi(&self, appends: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_multi(appends)
    }

    fn load_stream(
        &self,
        restaurant_id: RestaurantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(restaurant_id, aggregate_id)
    }

    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    ///
    /// Keeps infra decoupled from the domain crates while capturing the
    /// event metadata needed for later deserialization.
    pub fn from_typed<E>(
        restaurant_id: RestaurantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: comanda_events::Event + serde::Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            restaurant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
