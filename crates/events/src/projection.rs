use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are **disposable**: the event streams are the source of truth
/// and any projection can be rebuilt from scratch by replay. Because the bus
/// delivers at-least-once, `apply` must be **idempotent** — applying the same
/// envelope twice must not change the outcome. The `ProjectionRunner` helps
/// by tracking sequence numbers and rejecting non-monotonic input, but
/// projections should stay idempotent at the domain level too.
///
/// The envelope carries `restaurant_id`; projections must scope every read
/// model update to it so one restaurant's board never leaks into another's.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
