//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// instances with the same values are the same thing. `CurrencyCode` and
/// `TaxRate` are the canonical examples here — a cart line's price snapshot
/// has no identity of its own.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
