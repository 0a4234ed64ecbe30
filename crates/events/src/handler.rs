//! Deterministic inline command execution.

/// Execute an aggregate command deterministically (no IO, no async).
///
/// Decide via `handle`, then evolve via `apply` — the canonical
/// event-sourced lifecycle, collapsed into one step for tests and inline
/// processing. Production paths go through the dispatcher in
/// `comanda-infra`, which adds persistence, publication and optimistic
/// concurrency.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: comanda_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
