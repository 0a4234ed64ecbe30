//! Canonical order status workflow.
//!
//! One state machine governs an order's lifecycle. The kitchen consoles use
//! their own progress vocabulary; that vocabulary is a derived display
//! mapping over this machine, never a second source of truth.

use serde::{Deserialize, Serialize};

use comanda_core::DomainError;

/// Canonical order status.
///
/// Legal transitions:
///
/// ```text
/// PENDING  -> PAYING, CANCELLED
/// PAYING   -> PAID, PENDING, CANCELLED
/// PAID     -> SERVED, REFUNDED
/// SERVED / CANCELLED / REFUNDED -> (none)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paying,
    Paid,
    Served,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// The set of statuses this one may move to.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Paying, Cancelled],
            Paying => &[Paid, Pending, Cancelled],
            Paid => &[Served, Refunded],
            Served | Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Canonical wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paying => "PAYING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Served => "SERVED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// The kitchen-console display stage for this status.
    ///
    /// Lossy by design: the canonical machine is authoritative and carries no
    /// "ready to serve" state, so [`KitchenStage::Ready`] is never produced.
    pub fn kitchen_stage(self) -> KitchenStage {
        match self {
            OrderStatus::Pending | OrderStatus::Paying => KitchenStage::Pending,
            OrderStatus::Paid => KitchenStage::Preparing,
            OrderStatus::Served => KitchenStage::Completed,
            OrderStatus::Cancelled | OrderStatus::Refunded => KitchenStage::Cancelled,
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAYING" => Ok(OrderStatus::Paying),
            "PAID" => Ok(OrderStatus::Paid),
            "SERVED" => Ok(OrderStatus::Served),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            other => Err(DomainError::validation(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

/// Kitchen-console display vocabulary (pending → preparing → ready →
/// completed/cancelled), derived from [`OrderStatus::kitchen_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KitchenStage {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl KitchenStage {
    pub fn as_str(self) -> &'static str {
        match self {
            KitchenStage::Pending => "pending",
            KitchenStage::Preparing => "preparing",
            KitchenStage::Ready => "ready",
            KitchenStage::Completed => "completed",
            KitchenStage::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn transition_graph_matches_the_workflow() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Paying));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Served));

        assert!(Paying.can_transition_to(Paid));
        assert!(Paying.can_transition_to(Pending));
        assert!(Paying.can_transition_to(Cancelled));
        assert!(!Paying.can_transition_to(Refunded));

        assert!(Paid.can_transition_to(Served));
        assert!(Paid.can_transition_to(Refunded));
        assert!(!Paid.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        use OrderStatus::*;
        for terminal in [Served, Cancelled, Refunded] {
            assert!(terminal.is_terminal());
            for target in [Pending, Paying, Paid, Served, Cancelled, Refunded] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn canonical_tokens_round_trip() {
        use OrderStatus::*;
        for status in [Pending, Paying, Paid, Served, Cancelled, Refunded] {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::from_str("preparing").is_err());
    }

    #[test]
    fn kitchen_stage_mapping_is_total_and_lossy() {
        use OrderStatus::*;
        assert_eq!(Pending.kitchen_stage(), KitchenStage::Pending);
        assert_eq!(Paying.kitchen_stage(), KitchenStage::Pending);
        assert_eq!(Paid.kitchen_stage(), KitchenStage::Preparing);
        assert_eq!(Served.kitchen_stage(), KitchenStage::Completed);
        assert_eq!(Cancelled.kitchen_stage(), KitchenStage::Cancelled);
        assert_eq!(Refunded.kitchen_stage(), KitchenStage::Cancelled);
    }
}
