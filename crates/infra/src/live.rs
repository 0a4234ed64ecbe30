//! Live view synchronizer for staff order boards.
//!
//! Strategy: on any order change notification for the scoped restaurant,
//! re-fetch the **full** board and push it to the sink — no incremental
//! patching. A fixed-interval poll performs the same refresh as a redundancy
//! backstop, so correctness never depends on the push channel: dropped or
//! reordered notifications only delay convergence until the next poll tick.
//! Both seams (`BoardSource`, `BoardSink`) hide the refetch-everything
//! strategy so incremental diffing could replace it without touching callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::Value as JsonValue;

use comanda_core::RestaurantId;
use comanda_events::{EventBus, EventEnvelope};
use comanda_orders::OrderId;

use crate::projections::order_board::{OrderBoardProjection, OrderBoardRow};
use crate::read_model::RestaurantStore;
use crate::streams;

/// Where refreshed boards come from (typically the order board projection).
pub trait BoardSource: Send + Sync {
    fn orders(&self, restaurant_id: RestaurantId) -> Vec<OrderBoardRow>;
}

impl<T> BoardSource for Arc<T>
where
    T: BoardSource + ?Sized,
{
    fn orders(&self, restaurant_id: RestaurantId) -> Vec<OrderBoardRow> {
        (**self).orders(restaurant_id)
    }
}

impl<S> BoardSource for OrderBoardProjection<S>
where
    S: RestaurantStore<OrderId, OrderBoardRow>,
{
    fn orders(&self, restaurant_id: RestaurantId) -> Vec<OrderBoardRow> {
        self.list(restaurant_id)
    }
}

/// Where refreshed boards go (a websocket fan-out, a terminal, a test probe).
///
/// Fire-and-forget: a slow consumer may miss intermediate states and
/// converges on the next refresh.
pub trait BoardSink: Send + Sync {
    fn render(&self, restaurant_id: RestaurantId, orders: &[OrderBoardRow]);
}

impl<T> BoardSink for Arc<T>
where
    T: BoardSink + ?Sized,
{
    fn render(&self, restaurant_id: RestaurantId, orders: &[OrderBoardRow]) {
        (**self).render(restaurant_id, orders)
    }
}

/// Synchronizer tuning.
#[derive(Debug, Clone)]
pub struct LiveBoardConfig {
    /// Poll fallback interval (also the shutdown latency bound).
    pub poll_interval: Duration,
}

impl Default for LiveBoardConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// A running live board synchronizer.
///
/// Owns a background thread that consumes bus notifications for one
/// restaurant's orders. `stop()` is the only cancellation: it requests
/// shutdown and the thread winds down on its next wakeup (message, poll
/// tick or disconnect) rather than being joined, so stopping never blocks
/// the caller for a poll interval.
#[derive(Debug)]
pub struct LiveBoard {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl LiveBoard {
    /// Spawn the synchronizer thread.
    ///
    /// The loop interleaves three refresh triggers:
    /// - a scoped order envelope arrives (push)
    /// - `recv_timeout` expires (poll backstop)
    /// - the subscription drops (re-subscribe, then refresh to catch up)
    pub fn spawn<B, S, K>(
        bus: B,
        source: S,
        sink: K,
        restaurant_id: RestaurantId,
        config: LiveBoardConfig,
    ) -> Self
    where
        B: EventBus<EventEnvelope<JsonValue>> + Send + Sync + 'static,
        S: BoardSource + 'static,
        K: BoardSink + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let join = std::thread::spawn(move || {
            let mut subscription = bus.subscribe();

            // Initial paint so a console attached mid-stream starts current.
            sink.render(restaurant_id, &source.orders(restaurant_id));

            while !stop_flag.load(Ordering::Relaxed) {
                match subscription.recv_timeout(config.poll_interval) {
                    Ok(envelope) => {
                        if envelope.restaurant_id() == restaurant_id
                            && envelope.aggregate_type() == streams::ORDER
                        {
                            sink.render(restaurant_id, &source.orders(restaurant_id));
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        // Poll backstop: refresh even if no push arrived.
                        sink.render(restaurant_id, &source.orders(restaurant_id));
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        // Subscription loss: re-subscribe and refresh; events
                        // published in the gap are covered by the refetch.
                        tracing::warn!("order board subscription lost; re-subscribing");
                        subscription = bus.subscribe();
                        sink.render(restaurant_id, &source.orders(restaurant_id));
                    }
                }
            }
        });

        Self {
            stop,
            join: Some(join),
        }
    }

    /// Request shutdown; the thread exits by its next wakeup.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Detach rather than join: the thread may be parked in recv_timeout
        // for up to a poll interval.
        self.join.take();
    }
}

impl Drop for LiveBoard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use comanda_core::{AggregateId, CurrencyCode, TaxRate};
    use comanda_events::InMemoryEventBus;
    use comanda_menu::MenuItemId;
    use comanda_orders::{KitchenStage, OrderStatus, TableId, pricing};

    use crate::read_model::InMemoryRestaurantStore;

    #[derive(Debug, Default)]
    struct RecordingSink {
        renders: Mutex<Vec<usize>>,
    }

    impl BoardSink for RecordingSink {
        fn render(&self, _restaurant_id: RestaurantId, orders: &[OrderBoardRow]) {
            self.renders.lock().unwrap().push(orders.len());
        }
    }

    fn board_row(order_id: OrderId) -> OrderBoardRow {
        let line = pricing::price_line(
            MenuItemId::new(AggregateId::new()),
            "Espresso",
            250,
            TaxRate::ZERO,
            1,
        );
        OrderBoardRow {
            order_id,
            table_id: TableId::new(AggregateId::new()),
            status: OrderStatus::Pending,
            kitchen_stage: KitchenStage::Pending,
            currency: CurrencyCode::new("EUR").unwrap(),
            net_minor: line.net_minor,
            tax_minor: line.tax_minor,
            gross_minor: line.line_total_minor,
            lines: vec![line],
            notes: None,
            placed_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn wait_until(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..deadline_ms / 5 {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    #[test]
    fn refreshes_on_scoped_order_notifications() {
        let restaurant_id = RestaurantId::new();
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let store: Arc<InMemoryRestaurantStore<OrderId, OrderBoardRow>> =
            Arc::new(InMemoryRestaurantStore::new());
        let projection = Arc::new(OrderBoardProjection::new(store.clone()));
        let sink = Arc::new(RecordingSink::default());

        let board = LiveBoard::spawn(
            bus.clone(),
            projection.clone(),
            sink.clone(),
            restaurant_id,
            LiveBoardConfig {
                poll_interval: Duration::from_secs(30),
            },
        );

        assert!(wait_until(500, || !sink.renders.lock().unwrap().is_empty()));
        let renders_before = sink.renders.lock().unwrap().len();

        // Simulate the projection catching up, then the change notification.
        let order_id = OrderId::new(AggregateId::new());
        store.upsert(restaurant_id, order_id, board_row(order_id));
        bus.publish(EventEnvelope::new(
            uuid::Uuid::now_v7(),
            restaurant_id,
            order_id.0,
            streams::ORDER,
            1,
            serde_json::json!({}),
        ))
        .unwrap();

        assert!(wait_until(500, || {
            let renders = sink.renders.lock().unwrap();
            renders.len() > renders_before && renders.last() == Some(&1)
        }));

        // Foreign-restaurant notifications must not trigger a refresh.
        let renders_before = sink.renders.lock().unwrap().len();
        bus.publish(EventEnvelope::new(
            uuid::Uuid::now_v7(),
            RestaurantId::new(),
            AggregateId::new(),
            streams::ORDER,
            1,
            serde_json::json!({}),
        ))
        .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sink.renders.lock().unwrap().len(), renders_before);

        board.stop();
    }

    #[test]
    fn poll_fallback_converges_without_push() {
        let restaurant_id = RestaurantId::new();
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let store: Arc<InMemoryRestaurantStore<OrderId, OrderBoardRow>> =
            Arc::new(InMemoryRestaurantStore::new());
        let projection = Arc::new(OrderBoardProjection::new(store.clone()));
        let sink = Arc::new(RecordingSink::default());

        let board = LiveBoard::spawn(
            bus.clone(),
            projection.clone(),
            sink.clone(),
            restaurant_id,
            LiveBoardConfig {
                poll_interval: Duration::from_millis(10),
            },
        );

        // Mutate the read model silently: no publish at all.
        let order_id = OrderId::new(AggregateId::new());
        store.upsert(restaurant_id, order_id, board_row(order_id));

        // The poll backstop alone must surface the new order.
        assert!(wait_until(500, || {
            sink.renders.lock().unwrap().last() == Some(&1)
        }));

        board.stop();
    }
}
