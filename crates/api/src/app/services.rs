use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use comanda_cart::{Cart, CartStore, SessionToken};
use comanda_core::{ActorId, Aggregate, AggregateId, DomainError, RestaurantId};
use comanda_events::{EventBus, EventEnvelope, InMemoryEventBus};
use comanda_infra::{
    cart_sessions::InMemoryCartStore,
    checkout::{CheckoutError, CheckoutRequest, OrderCoordinator},
    command_dispatcher::{CommandDispatcher, DispatchError},
    directory::{InMemoryTableDirectory, TableBinding},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        MenuCatalogProjection, MenuItemRow, OrderBoardProjection, OrderBoardRow, StockLevelRow,
        StockLevelsProjection,
    },
    read_model::InMemoryRestaurantStore,
    streams,
};
use comanda_menu::MenuItemId;
use comanda_orders::{Order, OrderId};

/// Realtime message broadcast to SSE subscribers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub restaurant_id: RestaurantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;
type Coordinator = OrderCoordinator<Arc<InMemoryEventStore>, Arc<Bus>, Arc<InMemoryTableDirectory>>;
type MenuProjection = MenuCatalogProjection<Arc<InMemoryRestaurantStore<MenuItemId, MenuItemRow>>>;
type StockProjection = StockLevelsProjection<Arc<InMemoryRestaurantStore<MenuItemId, StockLevelRow>>>;
type BoardProjection = OrderBoardProjection<Arc<InMemoryRestaurantStore<OrderId, OrderBoardRow>>>;

/// Wired application services (in-memory backend).
///
/// Persistent backends slot in behind the same `EventStore`/`EventBus`
/// seams without touching handlers.
pub struct AppServices {
    dispatcher: Dispatcher,
    coordinator: Coordinator,
    tables: Arc<InMemoryTableDirectory>,
    carts: Arc<InMemoryCartStore>,
    menu_projection: Arc<MenuProjection>,
    stock_projection: Arc<StockProjection>,
    board_projection: Arc<BoardProjection>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

pub fn build_services() -> AppServices {
    // In-memory infra wiring: store + bus + projections.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());

    let menu_store: Arc<InMemoryRestaurantStore<MenuItemId, MenuItemRow>> =
        Arc::new(InMemoryRestaurantStore::new());
    let menu_projection: Arc<MenuProjection> = Arc::new(MenuCatalogProjection::new(menu_store));

    let stock_store: Arc<InMemoryRestaurantStore<MenuItemId, StockLevelRow>> =
        Arc::new(InMemoryRestaurantStore::new());
    let stock_projection: Arc<StockProjection> = Arc::new(StockLevelsProjection::new(stock_store));

    let board_store: Arc<InMemoryRestaurantStore<OrderId, OrderBoardRow>> =
        Arc::new(InMemoryRestaurantStore::new());
    let board_projection: Arc<BoardProjection> = Arc::new(OrderBoardProjection::new(board_store));

    // Realtime channel (SSE): lossy broadcast, restaurant-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> projections -> realtime broadcast.
    {
        let sub = bus.subscribe();
        let menu_projection = menu_projection.clone();
        let stock_projection = stock_projection.clone();
        let board_projection = board_projection.clone();
        let realtime_tx = realtime_tx.clone();
        std::thread::spawn(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        let at = env.aggregate_type().to_string();

                        let apply_ok = match at.as_str() {
                            streams::MENU_ITEM => {
                                menu_projection.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            streams::STOCK_LEDGER => {
                                stock_projection.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            streams::ORDER => {
                                board_projection.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            _ => Ok(()),
                        };

                        if let Err(e) = apply_ok {
                            tracing::warn!("projection apply failed: {e}");
                            continue;
                        }

                        // Broadcast the update (lossy; no backpressure on core).
                        let _ = realtime_tx.send(RealtimeMessage {
                            restaurant_id: env.restaurant_id(),
                            topic: format!("{at}.updated"),
                            payload: serde_json::json!({
                                "kind": "projection_update",
                                "aggregate_type": at,
                                "aggregate_id": env.aggregate_id().to_string(),
                                "sequence_number": env.sequence_number(),
                            }),
                        });
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let tables = Arc::new(InMemoryTableDirectory::new());
    let carts = Arc::new(InMemoryCartStore::new());
    let dispatcher = CommandDispatcher::new(store.clone(), bus.clone());
    let coordinator = OrderCoordinator::new(store, bus, tables.clone());

    AppServices {
        dispatcher,
        coordinator,
        tables,
        carts,
        menu_projection,
        stock_projection,
        board_projection,
        realtime_tx,
    }
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn dispatch<A>(
        &self,
        restaurant_id: RestaurantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(RestaurantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: comanda_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher.dispatch::<A>(
            restaurant_id,
            aggregate_id,
            aggregate_type,
            command,
            make_aggregate,
        )
    }

    pub fn place_order(
        &self,
        restaurant_id: RestaurantId,
        actor: Option<ActorId>,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        self.coordinator.place_order(restaurant_id, actor, request)
    }

    /// Authoritative stock read: `Some(balance)` for finite items, `None`
    /// for infinite ones.
    pub fn current_stock(
        &self,
        restaurant_id: RestaurantId,
        item_id: MenuItemId,
    ) -> Result<Option<i64>, CheckoutError> {
        self.coordinator.current_stock(restaurant_id, item_id)
    }

    pub fn menu_get(&self, restaurant_id: RestaurantId, item_id: &MenuItemId) -> Option<MenuItemRow> {
        self.menu_projection.get(restaurant_id, item_id)
    }

    pub fn menu_list(&self, restaurant_id: RestaurantId) -> Vec<MenuItemRow> {
        self.menu_projection.list(restaurant_id)
    }

    pub fn stock_level(
        &self,
        restaurant_id: RestaurantId,
        item_id: &MenuItemId,
    ) -> Option<StockLevelRow> {
        self.stock_projection.get(restaurant_id, item_id)
    }

    pub fn board_get(&self, restaurant_id: RestaurantId, order_id: &OrderId) -> Option<OrderBoardRow> {
        self.board_projection.get(restaurant_id, order_id)
    }

    pub fn board_list(&self, restaurant_id: RestaurantId) -> Vec<OrderBoardRow> {
        self.board_projection.list(restaurant_id)
    }

    pub fn register_table(&self, binding: TableBinding) {
        self.tables.register(binding);
    }

    pub fn list_tables(&self, restaurant_id: RestaurantId) -> Vec<TableBinding> {
        self.tables.list(restaurant_id)
    }

    pub fn cart_load(&self, token: &SessionToken) -> Option<Cart> {
        self.carts.load(token)
    }

    pub fn cart_save(&self, token: SessionToken, cart: Cart) {
        self.carts.save(token, cart);
    }

    pub fn cart_remove(&self, token: &SessionToken) {
        self.carts.remove(token);
    }
}

/// Build an SSE stream for a restaurant (used by `/stream`).
pub fn restaurant_sse_stream(
    services: Arc<AppServices>,
    restaurant_id: RestaurantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.restaurant_id == restaurant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
