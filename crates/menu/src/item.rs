use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comanda_core::{
    Aggregate, AggregateId, AggregateRoot, CurrencyCode, DomainError, RestaurantId, TaxRate,
};
use comanda_events::Event;

/// Menu item identifier (restaurant-scoped via `restaurant_id` fields in
/// events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuItemId(pub AggregateId);

impl MenuItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MenuItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Whether availability is tracked through the stock ledger.
///
/// `Finite` items are checked and debited at checkout; `Infinite` items are
/// always assumed available and never consult the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockMode {
    Finite,
    Infinite,
}

/// Aggregate root: MenuItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    id: MenuItemId,
    restaurant_id: Option<RestaurantId>,
    name: String,
    unit_price_minor: i64,
    tax_rate: TaxRate,
    currency: Option<CurrencyCode>,
    stock_mode: StockMode,
    retired: bool,
    version: u64,
    created: bool,
}

impl MenuItem {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: MenuItemId) -> Self {
        Self {
            id,
            restaurant_id: None,
            name: String::new(),
            unit_price_minor: 0,
            tax_rate: TaxRate::ZERO,
            currency: None,
            stock_mode: StockMode::Infinite,
            retired: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> MenuItemId {
        self.id
    }

    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.restaurant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price_minor(&self) -> i64 {
        self.unit_price_minor
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn currency(&self) -> Option<&CurrencyCode> {
        self.currency.as_ref()
    }

    pub fn stock_mode(&self) -> StockMode {
        self.stock_mode
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    /// Check whether the item can appear on a new order.
    pub fn can_be_ordered(&self) -> bool {
        self.created && !self.retired
    }
}

impl AggregateRoot for MenuItem {
    type Id = MenuItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub name: String,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
    pub currency: CurrencyCode,
    pub stock_mode: StockMode,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RepriceItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepriceItem {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RetireItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireItem {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuItemCommand {
    RegisterItem(RegisterItem),
    RepriceItem(RepriceItem),
    RetireItem(RetireItem),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub name: String,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
    pub currency: CurrencyCode,
    pub stock_mode: StockMode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRepriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRepriced {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRetired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRetired {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuItemEvent {
    ItemRegistered(ItemRegistered),
    ItemRepriced(ItemRepriced),
    ItemRetired(ItemRetired),
}

impl Event for MenuItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MenuItemEvent::ItemRegistered(_) => "menu.item.registered",
            MenuItemEvent::ItemRepriced(_) => "menu.item.repriced",
            MenuItemEvent::ItemRetired(_) => "menu.item.retired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MenuItemEvent::ItemRegistered(e) => e.occurred_at,
            MenuItemEvent::ItemRepriced(e) => e.occurred_at,
            MenuItemEvent::ItemRetired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for MenuItem {
    type Command = MenuItemCommand;
    type Event = MenuItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MenuItemEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.restaurant_id = Some(e.restaurant_id);
                self.name = e.name.clone();
                self.unit_price_minor = e.unit_price_minor;
                self.tax_rate = e.tax_rate;
                self.currency = Some(e.currency.clone());
                self.stock_mode = e.stock_mode;
                self.retired = false;
                self.created = true;
            }
            MenuItemEvent::ItemRepriced(e) => {
                self.unit_price_minor = e.unit_price_minor;
                self.tax_rate = e.tax_rate;
            }
            MenuItemEvent::ItemRetired(_) => {
                self.retired = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MenuItemCommand::RegisterItem(cmd) => self.handle_register(cmd),
            MenuItemCommand::RepriceItem(cmd) => self.handle_reprice(cmd),
            MenuItemCommand::RetireItem(cmd) => self.handle_retire(cmd),
        }
    }
}

impl MenuItem {
    fn ensure_restaurant(&self, restaurant_id: RestaurantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.restaurant_id != Some(restaurant_id) {
            return Err(DomainError::invariant("restaurant mismatch"));
        }
        Ok(())
    }

    fn ensure_item_id(&self, item_id: MenuItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<MenuItemEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("menu item already registered"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.unit_price_minor <= 0 {
            return Err(DomainError::validation("unit price must be positive"));
        }

        Ok(vec![MenuItemEvent::ItemRegistered(ItemRegistered {
            restaurant_id: cmd.restaurant_id,
            item_id: cmd.item_id,
            name: cmd.name.clone(),
            unit_price_minor: cmd.unit_price_minor,
            tax_rate: cmd.tax_rate,
            currency: cmd.currency.clone(),
            stock_mode: cmd.stock_mode,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reprice(&self, cmd: &RepriceItem) -> Result<Vec<MenuItemEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_restaurant(cmd.restaurant_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if self.retired {
            return Err(DomainError::invariant("cannot reprice a retired item"));
        }
        if cmd.unit_price_minor <= 0 {
            return Err(DomainError::validation("unit price must be positive"));
        }

        Ok(vec![MenuItemEvent::ItemRepriced(ItemRepriced {
            restaurant_id: cmd.restaurant_id,
            item_id: cmd.item_id,
            unit_price_minor: cmd.unit_price_minor,
            tax_rate: cmd.tax_rate,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_retire(&self, cmd: &RetireItem) -> Result<Vec<MenuItemEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_restaurant(cmd.restaurant_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if self.retired {
            return Err(DomainError::conflict("item already retired"));
        }

        Ok(vec![MenuItemEvent::ItemRetired(ItemRetired {
            restaurant_id: cmd.restaurant_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comanda_core::AggregateId;

    fn test_restaurant_id() -> RestaurantId {
        RestaurantId::new()
    }

    fn test_item_id() -> MenuItemId {
        MenuItemId::new(AggregateId::new())
    }

    fn register_cmd(restaurant_id: RestaurantId, item_id: MenuItemId) -> RegisterItem {
        RegisterItem {
            restaurant_id,
            item_id,
            name: "Margherita".to_string(),
            unit_price_minor: 1050,
            tax_rate: TaxRate::from_percent(10).unwrap(),
            currency: CurrencyCode::new("EUR").unwrap(),
            stock_mode: StockMode::Finite,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn register_emits_item_registered() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let item = MenuItem::empty(item_id);

        let events = item
            .handle(&MenuItemCommand::RegisterItem(register_cmd(
                restaurant_id,
                item_id,
            )))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            MenuItemEvent::ItemRegistered(e) => {
                assert_eq!(e.restaurant_id, restaurant_id);
                assert_eq!(e.item_id, item_id);
                assert_eq!(e.unit_price_minor, 1050);
                assert_eq!(e.stock_mode, StockMode::Finite);
            }
            _ => panic!("Expected ItemRegistered event"),
        }
    }

    #[test]
    fn register_rejects_invalid_input() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let item = MenuItem::empty(item_id);

        let mut cmd = register_cmd(restaurant_id, item_id);
        cmd.name = "   ".to_string();
        assert!(matches!(
            item.handle(&MenuItemCommand::RegisterItem(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = register_cmd(restaurant_id, item_id);
        cmd.unit_price_minor = 0;
        assert!(matches!(
            item.handle(&MenuItemCommand::RegisterItem(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn retired_item_cannot_be_ordered_or_repriced() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let mut item = MenuItem::empty(item_id);

        let events = item
            .handle(&MenuItemCommand::RegisterItem(register_cmd(
                restaurant_id,
                item_id,
            )))
            .unwrap();
        item.apply(&events[0]);
        assert!(item.can_be_ordered());

        let events = item
            .handle(&MenuItemCommand::RetireItem(RetireItem {
                restaurant_id,
                item_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        item.apply(&events[0]);
        assert!(!item.can_be_ordered());

        let err = item
            .handle(&MenuItemCommand::RepriceItem(RepriceItem {
                restaurant_id,
                item_id,
                unit_price_minor: 1200,
                tax_rate: TaxRate::ZERO,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn reprice_updates_price_and_rate() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let mut item = MenuItem::empty(item_id);

        let events = item
            .handle(&MenuItemCommand::RegisterItem(register_cmd(
                restaurant_id,
                item_id,
            )))
            .unwrap();
        item.apply(&events[0]);

        let events = item
            .handle(&MenuItemCommand::RepriceItem(RepriceItem {
                restaurant_id,
                item_id,
                unit_price_minor: 1200,
                tax_rate: TaxRate::from_percent(20).unwrap(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        item.apply(&events[0]);

        assert_eq!(item.unit_price_minor(), 1200);
        assert_eq!(item.tax_rate(), TaxRate::from_percent(20).unwrap());
        assert_eq!(item.version(), 2);
    }
}
