//! Table registry seam.
//!
//! Table/location CRUD belongs to an external collaborator; checkout only
//! needs to resolve `table → location → restaurant` and to know whether the
//! table is active. The trait is that resolution contract; the in-memory
//! implementation backs dev and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use comanda_core::RestaurantId;
use comanda_orders::{LocationId, TableId};

/// A table's resolved placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    pub table_id: TableId,
    pub location_id: LocationId,
    pub restaurant_id: RestaurantId,
    pub label: String,
    pub active: bool,
}

/// Resolves a table reference to its owning location and restaurant.
pub trait TableDirectory: Send + Sync {
    fn resolve(&self, table_id: TableId) -> Option<TableBinding>;
}

impl<T> TableDirectory for Arc<T>
where
    T: TableDirectory + ?Sized,
{
    fn resolve(&self, table_id: TableId) -> Option<TableBinding> {
        (**self).resolve(table_id)
    }
}

/// In-memory table directory for dev/tests.
#[derive(Debug, Default)]
pub struct InMemoryTableDirectory {
    inner: RwLock<HashMap<TableId, TableBinding>>,
}

impl InMemoryTableDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, binding: TableBinding) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(binding.table_id, binding);
        }
    }

    pub fn set_active(&self, table_id: TableId, active: bool) {
        if let Ok(mut map) = self.inner.write() {
            if let Some(binding) = map.get_mut(&table_id) {
                binding.active = active;
            }
        }
    }

    pub fn list(&self, restaurant_id: RestaurantId) -> Vec<TableBinding> {
        match self.inner.read() {
            Ok(map) => map
                .values()
                .filter(|b| b.restaurant_id == restaurant_id)
                .cloned()
                .collect(),
            Err(_) => vec![],
        }
    }
}

impl TableDirectory for InMemoryTableDirectory {
    fn resolve(&self, table_id: TableId) -> Option<TableBinding> {
        self.inner.read().ok()?.get(&table_id).cloned()
    }
}
