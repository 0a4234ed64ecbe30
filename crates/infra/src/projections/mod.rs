//! Read model projections (disposable, rebuildable from the event streams).

pub mod menu_catalog;
pub mod order_board;
pub mod stock_levels;

pub use menu_catalog::{MenuCatalogProjection, MenuItemRow};
pub use order_board::{OrderBoardProjection, OrderBoardRow};
pub use stock_levels::{StockLevelRow, StockLevelsProjection};
