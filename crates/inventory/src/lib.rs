//! Stock ledger domain.
//!
//! Business rules for reservations, transfers, adjustments and stock alerts,
//! implemented as deterministic domain logic (no IO, no storage). The infra
//! crate loads an [`ItemStock`] under lock, runs a command through it and
//! persists the outcome.

pub mod error;
pub mod ledger;
pub mod model;
pub mod notification;
pub mod stock;
pub mod threshold;

pub use error::StockError;
pub use ledger::{
    EntryKind, LedgerEntry, TransferRecord, commit_reason, consolidation_reason, correction_reason, transfer_reason,
};
pub use model::{
    DEFAULT_CRITICAL_STOCK_THRESHOLD, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_UNIT, Item, Location, NewItem,
    NewLocation, StockLevel, User,
};
pub use notification::{Notification, NotificationKind};
pub use stock::{Adjustment, ItemStock, NegativeStockPolicy, StockCommand, StockEvent};
pub use threshold::StockAlert;
