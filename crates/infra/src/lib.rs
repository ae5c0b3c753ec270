//! Infrastructure layer: stores, services, configuration and notification
//! delivery for the stock ledger.

pub mod config;
pub mod error;
pub mod ledger;
pub mod notifier;
pub mod retry;
pub mod services;
pub mod stockroom;
pub mod store;
pub mod unit_of_work;

pub use config::{ConfigError, InventoryConfig};
pub use error::{InventoryError, StoreError};
pub use ledger::{
    ActivityRow, ActivitySummary, LedgerFilter, LedgerRow, Page, Pagination, StockTotals, WarehouseStats,
};
pub use notifier::{LogNotifier, Notifier, NotifyError, RecordingNotifier};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use services::{
    AdjustOutcome, CommitOutcome, Drift, LedgerQueries, ReconcileFailure, ReconcileReport, Reconciler,
    ReservationManager, StockAdjuster, ThresholdMonitor, TransferCoordinator,
};
pub use stockroom::Stockroom;
pub use store::{InMemoryStockStore, PostgresStockStore, SharedStore, StockStore};
pub use unit_of_work::{Changeset, OperationContext};
