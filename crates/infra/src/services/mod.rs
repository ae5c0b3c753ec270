//! Ledger services: the public operations hosts call.
//!
//! Every mutating operation goes through [`UnitRunner`], which runs one store
//! unit of work with conflict retries and reports integrity violations.

use tracing::error;

use stockroom_core::{ItemId, TenantId, UserId};
use stockroom_inventory::{NegativeStockPolicy, StockCommand, StockError, User};

use crate::error::{InventoryError, StoreError};
use crate::retry::{RetryPolicy, retry_on_conflict};
use crate::store::SharedStore;
use crate::unit_of_work::{Changeset, OperationContext};

pub mod adjust;
pub mod ledger;
pub mod reconcile;
pub mod reservation;
pub mod threshold;
pub mod transfer;

pub use adjust::{AdjustOutcome, StockAdjuster};
pub use ledger::LedgerQueries;
pub use reconcile::{Drift, ReconcileFailure, ReconcileReport, Reconciler};
pub use reservation::{CommitOutcome, ReservationManager};
pub use threshold::ThresholdMonitor;
pub use transfer::TransferCoordinator;

#[derive(Clone)]
pub(crate) struct UnitRunner {
    store: SharedStore,
    retry: RetryPolicy,
    policy: NegativeStockPolicy,
}

impl UnitRunner {
    pub(crate) fn new(store: SharedStore, retry: RetryPolicy, policy: NegativeStockPolicy) -> Self {
        Self {
            store,
            retry,
            policy,
        }
    }

    pub(crate) fn store(&self) -> &SharedStore {
        &self.store
    }

    pub(crate) fn context(&self, tenant_id: TenantId) -> OperationContext {
        OperationContext::new(tenant_id, self.policy)
    }

    pub(crate) async fn run(
        &self,
        item_id: ItemId,
        command: StockCommand,
        ctx: OperationContext,
    ) -> Result<Changeset, InventoryError> {
        let store = &self.store;
        let command = &command;
        let ctx = &ctx;
        let result = retry_on_conflict(&self.retry, command.name(), move || {
            store.execute(item_id, command, ctx)
        })
        .await;

        match result {
            Ok(changes) => Ok(changes),
            Err(StoreError::Stock(StockError::IntegrityViolation(msg))) => {
                error!(
                    tenant_id = %ctx.tenant_id,
                    item_id = %item_id,
                    command = command.name(),
                    "integrity violation: {msg}"
                );
                Err(InventoryError::IntegrityViolation(msg))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Resolve `actor` and check it holds `admin_role`.
pub(crate) async fn require_role(
    store: &SharedStore,
    tenant_id: TenantId,
    actor: UserId,
    admin_role: &str,
) -> Result<User, InventoryError> {
    match store.get_user(tenant_id, actor).await? {
        Some(user) if user.role == admin_role => Ok(user),
        _ => Err(InventoryError::Unauthorized),
    }
}
