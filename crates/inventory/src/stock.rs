//! Item stock aggregate: one item together with its per-location rows.
//!
//! Stores load this aggregate with the item row and its stock rows locked,
//! run a command through `handle`/`apply`, and persist the resulting state.
//! Decisions here are pure and deterministic; nothing is written when
//! `handle` returns an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateRoot, ItemId, LocationId, ensure_positive};

use crate::error::StockError;
use crate::model::Item;

/// Whether consuming operations may overdraw a stock row.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeStockPolicy {
    /// Refuse any commit or out-adjustment that would overdraw a row.
    #[default]
    Reject,
    /// Let the row and item total go negative; the threshold monitor alerts.
    Allow,
}

impl NegativeStockPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(NegativeStockPolicy::Reject),
            "allow" => Some(NegativeStockPolicy::Allow),
            _ => None,
        }
    }
}

/// Manual stock adjustment at one location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    /// Receive `n` units.
    In(i64),
    /// Write off `n` units.
    Out(i64),
    /// Correct the row to exactly `n` units.
    Set(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    Reserve { amount: i64 },
    Release { amount: i64 },
    Commit { location_id: LocationId, amount: i64 },
    Transfer { from: LocationId, to: LocationId, amount: i64 },
    Adjust { location_id: LocationId, adjustment: Adjustment },
    /// Move every other positive row of the item into `to`.
    Consolidate { to: LocationId },
    /// Rewrite the item total from its stock rows.
    Reconcile,
}

impl StockCommand {
    /// Locations the command refers to; each must exist for the command to run.
    pub fn locations(&self) -> Vec<LocationId> {
        match self {
            StockCommand::Commit { location_id, .. } | StockCommand::Adjust { location_id, .. } => {
                vec![*location_id]
            }
            StockCommand::Transfer { from, to, .. } => vec![*from, *to],
            StockCommand::Consolidate { to } => vec![*to],
            StockCommand::Reserve { .. } | StockCommand::Release { .. } | StockCommand::Reconcile => {
                vec![]
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StockCommand::Reserve { .. } => "reserve",
            StockCommand::Release { .. } => "release",
            StockCommand::Commit { .. } => "commit",
            StockCommand::Transfer { .. } => "transfer",
            StockCommand::Adjust { .. } => "adjust",
            StockCommand::Consolidate { .. } => "consolidate",
            StockCommand::Reconcile => "reconcile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    Reserved {
        amount: i64,
    },
    /// `amount` is what was actually removed from the reservation.
    Released {
        amount: i64,
    },
    Committed {
        location_id: LocationId,
        amount: i64,
        released: i64,
    },
    Transferred {
        from: LocationId,
        to: LocationId,
        amount: i64,
    },
    Adjusted {
        location_id: LocationId,
        delta: i64,
        correction: bool,
    },
    /// Totals rewritten from the stock rows. `reserved` is the reservation
    /// after it was brought back within the corrected quantity.
    Reconciled {
        recorded: i64,
        actual: i64,
        reserved_recorded: i64,
        reserved: i64,
    },
}

impl StockEvent {
    /// True for events that change the item's physical total.
    pub fn changes_quantity(&self) -> bool {
        matches!(
            self,
            StockEvent::Committed { .. } | StockEvent::Adjusted { .. } | StockEvent::Reconciled { .. }
        )
    }

    /// Stock rows written when this event is persisted.
    pub fn touched_locations(&self) -> Vec<LocationId> {
        match self {
            StockEvent::Committed { location_id, .. } | StockEvent::Adjusted { location_id, .. } => {
                vec![*location_id]
            }
            StockEvent::Transferred { from, to, .. } => vec![*from, *to],
            StockEvent::Reserved { .. } | StockEvent::Released { .. } | StockEvent::Reconciled { .. } => {
                vec![]
            }
        }
    }
}

/// Aggregate root: one item and the rows that hold its stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStock {
    item: Item,
    levels: BTreeMap<LocationId, i64>,
    policy: NegativeStockPolicy,
    version: u64,
}

impl ItemStock {
    pub fn load(
        item: Item,
        levels: impl IntoIterator<Item = (LocationId, i64)>,
        policy: NegativeStockPolicy,
    ) -> Self {
        Self {
            item,
            levels: levels.into_iter().collect(),
            policy,
            version: 0,
        }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn item_mut(&mut self) -> &mut Item {
        &mut self.item
    }

    /// Quantity held at `location_id`; zero when there is no row.
    pub fn level(&self, location_id: LocationId) -> i64 {
        self.levels.get(&location_id).copied().unwrap_or(0)
    }

    pub fn has_row(&self, location_id: LocationId) -> bool {
        self.levels.contains_key(&location_id)
    }

    /// Sum of the stock rows; `None` when it does not fit in an `i64`.
    pub fn total_stock(&self) -> Option<i64> {
        self.levels
            .values()
            .try_fold(0i64, |total, quantity| total.checked_add(*quantity))
    }

    pub fn into_parts(self) -> (Item, BTreeMap<LocationId, i64>) {
        (self.item, self.levels)
    }

    /// Check the invariants that must hold between operations.
    ///
    /// Under [`NegativeStockPolicy::Allow`] an overdrawn item may carry a
    /// reservation larger than its quantity; the threshold monitor reports it.
    pub fn verify(&self) -> Result<(), StockError> {
        let item = &self.item;
        if item.reserved_quantity < 0 {
            return Err(StockError::IntegrityViolation(format!(
                "item {} has negative reserved quantity {}",
                item.id, item.reserved_quantity
            )));
        }
        if !self.levels.is_empty() {
            let total = self.total_stock().ok_or_else(|| {
                StockError::IntegrityViolation(format!("item {} stock rows total overflows", item.id))
            })?;
            if total != item.quantity {
                return Err(StockError::IntegrityViolation(format!(
                    "item {} quantity {} differs from stock rows total {total}",
                    item.id, item.quantity
                )));
            }
        }
        if self.policy == NegativeStockPolicy::Reject && item.reserved_quantity > item.quantity {
            return Err(StockError::IntegrityViolation(format!(
                "item {} reserved quantity {} exceeds quantity {}",
                item.id, item.reserved_quantity, item.quantity
            )));
        }
        if self.policy == NegativeStockPolicy::Reject {
            if let Some((location_id, qty)) = self.levels.iter().find(|(_, q)| **q < 0) {
                return Err(StockError::IntegrityViolation(format!(
                    "item {} has negative stock {qty} at location {location_id}",
                    item.id
                )));
            }
        }
        Ok(())
    }

    fn handle_reserve(&self, amount: i64) -> Result<Vec<StockEvent>, StockError> {
        ensure_positive("amount", amount)?;
        let available = self.item.available();
        if available < amount {
            return Err(StockError::insufficient(amount, available.max(0)));
        }
        self.item
            .reserved_quantity
            .checked_add(amount)
            .ok_or_else(|| out_of_range("reserved quantity"))?;
        Ok(vec![StockEvent::Reserved { amount }])
    }

    fn handle_release(&self, amount: i64) -> Result<Vec<StockEvent>, StockError> {
        ensure_positive("amount", amount)?;
        // Over-release floors at zero instead of failing.
        let released = amount.min(self.item.reserved_quantity.max(0));
        Ok(vec![StockEvent::Released { amount: released }])
    }

    fn handle_commit(&self, location_id: LocationId, amount: i64) -> Result<Vec<StockEvent>, StockError> {
        ensure_positive("amount", amount)?;
        let row = self.level(location_id);
        if self.policy == NegativeStockPolicy::Reject && row < amount {
            return Err(StockError::insufficient(amount, row.max(0)));
        }
        row.checked_sub(amount).ok_or_else(|| out_of_range("stock row"))?;
        self.item
            .quantity
            .checked_sub(amount)
            .ok_or_else(|| out_of_range("item quantity"))?;
        let released = amount.min(self.item.reserved_quantity.max(0));
        Ok(vec![StockEvent::Committed {
            location_id,
            amount,
            released,
        }])
    }

    fn handle_transfer(
        &self,
        from: LocationId,
        to: LocationId,
        amount: i64,
    ) -> Result<Vec<StockEvent>, StockError> {
        if from == to {
            return Err(StockError::InvalidLocation(
                "source and destination must differ".to_string(),
            ));
        }
        ensure_positive("amount", amount)?;
        let row = self.level(from);
        if !self.has_row(from) || row < amount {
            return Err(StockError::insufficient(amount, row.max(0)));
        }
        self.level(to)
            .checked_add(amount)
            .ok_or_else(|| out_of_range("destination stock row"))?;
        Ok(vec![StockEvent::Transferred { from, to, amount }])
    }

    fn handle_adjust(
        &self,
        location_id: LocationId,
        adjustment: Adjustment,
    ) -> Result<Vec<StockEvent>, StockError> {
        let row = self.level(location_id);
        let delta = match adjustment {
            Adjustment::In(n) => {
                ensure_positive("amount", n)?;
                n
            }
            Adjustment::Out(n) => {
                ensure_positive("amount", n)?;
                -n
            }
            Adjustment::Set(n) => {
                if n < 0 {
                    return Err(StockError::Validation(format!(
                        "target quantity cannot be negative (got {n})"
                    )));
                }
                n.checked_sub(row).ok_or_else(|| out_of_range("adjustment"))?
            }
        };

        if delta == 0 {
            return Ok(vec![]);
        }

        row.checked_add(delta).ok_or_else(|| out_of_range("stock row"))?;
        self.item
            .quantity
            .checked_add(delta)
            .ok_or_else(|| out_of_range("item quantity"))?;

        if delta < 0 && self.policy == NegativeStockPolicy::Reject {
            let requested = -delta;
            if row < requested {
                return Err(StockError::insufficient(requested, row.max(0)));
            }
            let available = self.item.available();
            if available < requested {
                return Err(StockError::insufficient(requested, available.max(0)));
            }
        }

        Ok(vec![StockEvent::Adjusted {
            location_id,
            delta,
            correction: matches!(adjustment, Adjustment::Set(_)),
        }])
    }

    fn handle_consolidate(&self, to: LocationId) -> Result<Vec<StockEvent>, StockError> {
        let mut target = self.level(to);
        let mut events = Vec::new();
        for (&from, &quantity) in &self.levels {
            if from == to || quantity <= 0 {
                continue;
            }
            target = target
                .checked_add(quantity)
                .ok_or_else(|| out_of_range("destination stock row"))?;
            events.push(StockEvent::Transferred {
                from,
                to,
                amount: quantity,
            });
        }
        Ok(events)
    }

    fn handle_reconcile(&self) -> Result<Vec<StockEvent>, StockError> {
        let recorded = self.item.quantity;
        let actual = if self.levels.is_empty() {
            recorded
        } else {
            self.total_stock().ok_or_else(|| {
                StockError::IntegrityViolation(format!("item {} stock rows total overflows", self.item.id))
            })?
        };

        // Under Reject a reservation never exceeds what is on hand.
        let ceiling = match self.policy {
            NegativeStockPolicy::Reject => actual.max(0),
            NegativeStockPolicy::Allow => i64::MAX,
        };
        let reserved_recorded = self.item.reserved_quantity;
        let reserved = reserved_recorded.clamp(0, ceiling);

        if actual == recorded && reserved == reserved_recorded {
            return Ok(vec![]);
        }
        Ok(vec![StockEvent::Reconciled {
            recorded,
            actual,
            reserved_recorded,
            reserved,
        }])
    }
}

impl AggregateRoot for ItemStock {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.item.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for ItemStock {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = StockError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::Reserved { amount } => {
                self.item.reserved_quantity += amount;
            }
            StockEvent::Released { amount } => {
                self.item.reserved_quantity -= amount;
            }
            StockEvent::Committed {
                location_id,
                amount,
                released,
            } => {
                self.item.quantity -= amount;
                self.item.reserved_quantity -= released;
                *self.levels.entry(*location_id).or_insert(0) -= amount;
            }
            StockEvent::Transferred { from, to, amount } => {
                *self.levels.entry(*from).or_insert(0) -= amount;
                *self.levels.entry(*to).or_insert(0) += amount;
            }
            StockEvent::Adjusted {
                location_id, delta, ..
            } => {
                *self.levels.entry(*location_id).or_insert(0) += delta;
                self.item.quantity += delta;
            }
            StockEvent::Reconciled {
                actual, reserved, ..
            } => {
                self.item.quantity = *actual;
                self.item.reserved_quantity = *reserved;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::Reserve { amount } => self.handle_reserve(*amount),
            StockCommand::Release { amount } => self.handle_release(*amount),
            StockCommand::Commit {
                location_id,
                amount,
            } => self.handle_commit(*location_id, *amount),
            StockCommand::Transfer { from, to, amount } => self.handle_transfer(*from, *to, *amount),
            StockCommand::Adjust {
                location_id,
                adjustment,
            } => self.handle_adjust(*location_id, *adjustment),
            StockCommand::Consolidate { to } => self.handle_consolidate(*to),
            StockCommand::Reconcile => self.handle_reconcile(),
        }
    }
}

fn out_of_range(what: &str) -> StockError {
    StockError::Validation(format!("{what} would be out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewItem;
    use chrono::Utc;
    use proptest::prelude::*;
    use stockroom_core::TenantId;

    fn item(quantity: i64, reserved: i64) -> Item {
        let mut item = NewItem::named("T-Shirt")
            .into_item(TenantId::new(), Utc::now())
            .unwrap();
        item.quantity = quantity;
        item.reserved_quantity = reserved;
        item
    }

    fn stock_at(location: LocationId, quantity: i64, reserved: i64) -> ItemStock {
        ItemStock::load(
            item(quantity, reserved),
            [(location, quantity)],
            NegativeStockPolicy::Reject,
        )
    }

    #[test]
    fn reserve_within_available_increments_reserved() {
        let a = LocationId::new();
        let mut stock = stock_at(a, 50, 0);

        let events = stock.execute(&StockCommand::Reserve { amount: 5 }).unwrap();
        assert_eq!(events, vec![StockEvent::Reserved { amount: 5 }]);
        assert_eq!(stock.item().reserved_quantity, 5);
        assert_eq!(stock.item().quantity, 50);
        assert_eq!(stock.version(), 1);
    }

    #[test]
    fn over_reservation_reports_available_and_changes_nothing() {
        let a = LocationId::new();
        let mut stock = stock_at(a, 10, 4);
        let before = stock.clone();

        let err = stock.execute(&StockCommand::Reserve { amount: 7 }).unwrap_err();
        assert_eq!(err, StockError::insufficient(7, 6));
        assert_eq!(stock, before);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let a = LocationId::new();
        let stock = stock_at(a, 10, 0);
        for command in [
            StockCommand::Reserve { amount: 0 },
            StockCommand::Release { amount: -1 },
            StockCommand::Commit { location_id: a, amount: 0 },
            StockCommand::Transfer { from: a, to: LocationId::new(), amount: 0 },
            StockCommand::Adjust { location_id: a, adjustment: Adjustment::In(0) },
        ] {
            assert!(
                matches!(stock.handle(&command), Err(StockError::Validation(_))),
                "{command:?} should fail validation"
            );
        }
    }

    #[test]
    fn release_floors_at_zero() {
        let a = LocationId::new();
        let mut stock = stock_at(a, 10, 3);

        let events = stock.execute(&StockCommand::Release { amount: 8 }).unwrap();
        assert_eq!(events, vec![StockEvent::Released { amount: 3 }]);
        assert_eq!(stock.item().reserved_quantity, 0);
    }

    #[test]
    fn commit_draws_down_the_named_location() {
        let a = LocationId::new();
        let b = LocationId::new();
        let mut stock = ItemStock::load(item(30, 5), [(a, 20), (b, 10)], NegativeStockPolicy::Reject);

        stock
            .execute(&StockCommand::Commit { location_id: b, amount: 5 })
            .unwrap();
        assert_eq!(stock.item().quantity, 25);
        assert_eq!(stock.item().reserved_quantity, 0);
        assert_eq!(stock.level(a), 20);
        assert_eq!(stock.level(b), 5);
        stock.verify().unwrap();
    }

    #[test]
    fn commit_beyond_row_is_rejected_under_reject_policy() {
        let a = LocationId::new();
        let b = LocationId::new();
        let stock = ItemStock::load(item(30, 0), [(a, 28), (b, 2)], NegativeStockPolicy::Reject);

        let err = stock
            .handle(&StockCommand::Commit { location_id: b, amount: 5 })
            .unwrap_err();
        assert_eq!(err, StockError::insufficient(5, 2));
    }

    #[test]
    fn commit_may_overdraw_under_allow_policy() {
        let a = LocationId::new();
        let mut stock = ItemStock::load(item(3, 3), [(a, 3)], NegativeStockPolicy::Allow);

        stock
            .execute(&StockCommand::Commit { location_id: a, amount: 5 })
            .unwrap();
        assert_eq!(stock.item().quantity, -2);
        assert_eq!(stock.item().reserved_quantity, 0);
        assert_eq!(stock.level(a), -2);
        stock.verify().unwrap();
    }

    #[test]
    fn transfer_moves_between_rows_and_keeps_item_total() {
        let a = LocationId::new();
        let b = LocationId::new();
        let mut stock = stock_at(a, 50, 5);

        stock
            .execute(&StockCommand::Transfer { from: a, to: b, amount: 20 })
            .unwrap();
        assert_eq!(stock.level(a), 30);
        assert_eq!(stock.level(b), 20);
        assert_eq!(stock.item().quantity, 50);
        assert_eq!(stock.item().reserved_quantity, 5);
        stock.verify().unwrap();
    }

    #[test]
    fn self_transfer_is_an_invalid_location() {
        let a = LocationId::new();
        let stock = stock_at(a, 50, 0);
        let err = stock
            .handle(&StockCommand::Transfer { from: a, to: a, amount: 5 })
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidLocation(_)));
    }

    #[test]
    fn transfer_from_missing_row_reports_zero_available() {
        let a = LocationId::new();
        let stock = stock_at(a, 50, 0);
        let err = stock
            .handle(&StockCommand::Transfer {
                from: LocationId::new(),
                to: a,
                amount: 1,
            })
            .unwrap_err();
        assert_eq!(err, StockError::insufficient(1, 0));
    }

    #[test]
    fn set_adjustment_computes_delta_and_zero_delta_is_a_noop() {
        let a = LocationId::new();
        let mut stock = stock_at(a, 12, 0);

        let events = stock
            .execute(&StockCommand::Adjust {
                location_id: a,
                adjustment: Adjustment::Set(9),
            })
            .unwrap();
        assert_eq!(
            events,
            vec![StockEvent::Adjusted { location_id: a, delta: -3, correction: true }]
        );
        assert_eq!(stock.item().quantity, 9);

        let events = stock
            .execute(&StockCommand::Adjust {
                location_id: a,
                adjustment: Adjustment::Set(9),
            })
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn out_adjustment_cannot_eat_into_reservations() {
        let a = LocationId::new();
        let stock = stock_at(a, 10, 8);
        let err = stock
            .handle(&StockCommand::Adjust {
                location_id: a,
                adjustment: Adjustment::Out(3),
            })
            .unwrap_err();
        assert_eq!(err, StockError::insufficient(3, 2));
    }

    #[test]
    fn verify_detects_stock_drift() {
        let a = LocationId::new();
        let stock = ItemStock::load(item(10, 0), [(a, 7)], NegativeStockPolicy::Reject);
        assert!(matches!(stock.verify(), Err(StockError::IntegrityViolation(_))));
    }

    #[test]
    fn verify_detects_reserved_above_quantity() {
        let stock = ItemStock::load(item(3, 5), [(LocationId::new(), 3)], NegativeStockPolicy::Reject);
        assert!(matches!(stock.verify(), Err(StockError::IntegrityViolation(_))));
    }

    #[test]
    fn reconcile_rewrites_total_from_rows() {
        let a = LocationId::new();
        let b = LocationId::new();
        let mut stock = ItemStock::load(item(10, 0), [(a, 4), (b, 3)], NegativeStockPolicy::Reject);

        let events = stock.execute(&StockCommand::Reconcile).unwrap();
        assert_eq!(
            events,
            vec![StockEvent::Reconciled {
                recorded: 10,
                actual: 7,
                reserved_recorded: 0,
                reserved: 0
            }]
        );
        assert_eq!(stock.item().quantity, 7);
        stock.verify().unwrap();

        assert!(stock.execute(&StockCommand::Reconcile).unwrap().is_empty());
    }

    #[test]
    fn reconcile_caps_a_reservation_the_rows_no_longer_cover() {
        let a = LocationId::new();
        let mut stock = ItemStock::load(item(10, 8), [(a, 7)], NegativeStockPolicy::Reject);

        let events = stock.execute(&StockCommand::Reconcile).unwrap();
        assert_eq!(
            events,
            vec![StockEvent::Reconciled {
                recorded: 10,
                actual: 7,
                reserved_recorded: 8,
                reserved: 7
            }]
        );
        stock.verify().unwrap();

        stock.execute(&StockCommand::Release { amount: 7 }).unwrap();
        assert_eq!(stock.item().reserved_quantity, 0);
        assert!(stock.execute(&StockCommand::Reconcile).unwrap().is_empty());
    }

    #[test]
    fn reconcile_repairs_reserved_above_quantity_without_drift() {
        let a = LocationId::new();
        let mut stock = ItemStock::load(item(3, 5), [(a, 3)], NegativeStockPolicy::Reject);
        assert!(stock.verify().is_err());

        stock.execute(&StockCommand::Reconcile).unwrap();
        assert_eq!(stock.item().quantity, 3);
        assert_eq!(stock.item().reserved_quantity, 3);
        stock.verify().unwrap();
    }

    #[test]
    fn overflowing_amounts_are_rejected_before_apply() {
        let a = LocationId::new();
        let b = LocationId::new();
        let stock = ItemStock::load(item(1, 0), [(a, 1)], NegativeStockPolicy::Reject);

        for command in [
            StockCommand::Adjust { location_id: a, adjustment: Adjustment::In(i64::MAX) },
            StockCommand::Adjust { location_id: b, adjustment: Adjustment::In(i64::MAX) },
        ] {
            assert!(
                matches!(stock.handle(&command), Err(StockError::Validation(_))),
                "{command:?} should be out of range"
            );
        }

        let full = ItemStock::load(item(i64::MAX, 0), [(a, 1), (b, i64::MAX)], NegativeStockPolicy::Reject);
        let err = full
            .handle(&StockCommand::Transfer { from: a, to: b, amount: 1 })
            .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));

        let overdrawn = ItemStock::load(item(i64::MIN + 1, 0), [(a, i64::MIN + 1)], NegativeStockPolicy::Allow);
        let err = overdrawn
            .handle(&StockCommand::Commit { location_id: a, amount: 2 })
            .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[test]
    fn consolidate_moves_every_positive_row_into_target() {
        let a = LocationId::new();
        let b = LocationId::new();
        let c = LocationId::new();
        let mut stock = ItemStock::load(
            item(30, 4),
            [(a, 12), (b, 0), (c, 18)],
            NegativeStockPolicy::Reject,
        );

        let events = stock.execute(&StockCommand::Consolidate { to: c }).unwrap();
        assert_eq!(
            events,
            vec![StockEvent::Transferred { from: a, to: c, amount: 12 }]
        );
        assert_eq!(stock.level(a), 0);
        assert_eq!(stock.level(c), 30);
        assert_eq!(stock.item().quantity, 30);
        assert_eq!(stock.item().reserved_quantity, 4);
        stock.verify().unwrap();

        assert!(stock.execute(&StockCommand::Consolidate { to: c }).unwrap().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Transfer { from: usize, to: usize, amount: i64 },
        Reserve(i64),
        Release(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..4, 0usize..4, 1i64..40).prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
            (1i64..40).prop_map(Op::Reserve),
            (1i64..40).prop_map(Op::Release),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no sequence of transfers, reservations and releases
        /// changes the sum of the stock rows or the item total.
        #[test]
        fn transfers_conserve_total_stock(
            initial in prop::collection::vec(0i64..100, 4),
            ops in prop::collection::vec(op_strategy(), 1..40)
        ) {
            let locations: Vec<LocationId> = (0..4).map(|_| LocationId::new()).collect();
            let total: i64 = initial.iter().sum();
            let mut stock = ItemStock::load(
                item(total, 0),
                locations.iter().copied().zip(initial.iter().copied()),
                NegativeStockPolicy::Reject,
            );

            for op in ops {
                let command = match op {
                    Op::Transfer { from, to, amount } => StockCommand::Transfer {
                        from: locations[from],
                        to: locations[to],
                        amount,
                    },
                    Op::Reserve(amount) => StockCommand::Reserve { amount },
                    Op::Release(amount) => StockCommand::Release { amount },
                };
                let _ = stock.execute(&command);

                prop_assert_eq!(stock.total_stock(), Some(total));
                prop_assert_eq!(stock.item().quantity, total);
                prop_assert!(stock.verify().is_ok());
            }
        }

        /// Property: reserving any amount up to what is available and then
        /// releasing the same amount restores the reservation.
        #[test]
        fn reserve_then_release_round_trips(
            quantity in 0i64..1_000,
            reserved_share in 0i64..=100,
            pick in 0i64..=100
        ) {
            let a = LocationId::new();
            let reserved = quantity * reserved_share / 100;
            let available = quantity - reserved;
            prop_assume!(available > 0);
            let n = (available * pick / 100).max(1);

            let mut stock = stock_at(a, quantity, reserved);
            stock.execute(&StockCommand::Reserve { amount: n }).unwrap();
            stock.execute(&StockCommand::Release { amount: n }).unwrap();

            prop_assert_eq!(stock.item().reserved_quantity, reserved);
            prop_assert_eq!(stock.item().quantity, quantity);
        }
    }
}
