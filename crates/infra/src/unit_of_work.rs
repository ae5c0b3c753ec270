//! Turns one stock command into the full set of rows to write.
//!
//! Both stores lock and load the item, its stock rows and the referenced
//! locations, call [`plan`], and then persist the returned [`Changeset`] in the
//! same transaction. Nothing here performs IO.

use chrono::{DateTime, Utc};

use stockroom_core::{Aggregate, EntryId, LocationId, TenantId, TransferId, UserId};
use stockroom_inventory::{
    EntryKind, Item, ItemStock, LedgerEntry, Location, NegativeStockPolicy, Notification,
    NotificationKind, StockCommand, StockError, StockEvent, TransferRecord, commit_reason,
    consolidation_reason, correction_reason, transfer_reason,
};

/// Who is acting and under which rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub tenant_id: TenantId,
    /// Recorded as `created_by`; required by commands that write ledger entries.
    pub actor: Option<UserId>,
    /// Reason or comment carried into ledger entries and transfer records.
    pub note: Option<String>,
    pub policy: NegativeStockPolicy,
    pub now: DateTime<Utc>,
}

impl OperationContext {
    pub fn new(tenant_id: TenantId, policy: NegativeStockPolicy) -> Self {
        Self {
            tenant_id,
            actor: None,
            note: None,
            policy,
            now: Utc::now(),
        }
    }

    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn require_actor(&self) -> Result<UserId, StockError> {
        self.actor
            .ok_or_else(|| StockError::Validation("an acting user is required".to_string()))
    }

    fn note(&self) -> Option<&str> {
        self.note.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Everything one unit of work writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    /// Item row as loaded, before the command.
    pub before: Item,
    /// Item row to write.
    pub item: Item,
    /// New absolute quantity per touched stock row.
    pub stock_writes: Vec<(LocationId, i64)>,
    pub entries: Vec<LedgerEntry>,
    /// One summary per move; a consolidation may record several.
    pub transfers: Vec<TransferRecord>,
    /// Transfer notices, inserted in the same transaction.
    pub notifications: Vec<Notification>,
    pub events: Vec<StockEvent>,
}

impl Changeset {
    /// True when the command decided there was nothing to do.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }

    /// True when the item total moved and the threshold monitor should run.
    pub fn changes_quantity(&self) -> bool {
        self.events.iter().any(StockEvent::changes_quantity)
    }
}

/// Decide `command` against freshly locked state.
///
/// `locations` must contain every location the command references that exists
/// in the tenant, plus the locations of the item's stock rows; a missing one is
/// reported as [`StockError::InvalidLocation`].
pub fn plan(
    mut stock: ItemStock,
    command: &StockCommand,
    ctx: &OperationContext,
    locations: &[Location],
) -> Result<Changeset, StockError> {
    if *command != StockCommand::Reconcile {
        stock.verify()?;
    }

    if let StockCommand::Transfer { from, to, .. } = command {
        if from == to {
            return Err(StockError::InvalidLocation(
                "source and destination must differ".to_string(),
            ));
        }
    }

    for location_id in command.locations() {
        if !locations.iter().any(|l| l.id == location_id) {
            return Err(StockError::InvalidLocation(format!(
                "location {location_id} does not exist"
            )));
        }
    }

    let actor = match command {
        StockCommand::Commit { .. }
        | StockCommand::Transfer { .. }
        | StockCommand::Adjust { .. }
        | StockCommand::Consolidate { .. } => Some(ctx.require_actor()?),
        _ => ctx.actor,
    };

    let before = stock.item().clone();
    let events = stock.execute(command)?;

    if !events.is_empty() {
        let item = stock.item_mut();
        item.updated_at = ctx.now;
        if events.iter().any(StockEvent::changes_quantity) {
            item.track_zero_stock(ctx.now);
        }
    }

    let mut stock_writes: Vec<(LocationId, i64)> = Vec::new();
    for location_id in events.iter().flat_map(StockEvent::touched_locations) {
        if !stock_writes.iter().any(|(id, _)| *id == location_id) {
            stock_writes.push((location_id, stock.level(location_id)));
        }
    }
    stock_writes.sort_by_key(|(id, _)| *id);

    let mut entries = Vec::new();
    let mut transfers = Vec::new();
    let mut notifications = Vec::new();

    for event in &events {
        match event {
            StockEvent::Committed {
                location_id, amount, ..
            } => {
                let created_by = actor.ok_or_else(missing_actor)?;
                entries.push(entry(
                    stock.item(),
                    ctx,
                    EntryKind::Out,
                    -amount,
                    *location_id,
                    None,
                    commit_reason(ctx.note()),
                    created_by,
                ));
            }
            StockEvent::Transferred { from, to, amount } => {
                let created_by = actor.ok_or_else(missing_actor)?;
                let source = find(locations, *from)?;
                let destination = find(locations, *to)?;
                let reason = match command {
                    StockCommand::Consolidate { .. } => {
                        consolidation_reason(&source.name, &destination.name, ctx.note())
                    }
                    _ => transfer_reason(&source.name, &destination.name, ctx.note()),
                };

                entries.push(entry(
                    stock.item(),
                    ctx,
                    EntryKind::Transfer,
                    -amount,
                    *from,
                    Some(*from),
                    reason.clone(),
                    created_by,
                ));
                entries.push(entry(
                    stock.item(),
                    ctx,
                    EntryKind::Transfer,
                    *amount,
                    *to,
                    Some(*from),
                    reason,
                    created_by,
                ));

                transfers.push(TransferRecord {
                    id: TransferId::new(),
                    tenant_id: ctx.tenant_id,
                    item_id: stock.item().id,
                    from_location_id: *from,
                    to_location_id: *to,
                    quantity: *amount,
                    comment: ctx.note().map(str::to_string),
                    created_by,
                    created_at: ctx.now,
                });

                notifications.extend(transfer_notices(stock.item(), source, destination, *amount, ctx));
            }
            StockEvent::Adjusted {
                location_id,
                delta,
                correction,
            } => {
                let created_by = actor.ok_or_else(missing_actor)?;
                let note = ctx.note().unwrap_or("manual adjustment");
                let reason = if *correction {
                    correction_reason(note)
                } else {
                    note.to_string()
                };
                let kind = if *delta > 0 { EntryKind::In } else { EntryKind::Out };
                entries.push(entry(
                    stock.item(),
                    ctx,
                    kind,
                    *delta,
                    *location_id,
                    None,
                    reason,
                    created_by,
                ));
            }
            StockEvent::Reserved { .. } | StockEvent::Released { .. } | StockEvent::Reconciled { .. } => {}
        }
    }

    let (item, _) = stock.into_parts();
    Ok(Changeset {
        before,
        item,
        stock_writes,
        entries,
        transfers,
        notifications,
        events,
    })
}

fn missing_actor() -> StockError {
    StockError::Validation("an acting user is required".to_string())
}

fn find(locations: &[Location], id: LocationId) -> Result<&Location, StockError> {
    locations
        .iter()
        .find(|l| l.id == id)
        .ok_or_else(|| StockError::InvalidLocation(format!("location {id} does not exist")))
}

#[allow(clippy::too_many_arguments)]
fn entry(
    item: &Item,
    ctx: &OperationContext,
    kind: EntryKind,
    change_amount: i64,
    location_id: LocationId,
    from_location_id: Option<LocationId>,
    reason: String,
    created_by: UserId,
) -> LedgerEntry {
    LedgerEntry {
        id: EntryId::new(),
        tenant_id: ctx.tenant_id,
        item_id: item.id,
        kind,
        change_amount,
        location_id,
        from_location_id,
        reason,
        created_by,
        created_at: ctx.now,
    }
}

/// One notice per distinct responsible user of the two locations.
fn transfer_notices(
    item: &Item,
    source: &Location,
    destination: &Location,
    amount: i64,
    ctx: &OperationContext,
) -> Vec<Notification> {
    let mut recipients: Vec<UserId> = Vec::new();
    for user_id in [source.responsible_user_id, destination.responsible_user_id]
        .into_iter()
        .flatten()
    {
        if !recipients.contains(&user_id) {
            recipients.push(user_id);
        }
    }

    let message = format!(
        "{}: {} {} moved from \"{}\" to \"{}\"",
        item.name, amount, item.unit, source.name, destination.name
    );

    recipients
        .into_iter()
        .map(|user_id| {
            Notification::new(
                ctx.tenant_id,
                user_id,
                NotificationKind::Transfer,
                "Stock transfer",
                message.clone(),
                Some(item.id),
                ctx.now,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_inventory::{Adjustment, NewItem, NewLocation};

    struct Fixture {
        tenant: TenantId,
        actor: UserId,
        a: Location,
        b: Location,
        item: Item,
    }

    fn fixture(quantity: i64) -> Fixture {
        let tenant = TenantId::new();
        let mut item = NewItem::named("T-Shirt").into_item(tenant, Utc::now()).unwrap();
        item.quantity = quantity;
        Fixture {
            tenant,
            actor: UserId::new(),
            a: NewLocation::named("A").into_location(tenant).unwrap(),
            b: NewLocation::named("B").into_location(tenant).unwrap(),
            item,
        }
    }

    fn load(f: &Fixture) -> ItemStock {
        ItemStock::load(f.item.clone(), [(f.a.id, f.item.quantity)], NegativeStockPolicy::Reject)
    }

    fn ctx(f: &Fixture) -> OperationContext {
        OperationContext::new(f.tenant, NegativeStockPolicy::Reject).by(f.actor)
    }

    #[test]
    fn transfer_plans_paired_entries_and_summary() {
        let f = fixture(50);
        let command = StockCommand::Transfer {
            from: f.a.id,
            to: f.b.id,
            amount: 10,
        };
        let changes = plan(
            load(&f),
            &command,
            &ctx(&f).with_note("restock"),
            &[f.a.clone(), f.b.clone()],
        )
        .unwrap();

        assert_eq!(changes.entries.len(), 2);
        let amounts: Vec<i64> = changes.entries.iter().map(|e| e.change_amount).collect();
        assert_eq!(amounts, vec![-10, 10]);
        assert!(changes.entries.iter().all(|e| e.from_location_id == Some(f.a.id)));
        assert_eq!(changes.entries[0].reason, changes.entries[1].reason);
        assert_eq!(changes.entries[0].reason, "Transfer from \"A\" to \"B\". Reason: restock");

        assert_eq!(changes.transfers.len(), 1);
        let transfer = &changes.transfers[0];
        assert_eq!(transfer.quantity, 10);
        assert_eq!(transfer.comment.as_deref(), Some("restock"));
        assert_eq!(changes.item.quantity, 50);
        assert!(!changes.events.iter().any(StockEvent::changes_quantity));
        assert!(changes.notifications.is_empty());
    }

    #[test]
    fn unknown_location_is_invalid() {
        let f = fixture(50);
        let command = StockCommand::Transfer {
            from: f.a.id,
            to: f.b.id,
            amount: 10,
        };
        let err = plan(load(&f), &command, &ctx(&f), &[f.a.clone()]).unwrap_err();
        assert!(matches!(err, StockError::InvalidLocation(_)));
    }

    #[test]
    fn shared_responsible_user_gets_one_transfer_notice() {
        let mut f = fixture(50);
        let keeper = UserId::new();
        f.a.responsible_user_id = Some(keeper);
        f.b.responsible_user_id = Some(keeper);

        let command = StockCommand::Transfer {
            from: f.a.id,
            to: f.b.id,
            amount: 5,
        };
        let changes = plan(load(&f), &command, &ctx(&f), &[f.a.clone(), f.b.clone()]).unwrap();
        assert_eq!(changes.notifications.len(), 1);
        assert_eq!(changes.notifications[0].user_id, keeper);
        assert_eq!(changes.notifications[0].kind, NotificationKind::Transfer);
    }

    #[test]
    fn ledger_writing_commands_require_an_actor() {
        let f = fixture(50);
        let anonymous = OperationContext::new(f.tenant, NegativeStockPolicy::Reject);
        let command = StockCommand::Commit {
            location_id: f.a.id,
            amount: 1,
        };
        let err = plan(load(&f), &command, &anonymous, &[f.a.clone()]).unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));

        let reserve = StockCommand::Reserve { amount: 1 };
        assert!(plan(load(&f), &reserve, &anonymous, &[]).is_ok());
    }

    #[test]
    fn set_adjustment_writes_correction_entry_and_row() {
        let f = fixture(12);
        let command = StockCommand::Adjust {
            location_id: f.a.id,
            adjustment: Adjustment::Set(9),
        };
        let changes = plan(
            load(&f),
            &command,
            &ctx(&f).with_note("cycle count"),
            &[f.a.clone()],
        )
        .unwrap();

        assert_eq!(changes.stock_writes, vec![(f.a.id, 9)]);
        assert_eq!(changes.item.quantity, 9);
        assert_eq!(changes.entries.len(), 1);
        assert_eq!(changes.entries[0].kind, EntryKind::Out);
        assert_eq!(changes.entries[0].change_amount, -3);
        assert_eq!(changes.entries[0].reason, "Stock correction: cycle count");
        assert!(changes.changes_quantity());
    }

    #[test]
    fn consolidation_plans_one_pair_and_summary_per_source_row() {
        let f = fixture(30);
        let c = NewLocation::named("C").into_location(f.tenant).unwrap();
        let stock = ItemStock::load(
            f.item.clone(),
            [(f.a.id, 20), (f.b.id, 10)],
            NegativeStockPolicy::Reject,
        );
        let command = StockCommand::Consolidate { to: c.id };
        let changes = plan(
            stock,
            &command,
            &ctx(&f).with_note("close shelves"),
            &[f.a.clone(), f.b.clone(), c.clone()],
        )
        .unwrap();

        assert_eq!(changes.entries.len(), 4);
        assert_eq!(changes.transfers.len(), 2);
        assert!(changes.transfers.iter().all(|t| t.to_location_id == c.id));
        assert_eq!(changes.item.quantity, 30);
        assert!(changes.stock_writes.contains(&(c.id, 30)));
        assert!(changes.stock_writes.contains(&(f.a.id, 0)));
        assert!(changes.stock_writes.contains(&(f.b.id, 0)));
        assert!(
            changes
                .entries
                .iter()
                .all(|e| e.reason.starts_with("Consolidated from") && e.reason.ends_with("Reason: close shelves"))
        );
        let net: i64 = changes.entries.iter().map(|e| e.change_amount).sum();
        assert_eq!(net, 0);
    }

    #[test]
    fn drifted_state_is_refused_before_deciding() {
        let f = fixture(10);
        let drifted = ItemStock::load(f.item.clone(), [(f.a.id, 7)], NegativeStockPolicy::Reject);
        let err = plan(drifted, &StockCommand::Reserve { amount: 1 }, &ctx(&f), &[]).unwrap_err();
        assert!(matches!(err, StockError::IntegrityViolation(_)));
    }
}
