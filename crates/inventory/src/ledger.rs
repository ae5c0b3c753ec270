//! Append-only ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{EntryId, ItemId, LocationId, TenantId, TransferId, UserId};

/// Kind of quantity change recorded by a ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    In,
    Out,
    Transfer,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::In => "in",
            EntryKind::Out => "out",
            EntryKind::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(EntryKind::In),
            "out" => Some(EntryKind::Out),
            "transfer" => Some(EntryKind::Transfer),
            _ => None,
        }
    }
}

impl core::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable quantity change. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub kind: EntryKind,
    /// Signed change at `location_id`.
    pub change_amount: i64,
    pub location_id: LocationId,
    /// Source location, present on both halves of a transfer.
    pub from_location_id: Option<LocationId>,
    pub reason: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Summary of one move, kept alongside its two ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub quantity: i64,
    pub comment: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Reason shared by both halves of a transfer.
///
/// Names both locations so either entry alone explains the move.
pub fn transfer_reason(from_name: &str, to_name: &str, comment: Option<&str>) -> String {
    let base = format!("Transfer from \"{from_name}\" to \"{to_name}\"");
    match comment.map(str::trim).filter(|c| !c.is_empty()) {
        Some(comment) => format!("{base}. Reason: {comment}"),
        None => base,
    }
}

/// Reason shared by both halves of every move in a consolidation.
pub fn consolidation_reason(from_name: &str, to_name: &str, comment: Option<&str>) -> String {
    let base = format!("Consolidated from \"{from_name}\" into \"{to_name}\"");
    match comment.map(str::trim).filter(|c| !c.is_empty()) {
        Some(comment) => format!("{base}. Reason: {comment}"),
        None => base,
    }
}

pub fn commit_reason(note: Option<&str>) -> String {
    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("Reservation committed: {note}"),
        None => "Reservation committed".to_string(),
    }
}

pub fn correction_reason(note: &str) -> String {
    format!("Stock correction: {}", note.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_reason_names_both_locations() {
        let reason = transfer_reason("Main", "Shop", Some("restock B"));
        assert_eq!(reason, "Transfer from \"Main\" to \"Shop\". Reason: restock B");
    }

    #[test]
    fn blank_comment_is_omitted() {
        assert_eq!(
            transfer_reason("Main", "Shop", Some("  ")),
            "Transfer from \"Main\" to \"Shop\""
        );
        assert_eq!(transfer_reason("Main", "Shop", None), "Transfer from \"Main\" to \"Shop\"");
    }

    #[test]
    fn consolidation_reason_names_source_and_target() {
        assert_eq!(
            consolidation_reason("Shop", "Main", Some("season end")),
            "Consolidated from \"Shop\" into \"Main\". Reason: season end"
        );
    }

    #[test]
    fn entry_kind_parses_its_own_labels() {
        for kind in [EntryKind::In, EntryKind::Out, EntryKind::Transfer] {
            assert_eq!(EntryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntryKind::parse("set"), None);
    }
}
