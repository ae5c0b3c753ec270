//! `stockroom-core`: foundation building blocks for the stock ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult, ensure_not_blank, ensure_positive};
pub use id::{EntryId, ItemId, LocationId, NotificationId, TenantId, TransferId, UserId};
