//! Notification rows created by the ledger for the host to deliver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ItemId, NotificationId, TenantId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Transfer,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
            NotificationKind::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(NotificationKind::Info),
            "warning" => Some(NotificationKind::Warning),
            "error" => Some(NotificationKind::Error),
            "transfer" => Some(NotificationKind::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    /// Item the notification is about; used to suppress repeats.
    pub item_id: Option<ItemId>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        item_id: Option<ItemId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            tenant_id,
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            item_id,
            is_read: false,
            created_at,
        }
    }

    /// True when `other` is an unread notice for the same user, title and item.
    pub fn duplicates(&self, other: &Notification) -> bool {
        !other.is_read
            && other.tenant_id == self.tenant_id
            && other.user_id == self.user_id
            && other.title == self.title
            && other.item_id == self.item_id
    }
}
