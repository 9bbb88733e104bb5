//! Transfer audit trail models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action recorded in the transfer audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferAction {
    TransferInitiated,
    TransferDispatched,
    TransferReceived,
    ItemRejected,
    ItemDisposed,
    TransferCancelled,
    ReturnInitiated,
}

impl TransferAction {
    pub const ALL: [TransferAction; 7] = [
        TransferAction::TransferInitiated,
        TransferAction::TransferDispatched,
        TransferAction::TransferReceived,
        TransferAction::ItemRejected,
        TransferAction::ItemDisposed,
        TransferAction::TransferCancelled,
        TransferAction::ReturnInitiated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferAction::TransferInitiated => "transfer_initiated",
            TransferAction::TransferDispatched => "transfer_dispatched",
            TransferAction::TransferReceived => "transfer_received",
            TransferAction::ItemRejected => "item_rejected",
            TransferAction::ItemDisposed => "item_disposed",
            TransferAction::TransferCancelled => "transfer_cancelled",
            TransferAction::ReturnInitiated => "return_initiated",
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferAction {
    type Err = super::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| super::UnknownStatus(s.to_string()))
    }
}

/// Append-only audit record for a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLog {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub item_id: Option<Uuid>,
    pub action: TransferAction,
    pub actor_id: Uuid,
    /// Transfer status for transfer actions, item status for item actions
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub details: serde_json::Value,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
