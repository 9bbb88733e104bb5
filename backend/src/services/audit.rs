//! Transfer audit trail and the organization-wide activity log

use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{convert_rows, TransferAction, TransferLog, TransferLogRow, TRANSFER_LOG_COLUMNS};

/// A transfer log entry about to be appended
#[derive(Debug, Clone)]
pub struct NewTransferLog {
    pub transfer_id: Uuid,
    pub item_id: Option<Uuid>,
    pub action: TransferAction,
    pub actor_id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub details: Value,
    pub notes: Option<String>,
}

impl NewTransferLog {
    pub fn new(transfer_id: Uuid, action: TransferAction, actor_id: Uuid) -> Self {
        Self {
            transfer_id,
            item_id: None,
            action,
            actor_id,
            previous_status: None,
            new_status: None,
            details: Value::Object(Default::default()),
            notes: None,
        }
    }

    pub fn item(mut self, item_id: Uuid) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn status_change(mut self, previous: Option<&str>, new: &str) -> Self {
        self.previous_status = previous.map(str::to_string);
        self.new_status = Some(new.to_string());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// Insert-only writer for the transfer audit trail
pub struct AuditLogWriter;

impl AuditLogWriter {
    pub async fn append(conn: &mut PgConnection, entry: NewTransferLog) -> AppResult<TransferLog> {
        let row = sqlx::query_as::<_, TransferLogRow>(&format!(
            r#"
            INSERT INTO transfer_logs (
                transfer_id, item_id, action, actor_id, previous_status, new_status, details, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            TRANSFER_LOG_COLUMNS
        ))
        .bind(entry.transfer_id)
        .bind(entry.item_id)
        .bind(entry.action.as_str())
        .bind(entry.actor_id)
        .bind(&entry.previous_status)
        .bind(&entry.new_status)
        .bind(&entry.details)
        .bind(&entry.notes)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(
            transfer_id = %entry.transfer_id,
            action = entry.action.as_str(),
            "transfer log appended"
        );

        row.try_into()
    }

    /// Full history of a transfer, oldest first
    pub async fn history(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<Vec<TransferLog>> {
        let rows = sqlx::query_as::<_, TransferLogRow>(&format!(
            "SELECT {} FROM transfer_logs WHERE transfer_id = $1 ORDER BY created_at, id",
            TRANSFER_LOG_COLUMNS
        ))
        .bind(transfer_id)
        .fetch_all(&mut *conn)
        .await?;

        convert_rows(rows)
    }
}

/// Entry for the activity log shared by every module of the application
#[derive(Debug, Clone)]
pub struct ActivityEntry<'a> {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Uuid,
    pub description: String,
}

/// Writer for the organization-wide activity log
pub struct ActivityLog;

impl ActivityLog {
    pub async fn record(conn: &mut PgConnection, entry: ActivityEntry<'_>) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (organization_id, user_id, action, entity_type, entity_id, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.organization_id)
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.description)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
