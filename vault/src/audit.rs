//! Append-only access audit log.
//!
//! Every create/restore/delete attempt lands here, success or failure,
//! before the operation returns to the caller. Rows are never updated or
//! deleted; repeated authentication failures in this table are the signal an
//! external rate-limiting policy consumes. Each record is also mirrored to
//! the structured logger for live security review.

use chrono::Utc;
use rusqlite::{Row, params, types::Type};
use uuid::Uuid;

use crate::db::SharedConnection;
use crate::error::BackupResult;
use crate::store::parse_timestamp;
use crate::types::{AccessLogEntry, BackupAction};

pub struct AccessLog {
    conn: SharedConnection,
}

impl AccessLog {
    /// Wrap a connection and make sure the log table exists.
    pub(crate) fn new(conn: SharedConnection) -> BackupResult<Self> {
        {
            let guard = conn.lock();
            guard.execute(
                "CREATE TABLE IF NOT EXISTS key_backup_access_log (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    backup_id TEXT,
                    action TEXT NOT NULL,
                    device_id TEXT NOT NULL,
                    ip_address TEXT,
                    success INTEGER NOT NULL,
                    failure_reason TEXT,
                    accessed_at INTEGER NOT NULL
                )",
                [],
            )?;
            guard.execute(
                "CREATE INDEX IF NOT EXISTS idx_access_log_user
                 ON key_backup_access_log (user_id, accessed_at DESC)",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Durably record one access attempt. Must complete before the
    /// surrounding operation returns so even failed attempts survive for
    /// later review.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        user_id: Uuid,
        backup_id: Option<Uuid>,
        action: BackupAction,
        device_id: &str,
        ip_address: Option<&str>,
        success: bool,
        failure_reason: Option<&str>,
    ) -> BackupResult<AccessLogEntry> {
        let entry = AccessLogEntry {
            id: Uuid::new_v4(),
            user_id,
            backup_id,
            action,
            device_id: device_id.to_string(),
            ip_address: ip_address.map(str::to_string),
            success,
            failure_reason: failure_reason.map(str::to_string),
            accessed_at: Utc::now(),
        };

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO key_backup_access_log (
                    id, user_id, backup_id, action, device_id, ip_address,
                    success, failure_reason, accessed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id.to_string(),
                    entry.user_id.to_string(),
                    entry.backup_id.map(|id| id.to_string()),
                    entry.action.as_str(),
                    entry.device_id,
                    entry.ip_address,
                    entry.success,
                    entry.failure_reason,
                    entry.accessed_at.timestamp_micros(),
                ],
            )?;
        }

        self.mirror_to_logger(&entry);
        Ok(entry)
    }

    /// Audit trail for one user, newest first.
    pub fn entries_for_user(&self, user_id: Uuid) -> BackupResult<Vec<AccessLogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, backup_id, action, device_id, ip_address,
                    success, failure_reason, accessed_at
             FROM key_backup_access_log
             WHERE user_id = ?1
             ORDER BY accessed_at DESC, id",
        )?;
        let entries = stmt
            .query_map(params![user_id.to_string()], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn mirror_to_logger(&self, entry: &AccessLogEntry) {
        let json = serde_json::to_string(entry)
            .unwrap_or_else(|_| "AUDIT_SERIALIZATION_ERROR".to_string());
        if entry.success {
            tracing::info!(target: "security_audit", "{json}");
        } else {
            tracing::warn!(target: "security_audit", "{json}");
        }
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AccessLogEntry> {
    Ok(AccessLogEntry {
        id: parse_uuid(row, 0)?,
        user_id: parse_uuid(row, 1)?,
        backup_id: parse_optional_uuid(row, 2)?,
        action: parse_action(row, 3)?,
        device_id: row.get(4)?,
        ip_address: row.get(5)?,
        success: row.get(6)?,
        failure_reason: row.get(7)?,
        accessed_at: parse_timestamp(row, 8)?,
    })
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        None => Ok(None),
        Some(text) => Uuid::parse_str(&text)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn parse_action(row: &Row<'_>, idx: usize) -> rusqlite::Result<BackupAction> {
    let text: String = row.get(idx)?;
    BackupAction::parse(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown audit action: {text}").into(),
        )
    })
}
