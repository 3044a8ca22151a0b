//! Durable, versioned persistence of encrypted key backups.
//!
//! One row per `(user_id, device_id)`, enforced by a unique constraint. The
//! overwrite path is a single conditional `INSERT … ON CONFLICT DO UPDATE`
//! so the version counter cannot be corrupted by concurrent backup attempts
//! from the same device; there is no read-then-write anywhere.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params, types::Type};
use uuid::Uuid;

use crate::db::SharedConnection;
use crate::error::BackupResult;
use crate::types::{EncryptedKeyBackup, NewBackup, StorageLocation};

pub struct BackupStore {
    conn: SharedConnection,
}

const BACKUP_COLUMNS: &str = "id, user_id, device_id, device_name, storage_location, \
     encryption_method, encrypted_keys, keys_hash, pin_hash, salt, iterations, \
     backup_version, last_backup_at, created_at, updated_at";

impl BackupStore {
    /// Wrap a connection and make sure the backups table exists.
    pub(crate) fn new(conn: SharedConnection) -> BackupResult<Self> {
        {
            let guard = conn.lock();
            guard.execute(
                "CREATE TABLE IF NOT EXISTS encrypted_key_backups (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    device_id TEXT NOT NULL,
                    device_name TEXT NOT NULL,
                    storage_location TEXT NOT NULL,
                    encryption_method TEXT NOT NULL,
                    encrypted_keys BLOB NOT NULL,
                    keys_hash TEXT NOT NULL,
                    pin_hash TEXT NOT NULL,
                    salt BLOB NOT NULL,
                    iterations INTEGER NOT NULL,
                    backup_version INTEGER NOT NULL,
                    last_backup_at INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    UNIQUE (user_id, device_id)
                )",
                [],
            )?;
            guard.execute(
                "CREATE INDEX IF NOT EXISTS idx_backups_user_last
                 ON encrypted_key_backups (user_id, last_backup_at DESC)",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Insert a first backup for the device at version 1, or atomically
    /// replace the ciphertext, hashes and salt of the existing row while
    /// bumping `backup_version` by exactly one. `id` and `created_at` are
    /// immutable on the update path.
    ///
    /// Returns the row as stored.
    pub fn upsert(&self, backup: &NewBackup) -> BackupResult<EncryptedKeyBackup> {
        let now = Utc::now().timestamp_micros();
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO encrypted_key_backups (
                id, user_id, device_id, device_name, storage_location,
                encryption_method, encrypted_keys, keys_hash, pin_hash, salt,
                iterations, backup_version, last_backup_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?12, ?12)
            ON CONFLICT (user_id, device_id) DO UPDATE SET
                device_name = excluded.device_name,
                storage_location = excluded.storage_location,
                encryption_method = excluded.encryption_method,
                encrypted_keys = excluded.encrypted_keys,
                keys_hash = excluded.keys_hash,
                pin_hash = excluded.pin_hash,
                salt = excluded.salt,
                iterations = excluded.iterations,
                backup_version = encrypted_key_backups.backup_version + 1,
                last_backup_at = excluded.last_backup_at,
                updated_at = excluded.updated_at",
            params![
                backup.id.to_string(),
                backup.user_id.to_string(),
                backup.device_id,
                backup.device_name,
                backup.storage_location.as_str(),
                backup.encryption_method,
                backup.encrypted_keys,
                backup.keys_hash,
                backup.pin_hash,
                backup.salt,
                backup.iterations,
                now,
            ],
        )?;

        let stored = conn
            .query_row(
                &format!(
                    "SELECT {BACKUP_COLUMNS} FROM encrypted_key_backups
                     WHERE user_id = ?1 AND device_id = ?2"
                ),
                params![backup.user_id.to_string(), backup.device_id],
                row_to_backup,
            )?;
        Ok(stored)
    }

    /// Most recently backed-up record for the user, across all devices.
    pub fn get_latest_for_user(&self, user_id: Uuid) -> BackupResult<Option<EncryptedKeyBackup>> {
        let conn = self.conn.lock();
        let backup = conn
            .query_row(
                &format!(
                    "SELECT {BACKUP_COLUMNS} FROM encrypted_key_backups
                     WHERE user_id = ?1
                     ORDER BY last_backup_at DESC, backup_version DESC
                     LIMIT 1"
                ),
                params![user_id.to_string()],
                row_to_backup,
            )
            .optional()?;
        Ok(backup)
    }

    /// Lookup by the natural key.
    pub fn get_for_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> BackupResult<Option<EncryptedKeyBackup>> {
        let conn = self.conn.lock();
        let backup = conn
            .query_row(
                &format!(
                    "SELECT {BACKUP_COLUMNS} FROM encrypted_key_backups
                     WHERE user_id = ?1 AND device_id = ?2"
                ),
                params![user_id.to_string(), device_id],
                row_to_backup,
            )
            .optional()?;
        Ok(backup)
    }

    /// Remove every backup row for the user. Idempotent: deleting a
    /// non-existent backup is not an error. Returns the number of rows
    /// removed.
    pub fn delete(&self, user_id: Uuid) -> BackupResult<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM encrypted_key_backups WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(removed)
    }
}

fn row_to_backup(row: &Row<'_>) -> rusqlite::Result<EncryptedKeyBackup> {
    Ok(EncryptedKeyBackup {
        id: parse_uuid(row, 0)?,
        user_id: parse_uuid(row, 1)?,
        device_id: row.get(2)?,
        device_name: row.get(3)?,
        storage_location: parse_location(row, 4)?,
        encryption_method: row.get(5)?,
        encrypted_keys: row.get(6)?,
        keys_hash: row.get(7)?,
        pin_hash: row.get(8)?,
        salt: row.get(9)?,
        iterations: row.get(10)?,
        backup_version: row.get(11)?,
        last_backup_at: parse_timestamp(row, 12)?,
        created_at: parse_timestamp(row, 13)?,
        updated_at: parse_timestamp(row, 14)?,
    })
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_location(row: &Row<'_>, idx: usize) -> rusqlite::Result<StorageLocation> {
    let text: String = row.get(idx)?;
    StorageLocation::parse(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown storage location: {text}").into(),
        )
    })
}

pub(crate) fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {micros}").into(),
        )
    })
}
