//! Backup orchestrator.
//!
//! Sequences validation → cryptography → persistence → audit for every
//! operation. The engine owns its store, audit log and hasher outright and
//! is constructed explicitly; there is no process-wide state.
//!
//! Key derivation is intentionally CPU-expensive, so all crypto runs on the
//! blocking pool under the configured deadline: a flood of restore attempts
//! cannot exhaust the async workers.

use tokio::time::timeout;
use uuid::Uuid;
use zeroize::Zeroizing;

use keyshelter_crypto::validate::validate_secret;
use keyshelter_crypto::{CryptoError, CryptoResult, ExposeSecret, SecretHasher, aead, hash, kdf};

use crate::audit::AccessLog;
use crate::config::BackupConfig;
use crate::db;
use crate::error::{BackupError, BackupResult};
use crate::logging::log_security_event;
use crate::store::BackupStore;
use crate::types::{
    AccessLogEntry, BackupAction, BackupInfo, CreateBackupRequest, NewBackup, RestoredKeys, Secret,
    StorageLocation, StorageLocationInfo,
};

pub struct BackupEngine {
    store: BackupStore,
    audit: AccessLog,
    hasher: SecretHasher,
    config: BackupConfig,
}

impl BackupEngine {
    /// Open the engine against the configured database path.
    pub fn open(config: BackupConfig) -> BackupResult<Self> {
        let conn = db::open(&config.database_path)?;
        Self::with_connection(conn, config)
    }

    /// Engine backed by an in-memory database; for tests and ephemeral use.
    pub fn open_in_memory(config: BackupConfig) -> BackupResult<Self> {
        Self::with_connection(db::open_in_memory()?, config)
    }

    fn with_connection(conn: db::SharedConnection, config: BackupConfig) -> BackupResult<Self> {
        let store = BackupStore::new(conn.clone())?;
        let audit = AccessLog::new(conn)?;
        let hasher = SecretHasher::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
        )
        .map_err(|e| BackupError::Configuration(e.to_string()))?;
        Ok(Self {
            store,
            audit,
            hasher,
            config,
        })
    }

    /// Create the first backup for a device, or overwrite the existing one
    /// with a version bump. Fresh salt and nonce on every call.
    pub async fn create_or_update_backup(
        &self,
        req: CreateBackupRequest,
    ) -> BackupResult<BackupInfo> {
        let CreateBackupRequest {
            user_id,
            device_id,
            device_name,
            keys,
            secret,
            secret_kind,
            storage_location,
            ip_address,
        } = req;

        // Caller error, not a security event: nothing is audited here.
        validate_secret(secret_kind, secret.expose_secret())?;

        let salt = kdf::generate_salt();
        let iterations = self.config.effective_iterations();
        // Fingerprint of the opaque key material, before the wrapping layer.
        let keys_hash = hash::fingerprint(&keys);

        // Assigned up front so even a failed attempt has an id to audit.
        let backup_id = Uuid::new_v4();

        let hasher = self.hasher.clone();
        let task = tokio::task::spawn_blocking(move || -> CryptoResult<(Vec<u8>, String)> {
            let encrypted_keys = aead::encrypt_keys(&keys, &secret, &salt, iterations)?;
            // Independent derivation from the same secret; feeds the audit
            // trail, never the cipher.
            let pin_hash = hasher.hash_secret(&secret)?;
            Ok((encrypted_keys, pin_hash))
        });

        let deadline = self.config.operation_timeout();
        let (encrypted_keys, pin_hash) = match timeout(deadline, task).await {
            Err(_) => {
                self.audit.record(
                    user_id,
                    Some(backup_id),
                    BackupAction::Create,
                    &device_id,
                    ip_address.as_deref(),
                    false,
                    Some("timeout"),
                )?;
                return Err(BackupError::Timeout(deadline));
            }
            Ok(Err(join_err)) => {
                self.audit.record(
                    user_id,
                    Some(backup_id),
                    BackupAction::Create,
                    &device_id,
                    ip_address.as_deref(),
                    false,
                    Some("internal_error"),
                )?;
                return Err(BackupError::Crypto(format!("crypto task failed: {join_err}")));
            }
            Ok(Ok(result)) => result?,
        };

        let candidate = NewBackup {
            id: backup_id,
            user_id,
            device_id: device_id.clone(),
            device_name,
            storage_location,
            encryption_method: aead::SCHEME_VERSION.to_string(),
            encrypted_keys,
            keys_hash,
            pin_hash,
            salt: salt.to_vec(),
            iterations,
        };

        match self.store.upsert(&candidate) {
            Ok(stored) => {
                self.audit.record(
                    user_id,
                    Some(stored.id),
                    BackupAction::Create,
                    &device_id,
                    ip_address.as_deref(),
                    true,
                    None,
                )?;
                log_security_event(
                    "BACKUP_CREATE",
                    &format!("device {device_id} now at version {}", stored.backup_version),
                    true,
                );
                Ok(stored.info())
            }
            Err(err) => {
                let _ = self.audit.record(
                    user_id,
                    Some(candidate.id),
                    BackupAction::Create,
                    &device_id,
                    ip_address.as_deref(),
                    false,
                    Some("persistence_error"),
                );
                log_security_event("BACKUP_CREATE", "persistence failure", false);
                Err(err)
            }
        }
    }

    /// Unwrap the most recent backup for the user with the supplied secret.
    ///
    /// Every attempt, success or failure, produces exactly one audit entry.
    /// The one exception is when no backup exists at all: there is no
    /// backup id to attach.
    pub async fn restore_backup(
        &self,
        user_id: Uuid,
        secret: Secret,
        ip_address: Option<String>,
    ) -> BackupResult<RestoredKeys> {
        let backup = self
            .store
            .get_latest_for_user(user_id)?
            .ok_or(BackupError::NotFound)?;

        let blob = backup.encrypted_keys.clone();
        let salt = backup.salt.clone();
        let pin_hash = backup.pin_hash.clone();
        // Stored per row: old backups keep decrypting after the configured
        // work factor is raised.
        let iterations = backup.iterations;
        let hasher = self.hasher.clone();

        let task = tokio::task::spawn_blocking(move || -> CryptoResult<(Vec<u8>, bool)> {
            let plaintext = aead::decrypt_keys(&blob, &secret, &salt, iterations)?;
            // Advisory only: the AEAD tag above is the authoritative proof
            // of possession.
            let hash_matches = hasher.verify_secret(&secret, &pin_hash);
            Ok((plaintext, hash_matches))
        });

        let deadline = self.config.operation_timeout();
        let outcome = match timeout(deadline, task).await {
            Err(_) => {
                self.audit.record(
                    user_id,
                    Some(backup.id),
                    BackupAction::Restore,
                    &backup.device_id,
                    ip_address.as_deref(),
                    false,
                    Some("timeout"),
                )?;
                return Err(BackupError::Timeout(deadline));
            }
            Ok(Err(join_err)) => {
                self.audit.record(
                    user_id,
                    Some(backup.id),
                    BackupAction::Restore,
                    &backup.device_id,
                    ip_address.as_deref(),
                    false,
                    Some("internal_error"),
                )?;
                return Err(BackupError::Crypto(format!("crypto task failed: {join_err}")));
            }
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            Err(err @ (CryptoError::Authentication | CryptoError::Malformed(_))) => {
                // Wrong secret and corrupted blob are indistinguishable to
                // the caller; the audit row carries the same reason for both.
                self.audit.record(
                    user_id,
                    Some(backup.id),
                    BackupAction::Restore,
                    &backup.device_id,
                    ip_address.as_deref(),
                    false,
                    Some("authentication_failed"),
                )?;
                log_security_event("BACKUP_RESTORE", "authentication failed", false);
                Err(BackupError::from(err))
            }
            Err(err) => {
                self.audit.record(
                    user_id,
                    Some(backup.id),
                    BackupAction::Restore,
                    &backup.device_id,
                    ip_address.as_deref(),
                    false,
                    Some("internal_error"),
                )?;
                Err(BackupError::from(err))
            }
            Ok((plaintext, hash_matches)) => {
                if !hash_matches {
                    // Should not happen under correct usage; the decrypt is
                    // authoritative, so the keys are still returned.
                    log_security_event(
                        "BACKUP_RESTORE_ANOMALY",
                        "AEAD tag verified but stored secret hash mismatched",
                        false,
                    );
                }
                self.audit.record(
                    user_id,
                    Some(backup.id),
                    BackupAction::Restore,
                    &backup.device_id,
                    ip_address.as_deref(),
                    true,
                    None,
                )?;
                Ok(RestoredKeys {
                    keys: Zeroizing::new(plaintext),
                    backup_version: backup.backup_version,
                    backed_up_at: backup.last_backup_at,
                })
            }
        }
    }

    /// Non-secret metadata for the user's most recent backup.
    pub async fn get_backup_info(&self, user_id: Uuid) -> BackupResult<BackupInfo> {
        self.store
            .get_latest_for_user(user_id)?
            .map(|backup| backup.info())
            .ok_or(BackupError::NotFound)
    }

    /// Remove every backup for the user and invalidate future restores.
    ///
    /// Audited unconditionally: even when nothing existed, the
    /// post-condition "no backup exists" holds, so the attempt is logged as
    /// a success (with no backup id to attach).
    pub async fn delete_backup(
        &self,
        user_id: Uuid,
        ip_address: Option<String>,
    ) -> BackupResult<()> {
        let existing = self.store.get_latest_for_user(user_id)?;
        let (backup_id, device_id) = match existing {
            Some(backup) => (Some(backup.id), backup.device_id),
            None => (None, String::new()),
        };

        match self.store.delete(user_id) {
            Ok(removed) => {
                self.audit.record(
                    user_id,
                    backup_id,
                    BackupAction::Delete,
                    &device_id,
                    ip_address.as_deref(),
                    true,
                    None,
                )?;
                log_security_event("BACKUP_DELETE", &format!("{removed} row(s) removed"), true);
                Ok(())
            }
            Err(err) => {
                let _ = self.audit.record(
                    user_id,
                    backup_id,
                    BackupAction::Delete,
                    &device_id,
                    ip_address.as_deref(),
                    false,
                    Some("persistence_error"),
                );
                Err(err)
            }
        }
    }

    /// Audit trail for the user, newest first.
    pub fn access_history(&self, user_id: Uuid) -> BackupResult<Vec<AccessLogEntry>> {
        self.audit.entries_for_user(user_id)
    }

    /// Advisory descriptions of the supported storage locations.
    #[must_use]
    pub fn storage_location_options() -> Vec<StorageLocationInfo> {
        [
            StorageLocation::Hosted,
            StorageLocation::LocalOnly,
            StorageLocation::Icloud,
            StorageLocation::GoogleDrive,
        ]
        .iter()
        .map(StorageLocation::describe)
        .collect()
    }
}
