//! Data model for encrypted key backups and their access trail.
//!
//! The schema is a fixed record with named, typed fields; there is no
//! open-ended key/value bag, so everything is validated at this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroizing;

pub use keyshelter_crypto::{Secret, SecretKind};

/// Where the user chose to keep the backup. Informational policy metadata;
/// it never changes how the blob is encrypted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    /// Our servers: double-encrypted, the host cannot decrypt.
    Hosted,
    /// Device-local only; lost with the device.
    LocalOnly,
    Icloud,
    GoogleDrive,
}

impl StorageLocation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Hosted => "hosted",
            StorageLocation::LocalOnly => "local_only",
            StorageLocation::Icloud => "icloud",
            StorageLocation::GoogleDrive => "google_drive",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "hosted" => Some(StorageLocation::Hosted),
            "local_only" => Some(StorageLocation::LocalOnly),
            "icloud" => Some(StorageLocation::Icloud),
            "google_drive" => Some(StorageLocation::GoogleDrive),
            _ => None,
        }
    }

    /// Advisory description shown when the user picks a location.
    #[must_use]
    pub fn describe(&self) -> StorageLocationInfo {
        match self {
            StorageLocation::Hosted => StorageLocationInfo {
                location: *self,
                name: "Hosted",
                description: "Keys are wrapped with your PIN or passphrase and stored on \
                              our servers. Only you can decrypt them.",
                warning: None,
                recommended: true,
            },
            StorageLocation::LocalOnly => StorageLocationInfo {
                location: *self,
                name: "Local device",
                description: "Keys stay on this device only.",
                warning: Some("Lost if the device is lost, broken or reset."),
                recommended: false,
            },
            StorageLocation::Icloud => StorageLocationInfo {
                location: *self,
                name: "Apple iCloud",
                description: "Keys backed up to your iCloud account.",
                warning: Some("The cloud provider holds its own layer of keys."),
                recommended: false,
            },
            StorageLocation::GoogleDrive => StorageLocationInfo {
                location: *self,
                name: "Google Drive",
                description: "Keys backed up to your Google Drive.",
                warning: Some("The cloud provider holds its own layer of keys."),
                recommended: false,
            },
        }
    }
}

/// Non-secret advisory info about a storage option.
#[derive(Clone, Debug, Serialize)]
pub struct StorageLocationInfo {
    pub location: StorageLocation,
    pub name: &'static str,
    pub description: &'static str,
    pub warning: Option<&'static str>,
    pub recommended: bool,
}

/// Audited operation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupAction {
    Create,
    Restore,
    Delete,
}

impl BackupAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupAction::Create => "create",
            BackupAction::Restore => "restore",
            BackupAction::Delete => "delete",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(BackupAction::Create),
            "restore" => Some(BackupAction::Restore),
            "delete" => Some(BackupAction::Delete),
            _ => None,
        }
    }
}

/// One versioned backup row, unique per `(user_id, device_id)`.
///
/// Holds ciphertext and hashes only: the plaintext key material and the raw
/// user secret are never persisted.
#[derive(Clone)]
pub struct EncryptedKeyBackup {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub storage_location: StorageLocation,
    /// Scheme tag (algorithm + KDF identifiers) for future migration.
    pub encryption_method: String,
    /// `nonce ‖ ciphertext ‖ tag` wrapping the opaque primary-layer blob.
    pub encrypted_keys: Vec<u8>,
    /// Non-secret fingerprint of the plaintext key material.
    pub keys_hash: String,
    /// Argon2id PHC string of the user secret, for audit gating only.
    pub pin_hash: String,
    pub salt: Vec<u8>,
    /// PBKDF2 work factor used for this row.
    pub iterations: u32,
    /// Strictly increasing across overwrites; reset only by deletion.
    pub backup_version: i64,
    pub last_backup_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EncryptedKeyBackup {
    /// Non-secret metadata view: never the ciphertext, salt or hashes.
    #[must_use]
    pub fn info(&self) -> BackupInfo {
        BackupInfo {
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
            storage_location: self.storage_location,
            backup_version: self.backup_version,
            last_backup_at: self.last_backup_at,
        }
    }
}

// Redacts ciphertext, salt and secret hash; lengths are enough for debugging.
impl fmt::Debug for EncryptedKeyBackup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedKeyBackup")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("device_name", &self.device_name)
            .field("storage_location", &self.storage_location)
            .field("encryption_method", &self.encryption_method)
            .field("encrypted_keys", &format_args!("<{} bytes>", self.encrypted_keys.len()))
            .field("keys_hash", &self.keys_hash)
            .field("pin_hash", &"<redacted>")
            .field("salt", &format_args!("<{} bytes>", self.salt.len()))
            .field("iterations", &self.iterations)
            .field("backup_version", &self.backup_version)
            .field("last_backup_at", &self.last_backup_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Payload for the versioned upsert. Identifier and timestamps are assigned
/// by the store.
#[derive(Clone)]
pub struct NewBackup {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub storage_location: StorageLocation,
    pub encryption_method: String,
    pub encrypted_keys: Vec<u8>,
    pub keys_hash: String,
    pub pin_hash: String,
    pub salt: Vec<u8>,
    pub iterations: u32,
}

/// Non-secret backup metadata returned to callers.
#[derive(Clone, Debug, Serialize)]
pub struct BackupInfo {
    pub device_id: String,
    pub device_name: String,
    pub storage_location: StorageLocation,
    pub backup_version: i64,
    pub last_backup_at: DateTime<Utc>,
}

/// Result of a successful restore. The key material is still encrypted by
/// the messaging layer; only the secret-derived wrapping has been removed.
pub struct RestoredKeys {
    /// Zeroized on drop.
    pub keys: Zeroizing<Vec<u8>>,
    pub backup_version: i64,
    pub backed_up_at: DateTime<Utc>,
}

// The unwrapped key material never reaches log output.
impl fmt::Debug for RestoredKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoredKeys")
            .field("keys", &format_args!("<{} bytes>", self.keys.len()))
            .field("backup_version", &self.backup_version)
            .field("backed_up_at", &self.backed_up_at)
            .finish()
    }
}

/// Append-only audit record of one access attempt.
#[derive(Clone, Debug, Serialize)]
pub struct AccessLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `None` only for delete attempts where no backup existed.
    pub backup_id: Option<Uuid>,
    pub action: BackupAction,
    pub device_id: String,
    pub ip_address: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

/// Inputs to [`crate::engine::BackupEngine::create_or_update_backup`].
pub struct CreateBackupRequest {
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    /// Opaque, already encrypted by the messaging layer. Never inspected.
    pub keys: Vec<u8>,
    pub secret: Secret,
    pub secret_kind: SecretKind,
    pub storage_location: StorageLocation,
    pub ip_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret_fields() {
        let backup = EncryptedKeyBackup {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_id: "dev-1".to_string(),
            device_name: "Phone".to_string(),
            storage_location: StorageLocation::Hosted,
            encryption_method: "aes256-gcm.pbkdf2-sha256.v1".to_string(),
            encrypted_keys: vec![1, 2, 3],
            keys_hash: "abc".to_string(),
            pin_hash: "$argon2id$secret".to_string(),
            salt: vec![9; 32],
            iterations: 100_000,
            backup_version: 1,
            last_backup_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let rendered = format!("{backup:?}");
        assert!(!rendered.contains("argon2id"));
        assert!(rendered.contains("<3 bytes>"));
        assert!(rendered.contains("<32 bytes>"));
    }

    #[test]
    fn restored_keys_debug_redacts_key_material() {
        let restored = RestoredKeys {
            keys: Zeroizing::new(b"plaintext key material".to_vec()),
            backup_version: 2,
            backed_up_at: Utc::now(),
        };

        let rendered = format!("{restored:?}");
        assert!(!rendered.contains("plaintext"));
        assert!(rendered.contains("<22 bytes>"));
        assert!(rendered.contains("backup_version: 2"));
    }

    #[test]
    fn location_round_trips_through_str() {
        for location in [
            StorageLocation::Hosted,
            StorageLocation::LocalOnly,
            StorageLocation::Icloud,
            StorageLocation::GoogleDrive,
        ] {
            assert_eq!(StorageLocation::parse(location.as_str()), Some(location));
        }
        assert_eq!(StorageLocation::parse("dropbox"), None);
    }

    #[test]
    fn hosted_is_the_recommended_location() {
        assert!(StorageLocation::Hosted.describe().recommended);
        assert!(!StorageLocation::Icloud.describe().recommended);
    }
}
