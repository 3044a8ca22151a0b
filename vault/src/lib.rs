//! Encrypted key backup vault.
//!
//! Stores pre-encrypted key material wrapped under a key derived from a
//! user-chosen PIN or passphrase, versions the backups per device, and
//! writes an audit row for every access. The [`BackupEngine`] is the single
//! entry point; everything below it is an implementation detail.
//!
//! ```no_run
//! use keyshelter_vault::{BackupConfig, BackupEngine, CreateBackupRequest, SecretKind, StorageLocation};
//! use uuid::Uuid;
//!
//! # async fn demo() -> Result<(), keyshelter_vault::BackupError> {
//! let engine = BackupEngine::open(BackupConfig::default())?;
//! let info = engine
//!     .create_or_update_backup(CreateBackupRequest {
//!         user_id: Uuid::new_v4(),
//!         device_id: "device-1".into(),
//!         device_name: "Laptop".into(),
//!         keys: b"opaque key blob".to_vec(),
//!         secret: "483921".into(),
//!         secret_kind: SecretKind::Pin,
//!         storage_location: StorageLocation::Hosted,
//!         ip_address: None,
//!     })
//!     .await?;
//! assert_eq!(info.backup_version, 1);
//! # Ok(())
//! # }
//! ```

mod audit;
mod config;
mod db;
mod engine;
mod error;
mod logging;
mod store;
mod types;

pub use config::BackupConfig;
pub use engine::BackupEngine;
pub use error::{BackupError, BackupResult};
pub use types::{
    AccessLogEntry, BackupAction, BackupInfo, CreateBackupRequest, EncryptedKeyBackup, RestoredKeys,
    Secret, SecretKind, StorageLocation, StorageLocationInfo,
};

pub use keyshelter_crypto::ExposeSecret;
