//! End-to-end tests for the backup engine: create, version bump, restore,
//! delete and the audit trail each operation leaves behind.

use uuid::Uuid;

use keyshelter_vault::{
    BackupAction, BackupConfig, BackupEngine, BackupError, CreateBackupRequest, SecretKind,
    StorageLocation,
};

fn test_engine() -> BackupEngine {
    // Minimal Argon2 work factor so the suite stays fast; the PBKDF2 side
    // still runs at its production floor.
    let config = BackupConfig {
        argon2_memory_cost: 8,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        ..BackupConfig::default()
    };
    BackupEngine::open_in_memory(config).expect("in-memory engine")
}

fn pin_request(user_id: Uuid, device_id: &str, keys: &[u8], pin: &str) -> CreateBackupRequest {
    CreateBackupRequest {
        user_id,
        device_id: device_id.to_string(),
        device_name: "Test Device".to_string(),
        keys: keys.to_vec(),
        secret: pin.into(),
        secret_kind: SecretKind::Pin,
        storage_location: StorageLocation::Hosted,
        ip_address: Some("192.0.2.10".to_string()),
    }
}

#[tokio::test]
async fn create_then_restore_roundtrip() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();
    let keys = b"opaque pre-encrypted key bundle";

    let info = engine
        .create_or_update_backup(pin_request(user_id, "phone-1", keys, "483921"))
        .await
        .expect("create");
    assert_eq!(info.backup_version, 1);
    assert_eq!(info.device_id, "phone-1");
    assert_eq!(info.storage_location, StorageLocation::Hosted);

    let restored = engine
        .restore_backup(user_id, "483921".into(), None)
        .await
        .expect("restore");
    assert_eq!(restored.keys.as_slice(), keys);
    assert_eq!(restored.backup_version, 1);
}

#[tokio::test]
async fn recreate_bumps_version_and_restores_latest() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    let generations: [(i64, &[u8]); 3] = [(1, b"first"), (2, b"second"), (3, b"third")];
    for (expected_version, payload) in generations {
        let info = engine
            .create_or_update_backup(pin_request(user_id, "phone-1", payload, "483921"))
            .await
            .expect("create");
        assert_eq!(info.backup_version, expected_version);
    }

    let restored = engine
        .restore_backup(user_id, "483921".into(), None)
        .await
        .expect("restore");
    assert_eq!(restored.keys.as_slice(), b"third");
    assert_eq!(restored.backup_version, 3);
}

#[tokio::test]
async fn devices_version_independently() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    let phone = engine
        .create_or_update_backup(pin_request(user_id, "phone-1", b"phone keys", "483921"))
        .await
        .expect("create phone");
    let laptop = engine
        .create_or_update_backup(pin_request(user_id, "laptop-1", b"laptop keys", "483921"))
        .await
        .expect("create laptop");
    assert_eq!(phone.backup_version, 1);
    assert_eq!(laptop.backup_version, 1);
}

#[tokio::test]
async fn passphrase_secret_roundtrip() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    let mut req = pin_request(user_id, "phone-1", b"bundle", "");
    req.secret = "correct Horse7battery".into();
    req.secret_kind = SecretKind::Passphrase;
    engine.create_or_update_backup(req).await.expect("create");

    let restored = engine
        .restore_backup(user_id, "correct Horse7battery".into(), None)
        .await
        .expect("restore");
    assert_eq!(restored.keys.as_slice(), b"bundle");
}

#[tokio::test]
async fn wrong_secret_is_generic_authentication_error() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    engine
        .create_or_update_backup(pin_request(user_id, "phone-1", b"bundle", "483921"))
        .await
        .expect("create");

    let err = engine
        .restore_backup(user_id, "000000".into(), Some("192.0.2.99".to_string()))
        .await
        .expect_err("wrong pin must fail");
    assert!(matches!(err, BackupError::Authentication));
    // The message must not leak whether the secret or the blob was at fault.
    assert!(!err.to_string().to_lowercase().contains("pin"));
}

#[tokio::test]
async fn invalid_secret_format_is_rejected_before_any_work() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    let err = engine
        .create_or_update_backup(pin_request(user_id, "phone-1", b"bundle", "12345"))
        .await
        .expect_err("short pin");
    assert!(matches!(err, BackupError::Validation(_)));

    // A rejected format is a caller error, not an access attempt.
    let history = engine.access_history(user_id).expect("history");
    assert!(history.is_empty());
}

#[tokio::test]
async fn restore_without_backup_is_not_found() {
    let engine = test_engine();
    let err = engine
        .restore_backup(Uuid::new_v4(), "483921".into(), None)
        .await
        .expect_err("nothing to restore");
    assert!(matches!(err, BackupError::NotFound));
}

#[tokio::test]
async fn delete_invalidates_restore_and_is_idempotent() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    engine
        .create_or_update_backup(pin_request(user_id, "phone-1", b"bundle", "483921"))
        .await
        .expect("create");
    engine
        .delete_backup(user_id, None)
        .await
        .expect("delete existing");

    let err = engine
        .restore_backup(user_id, "483921".into(), None)
        .await
        .expect_err("deleted");
    assert!(matches!(err, BackupError::NotFound));

    // Deleting again still succeeds: the post-condition already holds.
    engine
        .delete_backup(user_id, None)
        .await
        .expect("delete nothing");
}

#[tokio::test]
async fn get_backup_info_exposes_no_secret_material() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    engine
        .create_or_update_backup(pin_request(user_id, "phone-1", b"bundle", "483921"))
        .await
        .expect("create");

    let info = engine.get_backup_info(user_id).await.expect("info");
    assert_eq!(info.device_id, "phone-1");
    assert_eq!(info.device_name, "Test Device");
    assert_eq!(info.backup_version, 1);

    let err = engine
        .get_backup_info(Uuid::new_v4())
        .await
        .expect_err("unknown user");
    assert!(matches!(err, BackupError::NotFound));
}

#[tokio::test]
async fn every_access_attempt_is_audited() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    engine
        .create_or_update_backup(pin_request(user_id, "phone-1", b"bundle", "483921"))
        .await
        .expect("create");
    engine
        .restore_backup(user_id, "000000".into(), Some("192.0.2.99".to_string()))
        .await
        .expect_err("wrong pin");
    engine
        .restore_backup(user_id, "483921".into(), None)
        .await
        .expect("restore");
    engine.delete_backup(user_id, None).await.expect("delete");

    let history = engine.access_history(user_id).expect("history");
    assert_eq!(history.len(), 4);

    // Newest first.
    assert_eq!(history[0].action, BackupAction::Delete);
    assert!(history[0].success);

    assert_eq!(history[1].action, BackupAction::Restore);
    assert!(history[1].success);

    assert_eq!(history[2].action, BackupAction::Restore);
    assert!(!history[2].success);
    assert_eq!(history[2].failure_reason.as_deref(), Some("authentication_failed"));
    assert_eq!(history[2].ip_address.as_deref(), Some("192.0.2.99"));

    assert_eq!(history[3].action, BackupAction::Create);
    assert!(history[3].success);
    assert_eq!(history[3].ip_address.as_deref(), Some("192.0.2.10"));
}

#[tokio::test]
async fn create_deadline_expiry_is_audited() {
    let config = BackupConfig {
        argon2_memory_cost: 8,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        // The key derivation can never beat a zero deadline.
        operation_timeout_secs: 0,
        ..BackupConfig::default()
    };
    let engine = BackupEngine::open_in_memory(config).expect("in-memory engine");
    let user_id = Uuid::new_v4();

    let err = engine
        .create_or_update_backup(pin_request(user_id, "phone-1", b"bundle", "483921"))
        .await
        .expect_err("deadline expired");
    assert!(matches!(err, BackupError::Timeout(_)));

    let history = engine.access_history(user_id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, BackupAction::Create);
    assert!(!history[0].success);
    assert_eq!(history[0].failure_reason.as_deref(), Some("timeout"));
    assert!(history[0].backup_id.is_some());
}

#[tokio::test]
async fn delete_of_missing_backup_is_still_audited() {
    let engine = test_engine();
    let user_id = Uuid::new_v4();

    engine.delete_backup(user_id, None).await.expect("delete");

    let history = engine.access_history(user_id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, BackupAction::Delete);
    assert!(history[0].success);
    assert!(history[0].backup_id.is_none());
}

#[test]
fn storage_location_options_cover_all_variants() {
    let options = BackupEngine::storage_location_options();
    assert_eq!(options.len(), 4);
    assert!(options.iter().any(|o| o.location == StorageLocation::LocalOnly));
}
