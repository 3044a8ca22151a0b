use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use keyshelter_crypto::kdf::DEFAULT_ITERATIONS;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackupConfig {
    pub database_path: PathBuf,
    /// PBKDF2 work factor for new backups. Values below the shipped default
    /// are clamped up; existing backups keep their stored value.
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
    #[serde(default = "default_memory_cost")]
    pub argon2_memory_cost: u32,
    #[serde(default = "default_time_cost")]
    pub argon2_time_cost: u32,
    #[serde(default = "default_parallelism")]
    pub argon2_parallelism: u32,
    /// Deadline for a single create/restore operation, bounding the
    /// CPU-expensive key derivation work.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_pbkdf2_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_memory_cost() -> u32 {
    64 * 1024 // 64 MB
}

fn default_time_cost() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

fn default_operation_timeout_secs() -> u64 {
    30
}

impl BackupConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Work factor actually applied to new backups: configurable upward only.
    #[must_use]
    pub fn effective_iterations(&self) -> u32 {
        self.pbkdf2_iterations.max(DEFAULT_ITERATIONS)
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("keyshelter.db"),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            argon2_memory_cost: default_memory_cost(),
            argon2_time_cost: default_time_cost(),
            argon2_parallelism: default_parallelism(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterations_clamp_upward_only() {
        let mut config = BackupConfig::default();
        config.pbkdf2_iterations = 1_000;
        assert_eq!(config.effective_iterations(), DEFAULT_ITERATIONS);

        config.pbkdf2_iterations = 600_000;
        assert_eq!(config.effective_iterations(), 600_000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: BackupConfig =
            serde_json::from_str(r#"{"database_path": "/tmp/backups.db"}"#).unwrap();
        assert_eq!(config.pbkdf2_iterations, DEFAULT_ITERATIONS);
        assert_eq!(config.operation_timeout(), Duration::from_secs(30));
        assert_eq!(config.argon2_memory_cost, 64 * 1024);
    }
}
