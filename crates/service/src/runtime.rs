//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so the binary only needs the service
//! crate and its configuration to prepare storage.

/// Ensure storage directories exist before the store is opened.
pub async fn ensure_env(storage: &configs::StorageConfig) -> anyhow::Result<()> {
    common::env::ensure_env(&storage.data_file, storage.backup_file.as_deref()).await
}
