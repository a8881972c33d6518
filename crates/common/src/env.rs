//! Environment/runtime helpers
//!
//! Sanity checks to ensure storage directories exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the directories holding the data file (and the optional backup)
/// exist; note when the data file itself is missing.
pub async fn ensure_env(data_file: &Path, backup_file: Option<&Path>) -> anyhow::Result<()> {
    for file in std::iter::once(data_file).chain(backup_file) {
        if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
        }
    }
    match tokio::fs::metadata(data_file).await {
        Ok(meta) if meta.is_dir() => {
            return Err(anyhow::anyhow!("{} is a directory, expected a file", data_file.display()));
        }
        Ok(_) => {}
        Err(_) => {
            warn!(data_file = %data_file.display(), "data file not found; starting with an empty store");
        }
    }
    info!(data_file = %data_file.display(), "storage environment ready");
    Ok(())
}
