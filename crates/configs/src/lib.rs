use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::Deserialize;

pub const DEFAULT_DATA_FILE: &str = "data/reservations.json";
pub const DATA_FILE_ENV: &str = "RESERVATIONS_FILE";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_file: PathBuf,
    #[serde(default)]
    pub backup_file: Option<PathBuf>,
    /// Known spots. Empty means any well-formed spot id is accepted.
    #[serde(default)]
    pub spots: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (or `config.toml`), falling back to defaults when
    /// the file is absent, then normalize and validate. A file that exists
    /// but does not parse is an error.
    pub fn load_and_validate() -> Result<Self> {
        let path = config_path();
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.storage.normalize_from_env();
        self.storage.normalize()?;
        self.storage.validate()?;
        Ok(())
    }
}

impl StorageConfig {
    /// Fill `data_file` from `RESERVATIONS_FILE` when the TOML left it empty.
    pub fn normalize_from_env(&mut self) {
        self.apply_data_file_override(std::env::var(DATA_FILE_ENV).ok());
    }

    fn apply_data_file_override(&mut self, from_env: Option<String>) {
        if self.data_file.as_os_str().is_empty() {
            if let Some(path) = from_env.filter(|p| !p.trim().is_empty()) {
                self.data_file = PathBuf::from(path.trim());
            }
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.data_file.as_os_str().is_empty() {
            self.data_file = PathBuf::from(DEFAULT_DATA_FILE);
        }
        if matches!(&self.backup_file, Some(p) if p.as_os_str().is_empty()) {
            self.backup_file = None;
        }
        let mut seen = BTreeSet::new();
        let mut spots = Vec::with_capacity(self.spots.len());
        for spot in &self.spots {
            let spot = spot.trim().to_string();
            if seen.insert(spot.clone()) {
                spots.push(spot);
            }
        }
        self.spots = spots;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.backup_file.as_ref() == Some(&self.data_file) {
            return Err(anyhow!("storage.backup_file must differ from storage.data_file"));
        }
        for spot in &self.spots {
            models::reservation::validate_spot_id(spot)
                .map_err(|e| anyhow!("storage.spots contains {spot:?}: {e}"))?;
        }
        Ok(())
    }
}
