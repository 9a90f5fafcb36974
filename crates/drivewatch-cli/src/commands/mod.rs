//! Subcommands and the helpers they share
//!
//! Every command receives a [`Context`] carrying the output format and the
//! configuration file location.

pub mod config;
pub mod cursor;
pub mod history;
pub mod poll;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use drivewatch_cache::DatabasePool;
use drivewatch_core::config::{AccountConfig, Config};
use tracing::debug;

use crate::output::OutputFormat;

/// Global options resolved once in `main`
pub struct Context {
    pub format: OutputFormat,
    config_path: PathBuf,
    explicit_config: bool,
}

impl Context {
    pub fn new(format: OutputFormat, config: Option<PathBuf>) -> Self {
        match config {
            Some(path) => Self {
                format,
                config_path: path,
                explicit_config: true,
            },
            None => Self {
                format,
                config_path: Config::default_path(),
                explicit_config: false,
            },
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the configuration
    ///
    /// A file named with `--config` must exist; the default location falls
    /// back to defaults when absent.
    pub fn load_config(&self) -> Result<Config> {
        let config = if self.explicit_config {
            Config::load(&self.config_path)?
        } else {
            Config::load_or_default(&self.config_path)
        };
        debug!(config_path = %self.config_path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Opens the state database the daemon also writes to
pub async fn open_database(config: &Config) -> Result<DatabasePool> {
    let db_path = &config.database.path;
    DatabasePool::new(db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

/// The account named by `--account`, or the first configured one
pub fn select_account<'a>(config: &'a Config, requested: Option<&str>) -> Result<&'a AccountConfig> {
    match requested {
        Some(id) => config
            .account(id)
            .with_context(|| format!("Account '{id}' is not configured")),
        None => config
            .accounts
            .first()
            .context("No accounts configured. Run 'drivewatch config init' first."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivewatch_core::config::ConfigBuilder;

    fn two_accounts() -> Config {
        ConfigBuilder::new()
            .account_from_env("office", "OFFICE_TOKEN")
            .account_from_env("home", "HOME_TOKEN")
            .build()
    }

    #[test]
    fn test_select_account_defaults_to_first() {
        let config = two_accounts();
        assert_eq!(select_account(&config, None).unwrap().id, "office");
        assert_eq!(select_account(&config, Some("home")).unwrap().id, "home");
    }

    #[test]
    fn test_select_account_errors() {
        assert!(select_account(&two_accounts(), Some("missing")).is_err());
        assert!(select_account(&Config::default(), None).is_err());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(OutputFormat::Human, Some(dir.path().join("absent.yaml")));
        assert!(ctx.load_config().is_err());
    }

    #[tokio::test]
    async fn test_open_database_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new()
            .database_path(dir.path().join("nested").join("state.db"))
            .build();
        let db = open_database(&config).await.unwrap();
        assert!(dir.path().join("nested").join("state.db").exists());
        db.close().await;
    }
}
