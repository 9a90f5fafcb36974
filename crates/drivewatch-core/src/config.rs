//! Configuration module for DriveWatch.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::AccountId;
use crate::usecases::{RelevancePolicy, DEFAULT_MARKER_FOLDER};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for DriveWatch.
///
/// Every section is optional in the YAML file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub drive: DriveConfig,
    pub accounts: Vec<AccountConfig>,
    pub pipeline: PipelineConfig,
    pub polling: PollingConfig,
    pub webhook: WebhookConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
}

/// Google Drive API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Base URL of the Drive v3 REST API.
    pub api_base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum number of change-feed pages fetched in one cycle.
    pub max_pages_per_cycle: u32,
    /// Retries for throttled (429) or failing (5xx) requests.
    pub max_retries: u32,
}

/// One monitored Drive account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Local identifier, used as the cursor key and in webhook paths.
    pub id: String,
    /// OAuth access token. Prefer `access_token_env` outside of testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Name of an environment variable holding the access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_env: Option<String>,
}

/// Classification pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the folder holding one sub-folder per client.
    pub root_folder_name: String,
    /// Name of the marker folder inside each client folder.
    pub marker_folder_name: String,
    /// Seconds during which a file is not announced again.
    pub dedup_ttl_secs: u64,
    /// Which changes are considered at all.
    pub relevance: RelevanceConfig,
}

/// Relevance filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceMode {
    #[default]
    Any,
    CreatedWithin,
}

/// Relevance filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    pub mode: RelevanceMode,
    /// Window for `created_within`, in seconds.
    pub created_within_secs: u64,
}

/// Fixed-interval polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub enabled: bool,
    /// Seconds between poll cycles.
    pub interval_secs: u64,
}

/// Push-notification receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    /// Local address the receiver listens on.
    pub bind_address: String,
    /// Public base URL Drive should call; channels are registered only when set.
    pub public_url: Option<String>,
    /// Requested lifetime of a push channel, in seconds.
    pub channel_ttl_secs: u64,
}

/// Event delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Log every event at info level.
    pub log: bool,
    /// Messages buffered for `GET /events` clients of the webhook server.
    pub broadcast_capacity: usize,
    /// Optional URL each event is POSTed to as JSON.
    pub forward_url: Option<String>,
    /// Record events in the local history table.
    pub history: bool,
    /// Days of history the daemon keeps; 0 keeps everything.
    pub history_retention_days: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Local state database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file.
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivewatch/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivewatch")
            .join("config.yaml")
    }

    /// Looks up an account by id.
    pub fn account(&self, id: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.id == id)
    }
}

impl AccountConfig {
    /// Creates an account entry reading its token from `env_var`.
    pub fn from_env(id: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            access_token: None,
            access_token_env: Some(env_var.into()),
        }
    }

    /// Validated account identifier.
    pub fn account_id(&self) -> anyhow::Result<AccountId> {
        AccountId::new(self.id.clone()).map_err(Into::into)
    }

    /// Resolves the access token: the inline value wins over the env var.
    pub fn resolve_token(&self) -> anyhow::Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let var = self
            .access_token_env
            .as_deref()
            .with_context(|| format!("Account '{}' has no access token configured", self.id))?;
        std::env::var(var)
            .with_context(|| format!("Environment variable {var} is not set (account '{}')", self.id))
    }
}

impl PipelineConfig {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }
}

impl RelevanceConfig {
    /// Converts the settings into the pipeline's filter.
    pub fn policy(&self) -> RelevancePolicy {
        match self.mode {
            RelevanceMode::Any => RelevancePolicy::Any,
            RelevanceMode::CreatedWithin => {
                RelevancePolicy::CreatedWithin(Duration::from_secs(self.created_within_secs))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            request_timeout_secs: 30,
            max_pages_per_cycle: 10,
            max_retries: 3,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_folder_name: "Clientes".to_string(),
            marker_folder_name: DEFAULT_MARKER_FOLDER.to_string(),
            dedup_ttl_secs: 300,
            relevance: RelevanceConfig::default(),
        }
    }
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            mode: RelevanceMode::Any,
            created_within_secs: 10,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 12,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8787".to_string(),
            public_url: None,
            channel_ttl_secs: 3600,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            log: true,
            broadcast_capacity: 64,
            forward_url: None,
            history: true,
            history_retention_days: 90,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("drivewatch")
                .join("drivewatch.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"polling.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
/// Longest creation window accepted for `created_within` (one year).
pub const MAX_CREATED_WITHIN_SECS: u64 = 365 * 24 * 3600;

/// Longest lifetime Drive grants a changes channel (one week).
pub const MAX_CHANNEL_TTL_SECS: u64 = 7 * 24 * 3600;

/// Longest history retention accepted, in days (ten years).
pub const MAX_HISTORY_RETENTION_DAYS: u32 = 3650;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- drive ---
        if !is_http_url(&self.drive.api_base_url) {
            errors.push(ValidationError::new(
                "drive.api_base_url",
                format!("not an http(s) URL: {}", self.drive.api_base_url),
            ));
        }
        if self.drive.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "drive.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.drive.max_pages_per_cycle == 0 {
            errors.push(ValidationError::new(
                "drive.max_pages_per_cycle",
                "must be greater than 0",
            ));
        }

        // --- accounts ---
        for (i, account) in self.accounts.iter().enumerate() {
            let field = format!("accounts[{i}]");
            if let Err(e) = AccountId::new(account.id.clone()) {
                errors.push(ValidationError::new(format!("{field}.id"), e.to_string()));
            }
            if self.accounts[..i].iter().any(|other| other.id == account.id) {
                errors.push(ValidationError::new(
                    format!("{field}.id"),
                    format!("duplicate account id '{}'", account.id),
                ));
            }
            if account.access_token.is_none() && account.access_token_env.is_none() {
                errors.push(ValidationError::new(
                    field,
                    "one of access_token or access_token_env is required",
                ));
            }
        }

        // --- pipeline ---
        if self.pipeline.root_folder_name.trim().is_empty() {
            errors.push(ValidationError::new(
                "pipeline.root_folder_name",
                "must not be empty",
            ));
        }
        if self.pipeline.marker_folder_name.trim().is_empty() {
            errors.push(ValidationError::new(
                "pipeline.marker_folder_name",
                "must not be empty",
            ));
        }
        if self.pipeline.dedup_ttl_secs == 0 {
            errors.push(ValidationError::new(
                "pipeline.dedup_ttl_secs",
                "must be greater than 0",
            ));
        }
        if self.pipeline.relevance.mode == RelevanceMode::CreatedWithin
            && self.pipeline.relevance.created_within_secs == 0
        {
            errors.push(ValidationError::new(
                "pipeline.relevance.created_within_secs",
                "must be greater than 0 when mode is created_within",
            ));
        }
        if self.pipeline.relevance.created_within_secs > MAX_CREATED_WITHIN_SECS {
            errors.push(ValidationError::new(
                "pipeline.relevance.created_within_secs",
                format!("must be at most {MAX_CREATED_WITHIN_SECS}"),
            ));
        }

        // --- polling ---
        if self.polling.enabled && self.polling.interval_secs == 0 {
            errors.push(ValidationError::new(
                "polling.interval_secs",
                "must be greater than 0",
            ));
        }

        // --- webhook ---
        if self.webhook.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "webhook.bind_address",
                format!("not a socket address: {}", self.webhook.bind_address),
            ));
        }
        if let Some(url) = &self.webhook.public_url {
            if !url.starts_with("https://") {
                errors.push(ValidationError::new(
                    "webhook.public_url",
                    "Drive only delivers push notifications to https URLs",
                ));
            }
        }
        if self.webhook.channel_ttl_secs == 0 {
            errors.push(ValidationError::new(
                "webhook.channel_ttl_secs",
                "must be greater than 0",
            ));
        } else if self.webhook.channel_ttl_secs > MAX_CHANNEL_TTL_SECS {
            errors.push(ValidationError::new(
                "webhook.channel_ttl_secs",
                format!("must be at most {MAX_CHANNEL_TTL_SECS} (Drive's limit)"),
            ));
        }
        if !self.polling.enabled && !self.webhook.enabled {
            errors.push(ValidationError::new(
                "polling.enabled",
                "at least one of polling or webhook must be enabled",
            ));
        }

        // --- notify ---
        if self.notify.broadcast_capacity == 0 {
            errors.push(ValidationError::new(
                "notify.broadcast_capacity",
                "must be greater than 0",
            ));
        }
        if self.notify.history_retention_days > MAX_HISTORY_RETENTION_DAYS {
            errors.push(ValidationError::new(
                "notify.history_retention_days",
                format!("must be at most {MAX_HISTORY_RETENTION_DAYS}"),
            ));
        }
        if let Some(url) = &self.notify.forward_url {
            if !is_http_url(url) {
                errors.push(ValidationError::new(
                    "notify.forward_url",
                    format!("not an http(s) URL: {url}"),
                ));
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::new(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use drivewatch_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .account_from_env("office", "DRIVE_TOKEN")
///     .polling_interval_secs(30)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- drive ---

    pub fn drive_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.api_base_url = url.into();
        self
    }

    pub fn drive_max_pages_per_cycle(mut self, pages: u32) -> Self {
        self.config.drive.max_pages_per_cycle = pages;
        self
    }

    pub fn drive_max_retries(mut self, retries: u32) -> Self {
        self.config.drive.max_retries = retries;
        self
    }

    // --- accounts ---

    pub fn account(mut self, account: AccountConfig) -> Self {
        self.config.accounts.push(account);
        self
    }

    pub fn account_from_env(self, id: impl Into<String>, env_var: impl Into<String>) -> Self {
        self.account(AccountConfig::from_env(id, env_var))
    }

    // --- pipeline ---

    pub fn root_folder_name(mut self, name: impl Into<String>) -> Self {
        self.config.pipeline.root_folder_name = name.into();
        self
    }

    pub fn marker_folder_name(mut self, name: impl Into<String>) -> Self {
        self.config.pipeline.marker_folder_name = name.into();
        self
    }

    pub fn dedup_ttl_secs(mut self, secs: u64) -> Self {
        self.config.pipeline.dedup_ttl_secs = secs;
        self
    }

    pub fn relevance_created_within_secs(mut self, secs: u64) -> Self {
        self.config.pipeline.relevance.mode = RelevanceMode::CreatedWithin;
        self.config.pipeline.relevance.created_within_secs = secs;
        self
    }

    // --- polling ---

    pub fn polling_enabled(mut self, enabled: bool) -> Self {
        self.config.polling.enabled = enabled;
        self
    }

    pub fn polling_interval_secs(mut self, secs: u64) -> Self {
        self.config.polling.interval_secs = secs;
        self
    }

    // --- webhook ---

    pub fn webhook_enabled(mut self, enabled: bool) -> Self {
        self.config.webhook.enabled = enabled;
        self
    }

    pub fn webhook_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.config.webhook.bind_address = addr.into();
        self
    }

    pub fn webhook_public_url(mut self, url: impl Into<String>) -> Self {
        self.config.webhook.public_url = Some(url.into());
        self
    }

    // --- notify ---

    pub fn notify_forward_url(mut self, url: impl Into<String>) -> Self {
        self.config.notify.forward_url = Some(url.into());
        self
    }

    pub fn notify_history(mut self, enabled: bool) -> Self {
        self.config.notify.history = enabled;
        self
    }

    pub fn notify_history_retention_days(mut self, days: u32) -> Self {
        self.config.notify.history_retention_days = days;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
