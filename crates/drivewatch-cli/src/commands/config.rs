//! Config command - View and manage DriveWatch configuration
//!
//! Provides the `drivewatch config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors
//! 3. Writes a starter configuration file
//! 4. Sets individual configuration values via dot-notation keys

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use drivewatch_core::config::{AccountConfig, Config, RelevanceMode};
use tracing::info;

use super::Context;
use crate::output::get_formatter;

/// Environment variable `config init` points the starter account at
const DEFAULT_TOKEN_ENV: &str = "DRIVEWATCH_ACCESS_TOKEN";

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("drive.api_base_url", "Drive v3 REST base URL"),
    ("drive.request_timeout_secs", "Per-request timeout"),
    ("drive.max_pages_per_cycle", "Change pages fetched per cycle"),
    ("drive.max_retries", "Retries on 429/5xx"),
    ("pipeline.root_folder_name", "Folder holding one folder per client"),
    ("pipeline.marker_folder_name", "Marker folder inside each client"),
    ("pipeline.dedup_ttl_secs", "Seconds a file is not announced twice"),
    ("pipeline.relevance.mode", "any|created_within"),
    ("pipeline.relevance.created_within_secs", "Window for created_within"),
    ("polling.enabled", "true|false"),
    ("polling.interval_secs", "Seconds between cycles"),
    ("webhook.enabled", "true|false"),
    ("webhook.bind_address", "Listen address, e.g. 127.0.0.1:8787"),
    ("webhook.public_url", "Public base URL (none to unset)"),
    ("webhook.channel_ttl_secs", "Requested push channel lifetime"),
    ("notify.log", "true|false"),
    ("notify.broadcast_capacity", "Broadcast buffer size"),
    ("notify.forward_url", "URL events are POSTed to (none to unset)"),
    ("notify.history", "true|false"),
    ("notify.history_retention_days", "Days of history kept (0 keeps all)"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.format", "text|json"),
    ("database.path", "SQLite state file"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "polling.interval_secs")
        key: String,
        /// New value
        value: String,
    },
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Init { force } => self.execute_init(ctx, *force),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
        }
    }

    fn execute_show(&self, ctx: &Context) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;

        info!(config_path = %ctx.config_path().display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path().display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &Context) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = ctx.config_path();

        // Load explicitly so parse errors are reported instead of defaulted
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {e:#}")
                } else {
                    "Configuration file not found".to_string()
                };
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                    if !config_path.exists() {
                        formatter.info("Run 'drivewatch config init' to create one.");
                    }
                }
                return Ok(());
            }
        };

        let errors = config.validate();

        if ctx.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }

    fn execute_init(&self, ctx: &Context, force: bool) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = ctx.config_path();

        if config_path.exists() && !force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            );
        }

        let config = starter_config();
        config.save(config_path)?;
        info!(config_path = %config_path.display(), "Wrote starter configuration");

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Created {}", config_path.display()));
            formatter.info(&format!(
                "Export {DEFAULT_TOKEN_ENV} with a Drive access token, then run 'drivewatch poll'."
            ));
        }
        Ok(())
    }

    fn execute_set(&self, ctx: &Context, key: &str, value: &str) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = ctx.config_path();
        let mut config = ctx.load_config()?;

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{key}': {e}"));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {name:<40} - {help}"));
                }
            }
            return Ok(());
        }

        // Account entries cannot be edited with `set`
        let errors: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| !e.field.starts_with("accounts"))
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        if !errors.is_empty() {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{key}': {}", errors.join("; ")));
            }
            return Ok(());
        }

        config.save(config_path)?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {key} = {value}"));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }
        Ok(())
    }
}

fn starter_config() -> Config {
    let mut config = Config::default();
    config
        .accounts
        .push(AccountConfig::from_env("default", DEFAULT_TOKEN_ENV));
    config
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Expected a non-negative integer for {key}"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => anyhow::bail!("Expected true or false for {key}"),
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- drive ---
        "drive.api_base_url" => config.drive.api_base_url = value.to_string(),
        "drive.request_timeout_secs" => {
            config.drive.request_timeout_secs = parse_num(key, value)?;
        }
        "drive.max_pages_per_cycle" => config.drive.max_pages_per_cycle = parse_num(key, value)?,
        "drive.max_retries" => config.drive.max_retries = parse_num(key, value)?,

        // --- pipeline ---
        "pipeline.root_folder_name" => config.pipeline.root_folder_name = value.to_string(),
        "pipeline.marker_folder_name" => config.pipeline.marker_folder_name = value.to_string(),
        "pipeline.dedup_ttl_secs" => config.pipeline.dedup_ttl_secs = parse_num(key, value)?,
        "pipeline.relevance.mode" => {
            config.pipeline.relevance.mode = match value {
                "any" => RelevanceMode::Any,
                "created_within" => RelevanceMode::CreatedWithin,
                _ => anyhow::bail!("Expected any or created_within for {key}"),
            };
        }
        "pipeline.relevance.created_within_secs" => {
            config.pipeline.relevance.created_within_secs = parse_num(key, value)?;
        }

        // --- polling ---
        "polling.enabled" => config.polling.enabled = parse_bool(key, value)?,
        "polling.interval_secs" => config.polling.interval_secs = parse_num(key, value)?,

        // --- webhook ---
        "webhook.enabled" => config.webhook.enabled = parse_bool(key, value)?,
        "webhook.bind_address" => config.webhook.bind_address = value.to_string(),
        "webhook.public_url" => config.webhook.public_url = optional(value),
        "webhook.channel_ttl_secs" => config.webhook.channel_ttl_secs = parse_num(key, value)?,

        // --- notify ---
        "notify.log" => config.notify.log = parse_bool(key, value)?,
        "notify.broadcast_capacity" => {
            config.notify.broadcast_capacity = parse_num(key, value)?;
        }
        "notify.forward_url" => config.notify.forward_url = optional(value),
        "notify.history" => config.notify.history = parse_bool(key, value)?,
        "notify.history_retention_days" => {
            config.notify.history_retention_days = parse_num(key, value)?;
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),
        "logging.format" => config.logging.format = value.to_string(),

        // --- database ---
        "database.path" => config.database.path = PathBuf::from(value),

        _ => anyhow::bail!("Unknown configuration key: '{key}'"),
    }

    Ok(())
}
