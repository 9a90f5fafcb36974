//! DriveWatch Daemon - Background change-notification service
//!
//! This binary runs as a long-lived service and handles:
//! - One classification pipeline per configured Drive account
//! - Periodic polling of each account's change feed
//! - An HTTP receiver for Drive push notifications, plus channel renewal
//! - A `GET /events` stream of classified changes on the same server
//! - Daily pruning of the event history
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Every account gets a [`PipelineRunner`]. The poll scheduler and the
//! webhook receiver both trigger it, and the runner drops a trigger while a
//! cycle is in flight. All background tasks share a `CancellationToken`
//! that is cancelled on receipt of SIGTERM or SIGINT.

use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use drivewatch_cache::{DatabasePool, SqliteCursorStore, SqliteEventLog};
use chrono::Utc;
use drivewatch_core::{
    config::{AccountConfig, Config, LoggingConfig},
    domain::AccountId,
    ports::{INotificationSink, IRemoteStore},
};
use drivewatch_gdrive::{watch::WatchRequest, DriveRemoteStore};
use drivewatch_sync::{
    BroadcastSink, ChangePoller, ForwardSink, LogSink, PipelineRunner, PollScheduler,
    WebhookServer,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configuration file location
const CONFIG_ENV: &str = "DRIVEWATCH_CONFIG";

/// Delay before retrying a failed channel registration
const CHANNEL_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Period of the history retention pass
const PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 3600);

// ============================================================================
// AccountPipeline
// ============================================================================

/// Everything the daemon keeps per monitored account
struct AccountPipeline {
    account_id: AccountId,
    remote: Arc<DriveRemoteStore>,
    runner: Arc<PipelineRunner>,
}

// ============================================================================
// DaemonService
// ============================================================================

/// Wires configuration, storage, pipelines and triggers together
struct DaemonService {
    config: Config,
    db_pool: DatabasePool,
    /// Feeds `GET /events`; only exists when the webhook server runs.
    /// Shared by all accounts so one client sees every event.
    broadcast: Option<BroadcastSink>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database named in the configuration
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_path = &config.database.path;
        let db_pool = DatabasePool::new(db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        let broadcast = config
            .webhook
            .enabled
            .then(|| BroadcastSink::new(config.notify.broadcast_capacity));

        Ok(Self {
            config,
            db_pool,
            broadcast,
            shutdown,
        })
    }

    /// Builds the remote store, cursor store, sinks and runner of one account
    fn build_pipeline(&self, account: &AccountConfig) -> Result<AccountPipeline> {
        let account_id = account.account_id()?;
        let token = account
            .resolve_token()
            .with_context(|| format!("No access token for account '{}'", account.id))?;

        let remote = Arc::new(
            DriveRemoteStore::from_config(&self.config.drive, token)
                .context("Failed to build Drive client")?,
        );
        let cursor_store = Arc::new(SqliteCursorStore::new(
            self.db_pool.pool().clone(),
            account_id.clone(),
        ));

        let poller = ChangePoller::from_config(
            account_id.clone(),
            Arc::clone(&remote) as Arc<dyn IRemoteStore>,
            cursor_store,
            &self.config.pipeline,
        );
        let runner = Arc::new(PipelineRunner::new(poller, self.sinks_for(&account_id)?));

        Ok(AccountPipeline {
            account_id,
            remote,
            runner,
        })
    }

    fn sinks_for(&self, account_id: &AccountId) -> Result<Vec<Arc<dyn INotificationSink>>> {
        let notify = &self.config.notify;
        let mut sinks: Vec<Arc<dyn INotificationSink>> = Vec::new();

        if notify.log {
            sinks.push(Arc::new(LogSink::new(account_id.clone())));
        }
        if let Some(broadcast) = &self.broadcast {
            sinks.push(Arc::new(broadcast.clone()));
        }
        if let Some(url) = &notify.forward_url {
            sinks.push(Arc::new(ForwardSink::new(url.clone())?));
        }
        if notify.history {
            sinks.push(Arc::new(SqliteEventLog::new(
                self.db_pool.pool().clone(),
                account_id.clone(),
            )));
        }

        Ok(sinks)
    }

    /// Starts every trigger and waits for shutdown
    async fn run(&self) -> Result<()> {
        let pipelines = self
            .config
            .accounts
            .iter()
            .map(|account| self.build_pipeline(account))
            .collect::<Result<Vec<_>>>()?;

        let mut tasks = JoinSet::new();

        if self.config.polling.enabled {
            let interval = Duration::from_secs(self.config.polling.interval_secs);
            for pipeline in &pipelines {
                let scheduler = PollScheduler::new(Arc::clone(&pipeline.runner), interval);
                tasks.spawn(scheduler.run(self.shutdown.child_token()));
            }
        }

        if self.config.webhook.enabled {
            let mut server = WebhookServer::new(
                &self.config.webhook.bind_address,
                pipelines.iter().map(|p| Arc::clone(&p.runner)),
            )
            .context("Invalid webhook bind address")?;
            if let Some(broadcast) = &self.broadcast {
                server = server.with_events(broadcast.clone());
            }
            let token = self.shutdown.child_token();
            tasks.spawn(async move {
                if let Err(e) = server.run(token).await {
                    error!(error = %format!("{e:#}"), "Webhook server failed");
                }
            });

            if let Some(public_url) = &self.config.webhook.public_url {
                let ttl = Duration::from_secs(self.config.webhook.channel_ttl_secs);
                for pipeline in &pipelines {
                    tasks.spawn(keep_channel(
                        Arc::clone(&pipeline.remote),
                        channel_address(public_url, &pipeline.account_id),
                        pipeline.account_id.clone(),
                        ttl,
                        self.shutdown.child_token(),
                    ));
                }
            } else {
                info!("webhook.public_url not set, push channels are not registered");
            }
        }

        let retention_days = self.config.notify.history_retention_days;
        if self.config.notify.history && retention_days > 0 {
            let logs: Vec<SqliteEventLog> = pipelines
                .iter()
                .map(|p| SqliteEventLog::new(self.db_pool.pool().clone(), p.account_id.clone()))
                .collect();
            tasks.spawn(keep_history_trimmed(
                logs,
                retention_days,
                self.shutdown.child_token(),
            ));
        }

        info!(
            accounts = pipelines.len(),
            polling = self.config.polling.enabled,
            webhook = self.config.webhook.enabled,
            "Daemon running"
        );

        self.shutdown.cancelled().await;
        info!("Waiting for background tasks to finish");
        while tasks.join_next().await.is_some() {}

        self.db_pool.close().await;
        Ok(())
    }
}

// ============================================================================
// Push channels
// ============================================================================

/// URL Drive should call for `account`
fn channel_address(public_url: &str, account: &AccountId) -> String {
    format!("{}/webhook/{}", public_url.trim_end_matches('/'), account)
}

/// How long to wait before renewing a channel registered for `ttl`
fn renew_after(ttl: Duration) -> Duration {
    ttl.saturating_sub(ttl / 10).max(Duration::from_secs(60))
}

/// Keeps one push channel registered for `account` until shutdown
///
/// A replacement channel is registered before the old one is stopped, so
/// notifications are not lost during renewal.
async fn keep_channel(
    remote: Arc<DriveRemoteStore>,
    address: String,
    account: AccountId,
    ttl: Duration,
    shutdown: CancellationToken,
) {
    let mut current = None;

    loop {
        let registered = match remote.get_start_cursor().await {
            Ok(cursor) => {
                let request = WatchRequest::web_hook(address.clone(), Some(account.to_string()), ttl);
                remote.watch(&cursor, &request).await.map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        let wait = match registered {
            Ok(channel) => {
                if let Some(old) = current.replace(channel) {
                    if let Err(e) = remote.stop_watch(&old).await {
                        warn!(account = %account, channel = %old.id, error = %e, "Failed to stop renewed channel");
                    }
                }
                renew_after(ttl)
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Failed to register push channel");
                CHANNEL_RETRY_DELAY
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    if let Some(channel) = current {
        match remote.stop_watch(&channel).await {
            Ok(()) => info!(account = %account, channel = %channel.id, "Push channel stopped"),
            Err(e) => warn!(account = %account, channel = %channel.id, error = %e, "Failed to stop push channel"),
        }
    }
}

// ============================================================================
// History retention
// ============================================================================

/// Deletes history older than `retention_days` from every log
async fn prune_history(logs: &[SqliteEventLog], retention_days: u32) -> u64 {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
    let mut removed = 0;
    for log in logs {
        match log.prune_before(cutoff).await {
            Ok(n) => removed += n,
            Err(e) => warn!(error = %e, "Failed to prune event history"),
        }
    }
    removed
}

/// Prunes at startup and then once a day until shutdown
async fn keep_history_trimmed(
    logs: Vec<SqliteEventLog>,
    retention_days: u32,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = prune_history(&logs, retention_days).await;
                if removed > 0 {
                    info!(removed, retention_days, "Pruned event history");
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

/// Configuration file location: `$DRIVEWATCH_CONFIG`, else the default path
fn config_path(env_value: Option<String>) -> (PathBuf, bool) {
    match env_value.filter(|v| !v.is_empty()) {
        Some(path) => (PathBuf::from(path), true),
        None => (Config::default_path(), false),
    }
}

/// Loads and validates the configuration
///
/// An explicitly named file must exist; the default location may be absent.
fn load_config() -> Result<Config> {
    let (path, explicit) = config_path(std::env::var(CONFIG_ENV).ok());
    let config = if explicit {
        Config::load(&path)?
    } else {
        Config::load_or_default(&path)
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!(
            "Invalid configuration in {}:\n  {}",
            path.display(),
            details.join("\n  ")
        );
    }
    if config.accounts.is_empty() {
        anyhow::bail!(
            "No accounts configured in {}. Add an entry under 'accounts'.",
            path.display()
        );
    }

    Ok(config)
}

/// Installs the global subscriber; `RUST_LOG` wins over `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    info!(accounts = config.accounts.len(), "DriveWatch daemon starting (drivewatchd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("DriveWatch daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "DriveWatch daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
