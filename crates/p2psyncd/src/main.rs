//! Peer-group Link Synchronization Daemon
//!
//! Main entry point for the p2psyncd daemon.

use anyhow::{Context, Result};
use clap::Parser;
use sonic_p2psyncd::{
    ControlConfigListener, ControlInterface, DEFAULT_CONFIG_PATH, MetricsCollector,
    P2pSyncConfig,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "p2psyncd", version, about = "Peer-group link synchronization daemon")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Control interface to track, overrides the configuration file
    #[arg(short = 'i', long)]
    control_interface: Option<String>,

    /// Keep CONFIG_DB changes in memory instead of writing to Redis
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = P2pSyncConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(control) = &args.control_interface {
        config.p2p_route.control_interface = control.clone();
    }
    config.validate().context("invalid configuration")?;

    init_logging(&config.logging.level)?;
    info!("p2psyncd: Starting peer-group link synchronization daemon");

    match run_daemon(args, config).await {
        Ok(()) => {
            info!("p2psyncd: Daemon exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "p2psyncd: Daemon exiting with error");
            Err(e)
        }
    }
}

/// Initialize structured logging, RUST_LOG takes precedence over `level`
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set logger")?;
    Ok(())
}

#[cfg(target_os = "linux")]
async fn run_daemon(args: Args, config: P2pSyncConfig) -> Result<()> {
    use sonic_p2psyncd::{GroupLinkSync, MemoryConfigStore, P2pSyncDaemon, RedisConfigStore};

    let control = config.control_interface()?;
    let metrics = MetricsCollector::new().context("failed to register metrics")?;

    if config.metrics.enabled {
        let listen_addr = config.metrics.listen_addr;
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = sonic_p2psyncd::serve_metrics(listen_addr, metrics).await {
                error!(error = %e, "Metrics endpoint failed");
            }
        });
    }

    let listener = control_listener(&args, &control);

    if args.dry_run {
        info!("p2psyncd: Dry run, CONFIG_DB changes stay in memory");
        let sync = GroupLinkSync::new(MemoryConfigStore::new(), control, metrics);
        P2pSyncDaemon::new(sync, listener, &config)?.run().await?;
    } else {
        let db = &config.database;
        let store = RedisConfigStore::new(&db.redis_host, db.redis_port, db.config_db_number)
            .await
            .context("failed to connect to CONFIG_DB")?;
        info!(
            host = %db.redis_host,
            port = db.redis_port,
            db = db.config_db_number,
            "p2psyncd: Connected to CONFIG_DB"
        );
        let sync = GroupLinkSync::new(store, control, metrics);
        P2pSyncDaemon::new(sync, listener, &config)?.run().await?;
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run_daemon(_args: Args, _config: P2pSyncConfig) -> Result<()> {
    anyhow::bail!("p2psyncd requires Linux netlink support")
}

/// Control interface source for SIGHUP reloads
fn control_listener(args: &Args, control: &ControlInterface) -> ControlConfigListener {
    let listener = ControlConfigListener::new(&args.config);
    if args.control_interface.is_some() {
        listener.pinned(control.clone())
    } else {
        listener
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["p2psyncd"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.control_interface.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from([
            "p2psyncd",
            "--config",
            "/tmp/p2psyncd.conf",
            "--control-interface",
            "wlan0",
            "--dry-run",
        ]);
        assert_eq!(args.config, PathBuf::from("/tmp/p2psyncd.conf"));
        assert_eq!(args.control_interface.as_deref(), Some("wlan0"));
        assert!(args.dry_run);
    }

    #[test]
    fn test_cli_control_interface_is_pinned() {
        let args = Args::parse_from(["p2psyncd", "-i", "wlan1", "-c", "/nonexistent.conf"]);
        let control = ControlInterface::parse("wlan1").unwrap();
        let listener = control_listener(&args, &control);
        assert_eq!(listener.reload().unwrap(), control);
    }

    #[test]
    fn test_file_control_interface_not_pinned() {
        let args = Args::parse_from(["p2psyncd", "-c", "/nonexistent.conf"]);
        let listener = control_listener(&args, &ControlInterface::Any);
        assert!(listener.reload().is_err());
    }
}
