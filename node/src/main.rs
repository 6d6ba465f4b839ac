// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Passlock Ledger Node
//!
//! Entry point for the `passlock-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the ledger from disk, and
//! serves the HTTP/RPC/WS API.
//!
//! Subcommands:
//!
//! - `run`     — serve the ledger
//! - `init`    — create a data directory with a default config
//! - `quote`   — price a transfer offline
//! - `status`  — query a running node's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use passlock_contracts::{Transfer, TransferLedger};
use passlock_protocol::config::{is_known_network, NETWORK_DEVNET, PROTOCOL_VERSION};
use passlock_protocol::storage::LedgerDb;
use passlock_protocol::timing::SystemClock;

use cli::{Commands, PasslockCli};
use logging::LogFormat;
use metrics::LedgerMetrics;

/// Broadcast channel capacity for live event streaming.
/// Large enough to absorb short bursts without dropping events for
/// connected WebSocket clients.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PasslockCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Quote(args) => print_quote(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Restores the ledger and serves it until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format)?;

    if !is_known_network(&args.network) {
        bail!("unknown network '{}'", args.network);
    }

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        network = %args.network,
        data_dir = %args.data_dir.display(),
        "starting passlock-node"
    );

    let ledger_config = config::load_ledger_config(&args.ledger, Some(&args.data_dir))?;
    tracing::info!(
        cancel_cooldown_secs = ledger_config.cancel_cooldown_secs,
        min_password_length = ledger_config.min_password_length,
        treasury = ?ledger_config.treasury,
        "ledger config loaded"
    );

    // --- Persistent storage ---
    let db = Arc::new(open_db(&args.data_dir)?);

    // --- Ledger ---
    let book = Arc::new(api::load_book(&db)?);
    let records: Vec<Transfer> = db
        .load_transfers()
        .context("failed to load stored transfers")?;
    let next_id = db.next_transfer_id()?;
    let ledger = TransferLedger::restore(
        ledger_config,
        book.clone(),
        Arc::new(SystemClock),
        records,
        next_id,
    )
    .context("failed to restore ledger from storage")?;

    // --- Metrics ---
    let ledger_metrics = Arc::new(LedgerMetrics::new().context("failed to register metrics")?);
    let stats = ledger.stats();
    ledger_metrics.set_counts(stats.pending, stats.total);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let faucet_enabled = args.faucet || args.network == NETWORK_DEVNET;
    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        network: args.network.clone(),
        ledger: Arc::new(ledger),
        book,
        db: Arc::clone(&db),
        persist_lock: Arc::default(),
        event_tx,
        metrics: Arc::clone(&ledger_metrics),
        faucet_enabled,
    };
    if faucet_enabled {
        tracing::warn!("faucet enabled: POST /faucet mints balances");
    }

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&ledger_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    db.flush().context("failed to flush database")?;
    tracing::info!("passlock-node stopped");
    Ok(())
}

fn open_db(data_dir: &Path) -> Result<LedgerDb> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(
        path = %db_path.display(),
        transfers = db.transfer_count(),
        "database opened"
    );
    Ok(db)
}

/// Creates the data directory, writes a default `config.json` unless one is
/// already there, and opens the database once so it exists on disk.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("passlock_node=info", LogFormat::Pretty)?;

    if !is_known_network(&args.network) {
        bail!("unknown network '{}'", args.network);
    }

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), network = %args.network, "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(config::CONFIG_FILE_NAME);
    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "keeping existing config");
    } else {
        config::write_config_file(&config_path, &Default::default())?;
        tracing::info!(path = %config_path.display(), "default config written");
    }

    open_db(data_dir)?.flush()?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Network        : {}", args.network);
    println!("  Ledger config  : {}", config_path.display());

    Ok(())
}

/// Prices a transfer with the configured schedule. No node required.
fn print_quote(args: cli::QuoteArgs) -> Result<()> {
    let ledger_config = config::load_ledger_config(&args.ledger, None)?;
    let quote = ledger_config
        .fees
        .quote(args.amount)
        .context("failed to compute fee")?;

    println!("amount : {}", quote.amount);
    println!("fee    : {}", quote.fee);
    println!("total  : {}", quote.total);
    println!("tier   : {:?}", quote.tier);
    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Plain-HTTP GET over a raw tokio socket. Enough for `status`; no TLS.
async fn http_get(url: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (host, port, path) = split_http_url(url)?;
    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// `http://host[:port][/path]` into its parts. Port defaults to 80.
fn split_http_url(url: &str) -> Result<(String, u16, String)> {
    let rest = url.strip_prefix("http://").unwrap_or(url);
    if rest.contains("://") {
        bail!("only http:// URLs are supported: {}", url);
    }

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        bail!("missing host in URL: {}", url);
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("bad port in URL: {}", url))?;
            (host, port)
        }
        None => (authority, 80),
    };

    Ok((host.to_string(), port, path.to_string()))
}

/// Prints version information to stdout.
fn print_version() {
    println!("passlock-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol      {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler can't be
/// installed the node logs it and keeps running on the other one.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_with_port_and_path() {
        let (host, port, path) = split_http_url("http://127.0.0.1:9841/status").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 9841);
        assert_eq!(path, "/status");
    }

    #[test]
    fn url_defaults() {
        let (host, port, path) = split_http_url("localhost").unwrap();
        assert_eq!((host.as_str(), port, path.as_str()), ("localhost", 80, "/"));
    }

    #[test]
    fn https_is_rejected() {
        assert!(split_http_url("https://node.example/status").is_err());
    }

    #[test]
    fn init_then_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("node");
        std::fs::create_dir_all(&data_dir).unwrap();
        config::write_config_file(
            &data_dir.join(config::CONFIG_FILE_NAME),
            &Default::default(),
        )
        .unwrap();

        let db = open_db(&data_dir).unwrap();
        assert_eq!(db.transfer_count(), 0);
        let loaded =
            config::load_ledger_config(&cli::LedgerOverrides::default(), Some(&data_dir)).unwrap();
        assert_eq!(loaded, passlock_contracts::LedgerConfig::default());
    }
}
