//! # CLI Interface
//!
//! Defines the command-line argument structure for `passlock-node` using
//! `clap` derive. Supports five subcommands: `run`, `init`, `quote`,
//! `status`, and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use passlock_protocol::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT, NETWORK_DEVNET};

use crate::logging::LogFormat;

/// Passlock ledger node.
///
/// Hosts a password-gated escrow ledger and serves it over REST, JSON-RPC
/// and WebSocket, with Prometheus metrics on a separate port.
#[derive(Parser, Debug)]
#[command(
    name = "passlock-node",
    about = "Passlock password-gated escrow ledger node",
    version,
    propagate_version = true
)]
pub struct PasslockCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Passlock node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ledger node.
    Run(RunArgs),
    /// Initialize a data directory with a default ledger config.
    Init(InitArgs),
    /// Preview the fee for an amount without talking to a node.
    Quote(QuoteArgs),
    /// Query the status of a running node via its RPC endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Ledger settings that can override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct LedgerOverrides {
    /// Path to a JSON ledger config file.
    ///
    /// When omitted, the node looks for `config.json` in the data directory
    /// and falls back to built-in defaults.
    #[arg(long, short = 'c', env = "PASSLOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sender-exclusive cancel window, in seconds.
    #[arg(long, env = "PASSLOCK_CANCEL_COOLDOWN_SECS")]
    pub cancel_cooldown_secs: Option<u64>,

    /// Minimum claim password length, in characters.
    #[arg(long, env = "PASSLOCK_MIN_PASSWORD_LENGTH")]
    pub min_password_length: Option<usize>,

    /// Account credited with transfer fees.
    #[arg(long, env = "PASSLOCK_TREASURY")]
    pub treasury: Option<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub ledger: LedgerOverrides,

    /// Path to the node data directory where transfers and balances are stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "PASSLOCK_DATA_DIR", default_value = "./passlock-data")]
    pub data_dir: PathBuf,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "PASSLOCK_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "PASSLOCK_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Network label: mainnet, testnet, or devnet.
    #[arg(long, env = "PASSLOCK_NETWORK", default_value = NETWORK_DEVNET)]
    pub network: String,

    /// Enable `POST /faucet`. Always on for devnet.
    #[arg(long, env = "PASSLOCK_FAUCET")]
    pub faucet: bool,

    /// Log output format.
    #[arg(long, env = "PASSLOCK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "PASSLOCK_DATA_DIR", default_value = "./passlock-data")]
    pub data_dir: PathBuf,

    /// Network to configure for: mainnet, testnet, or devnet.
    #[arg(long, default_value = NETWORK_DEVNET)]
    pub network: String,
}

/// Arguments for the `quote` subcommand.
#[derive(Parser, Debug)]
pub struct QuoteArgs {
    /// Amount to lock, in smallest units.
    pub amount: u64,

    #[command(flatten)]
    pub ledger: LedgerOverrides,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// RPC endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:9841")]
    pub rpc_url: String,
}
