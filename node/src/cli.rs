//! # CLI Interface
//!
//! Defines the command-line argument structure for `aidrail` using `clap`
//! derive. Everything here works offline: the binary prepares, signs,
//! stores and exports envelopes, and leaves the ledger connection to the
//! host that submits them.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// AIDRAIL offline payment tooling.
///
/// Prepares aid distributions as signed transaction batches that can be
/// stored on a field laptop and submitted once connectivity returns.
#[derive(Parser, Debug)]
#[command(
    name = "aidrail",
    about = "AIDRAIL offline aid-distribution tooling",
    version,
    propagate_version = true
)]
pub struct AidrailCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Data directory holding the configuration, key file and batch store.
    #[arg(
        long,
        short = 'd',
        global = true,
        env = "AIDRAIL_DATA_DIR",
        default_value = "./aidrail-data"
    )]
    pub data_dir: PathBuf,

    /// Configuration file. Defaults to `aidrail.toml` in the data directory.
    #[arg(long, short = 'c', global = true, env = "AIDRAIL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, a default configuration and a funding key.
    Init(InitArgs),
    /// Generate a keypair and print its account id.
    Keygen(KeygenArgs),
    /// Plan, sign and store a distribution as an offline batch.
    Distribute(DistributeArgs),
    /// List stored batches with per-status counts.
    Batches,
    /// Show every item of a batch.
    Show(BatchArgs),
    /// Print the pending envelopes of a batch, one base64 line each.
    Export(BatchArgs),
    /// Delete a batch.
    Purge(BatchArgs),
    /// Print version information and exit.
    Version,
}

/// Which network the configuration targets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Testnet,
    Mainnet,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    #[arg(long, value_enum, default_value_t = Network::Testnet)]
    pub network: Network,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `keygen` subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the hex secret to this file instead of printing it.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Arguments for the `distribute` subcommand.
#[derive(Args, Debug)]
pub struct DistributeArgs {
    /// Distribution plan (JSON).
    pub plan: PathBuf,

    /// Batch id to store under. A random id is used when omitted.
    #[arg(long, short = 'b')]
    pub batch: Option<String>,

    /// Funding key file. Defaults to the configured key file.
    #[arg(long, short = 'k')]
    pub key: Option<PathBuf>,

    /// Validate and plan only; nothing is signed or stored.
    #[arg(long)]
    pub dry_run: bool,
}

/// A single batch id argument.
#[derive(Args, Debug)]
pub struct BatchArgs {
    pub batch: String,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}
