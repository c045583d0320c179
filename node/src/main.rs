// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AIDRAIL Operator CLI
//!
//! Entry point for the `aidrail` binary. Parses CLI arguments, loads the
//! configuration, initializes logging and dispatches to a subcommand:
//!
//! - `init`      : data directory, default config, funding key
//! - `keygen`    : generate a keypair
//! - `distribute`: plan JSON to a signed offline batch
//! - `batches`   : list stored batches
//! - `show`      : item-level view of one batch
//! - `export`    : pending envelopes as base64 lines
//! - `purge`     : delete a batch
//! - `version`   : print build version information

mod cli;
mod config;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use aidrail_contracts::distribution::{plan_intents, sign_all, DistributionPlan};
use aidrail_protocol::config::ENVELOPE_VERSION;
use aidrail_protocol::crypto::AccountKeypair;
use aidrail_protocol::storage::{BatchId, ItemStatus, OfflineBatchStore, SledBackend};
use aidrail_protocol::transaction::builder::INTENT_VERSION;
use aidrail_protocol::transaction::TransactionBuilder;
use aidrail_protocol::LedgerConfig;

use cli::{AidrailCli, BatchArgs, Commands, DistributeArgs, GlobalArgs, InitArgs, KeygenArgs, Network};
use config::{NodeConfig, CONFIG_FILE};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = AidrailCli::parse();
    let workspace = Workspace::load(&cli.global)?;
    logging::init_logging(
        &workspace.config.logging.level,
        LogFormat::from_str_lossy(&workspace.config.logging.format),
    );

    match cli.command {
        Commands::Init(args) => init(&workspace, args),
        Commands::Keygen(args) => keygen(args),
        Commands::Distribute(args) => distribute(&workspace, &workspace.store()?, args),
        Commands::Batches => list_batches(&workspace.store()?),
        Commands::Show(args) => show_batch(&workspace, &workspace.store()?, args),
        Commands::Export(args) => export_batch(&workspace.store()?, args),
        Commands::Purge(args) => purge_batch(&workspace.store()?, args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Resolved data directory plus the configuration loaded from it.
struct Workspace {
    data_dir: PathBuf,
    config_path: PathBuf,
    config: NodeConfig,
}

impl Workspace {
    fn load(global: &GlobalArgs) -> Result<Self> {
        let config_path = global
            .config
            .clone()
            .unwrap_or_else(|| global.data_dir.join(CONFIG_FILE));
        let config = NodeConfig::load(&config_path)?;
        Ok(Self {
            data_dir: global.data_dir.clone(),
            config_path,
            config,
        })
    }

    fn store(&self) -> Result<OfflineBatchStore<SledBackend>> {
        let path = self.config.db_path(&self.data_dir);
        let backend = SledBackend::open(&path)
            .with_context(|| format!("failed to open batch store at {}", path.display()))?;
        Ok(OfflineBatchStore::new(backend))
    }

    fn builder(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.config.ledger.clone())
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Writes a hex secret key readable only by the owner.
fn write_key_file(path: &Path, keypair: &AccountKeypair) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create key file {}", path.display()))?;

    // `mode` only applies on creation; tighten a pre-existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(keypair.secret_key_hex().as_bytes())
        .with_context(|| format!("failed to write key to {}", path.display()))?;
    Ok(())
}

fn read_key_file(path: &Path) -> Result<AccountKeypair> {
    let hex = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    AccountKeypair::from_hex(&hex).with_context(|| format!("invalid key in {}", path.display()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn init(workspace: &Workspace, args: InitArgs) -> Result<()> {
    let data_dir = &workspace.data_dir;
    tracing::info!(data_dir = %data_dir.display(), network = ?args.network, "initializing data directory");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let mut config = workspace.config.clone();
    config.ledger = match args.network {
        Network::Testnet => LedgerConfig::testnet(),
        Network::Mainnet => LedgerConfig::mainnet(),
    };
    config.save(&workspace.config_path)?;

    let key_path = config.key_path(data_dir);
    if key_path.exists() && !args.force {
        bail!(
            "key file {} already exists; pass --force to replace it",
            key_path.display()
        );
    }
    let keypair = AccountKeypair::generate();
    write_key_file(&key_path, &keypair)?;

    tracing::info!(account = %keypair.account_id(), key_path = %key_path.display(), "funding key generated");

    println!("Data directory initialized.");
    println!("  Config   : {}", workspace.config_path.display());
    println!("  Key file : {}", key_path.display());
    println!("  Account  : {}", keypair.account_id());
    Ok(())
}

fn keygen(args: KeygenArgs) -> Result<()> {
    let keypair = AccountKeypair::generate();
    match args.out {
        Some(path) => {
            write_key_file(&path, &keypair)?;
            println!("account {}", keypair.account_id());
            println!("secret  written to {}", path.display());
        }
        None => {
            println!("account {}", keypair.account_id());
            println!("secret  {}", keypair.secret_key_hex());
        }
    }
    Ok(())
}

fn distribute(
    workspace: &Workspace,
    store: &OfflineBatchStore<SledBackend>,
    args: DistributeArgs,
) -> Result<()> {
    let raw = std::fs::read_to_string(&args.plan)
        .with_context(|| format!("failed to read plan {}", args.plan.display()))?;
    let plan: DistributionPlan = serde_json::from_str(&raw)
        .with_context(|| format!("malformed plan {}", args.plan.display()))?;

    let builder = workspace.builder();
    let intents = plan_intents(&builder, &plan)?;
    let total = plan.total(&builder)?;

    if args.dry_run {
        println!(
            "plan ok: {} recipients, {} transactions, total {} {}",
            plan.recipients.len(),
            intents.len(),
            total,
            plan.asset
        );
        return Ok(());
    }

    let key_path = args
        .key
        .unwrap_or_else(|| workspace.config.key_path(&workspace.data_dir));
    let credential = read_key_file(&key_path)?;
    let envelopes = sign_all(&builder, intents, &credential)?;

    let batch_id = match args.batch {
        Some(id) => BatchId::new(id)?,
        None => BatchId::random(),
    };
    if store.batch(&batch_id).is_ok() {
        bail!("batch {batch_id} already exists");
    }
    store.put(&batch_id, &envelopes)?;

    tracing::info!(
        batch = %batch_id,
        transactions = envelopes.len(),
        total = %total,
        "distribution stored"
    );
    println!("{batch_id}");
    Ok(())
}

fn list_batches(store: &OfflineBatchStore<SledBackend>) -> Result<()> {
    for id in store.batch_ids()? {
        let batch = store.batch(&id)?;
        let summary = batch.summary();
        let created = chrono::DateTime::from_timestamp(batch.created_at, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| batch.created_at.to_string());
        println!(
            "{id}  created={created}  pending={}  submitted={}  failed={}",
            summary.pending, summary.submitted, summary.failed
        );
    }
    Ok(())
}

/// One line of `aidrail show`.
#[derive(Debug, Serialize)]
struct ItemView {
    index: usize,
    sequence: u64,
    operations: usize,
    tx_hash: String,
    status: ItemStatus,
}

fn show_batch(
    workspace: &Workspace,
    store: &OfflineBatchStore<SledBackend>,
    args: BatchArgs,
) -> Result<()> {
    let id = BatchId::new(args.batch)?;
    let network = workspace.config.ledger.network_id();
    let views: Vec<ItemView> = store
        .get(&id)?
        .into_iter()
        .enumerate()
        .map(|(index, (envelope, status))| ItemView {
            index,
            sequence: envelope.intent.sequence,
            operations: envelope.intent.operations.len(),
            tx_hash: envelope.intent.hash_hex(&network),
            status,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for view in &views {
            println!(
                "#{:<4} seq={:<10} ops={:<3} {}  {}",
                view.index, view.sequence, view.operations, view.tx_hash, view.status
            );
        }
    }
    Ok(())
}

fn export_batch(store: &OfflineBatchStore<SledBackend>, args: BatchArgs) -> Result<()> {
    let id = BatchId::new(args.batch)?;
    let pending = store.pending_encoded(&id)?;
    for (index, item) in pending {
        if args.json {
            println!(
                "{}",
                serde_json::json!({ "index": index, "envelope": item.envelope })
            );
        } else {
            println!("{}", item.envelope);
        }
    }
    Ok(())
}

fn purge_batch(store: &OfflineBatchStore<SledBackend>, args: BatchArgs) -> Result<()> {
    let id = BatchId::new(args.batch)?;
    if !store.purge(&id)? {
        bail!("batch {id} not found");
    }
    println!("purged {id}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("aidrail  {}", env!("CARGO_PKG_VERSION"));
    println!("envelope v{ENVELOPE_VERSION}");
    println!("intent   v{INTENT_VERSION}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidrail_contracts::distribution::Recipient;

    fn workspace(dir: &Path) -> Workspace {
        Workspace::load(&GlobalArgs {
            data_dir: dir.to_path_buf(),
            config: None,
        })
        .unwrap()
    }

    fn write_plan(dir: &Path, source: &AccountKeypair, amounts: &[&str]) -> PathBuf {
        let plan = DistributionPlan {
            source: source.account_id().to_string(),
            asset: "native".into(),
            start_sequence: 11,
            fee_per_op: 100,
            ops_per_transaction: 2,
            valid_from: None,
            valid_until: None,
            recipients: amounts
                .iter()
                .enumerate()
                .map(|(i, amount)| Recipient {
                    destination: AccountKeypair::from_seed(&[30 + i as u8; 32])
                        .account_id()
                        .to_string(),
                    amount: amount.to_string(),
                })
                .collect(),
        };
        let path = dir.join("plan.json");
        std::fs::write(&path, serde_json::to_string(&plan).unwrap()).unwrap();
        path
    }

    #[test]
    fn init_writes_config_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        init(
            &ws,
            InitArgs {
                network: Network::Mainnet,
                force: false,
            },
        )
        .unwrap();

        let saved = NodeConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(saved.ledger, LedgerConfig::mainnet());
        assert!(read_key_file(&saved.key_path(dir.path())).is_ok());

        let again = init(
            &ws,
            InitArgs {
                network: Network::Testnet,
                force: false,
            },
        );
        assert!(again.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("field.key");
        let keypair = AccountKeypair::from_seed(&[9u8; 32]);
        write_key_file(&path, &keypair).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(read_key_file(&path).unwrap(), keypair);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        write_key_file(&path, &AccountKeypair::from_seed(&[8u8; 32])).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn distribute_stores_a_pending_batch() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let store = ws.store().unwrap();
        let funder = AccountKeypair::from_seed(&[5u8; 32]);
        write_key_file(&ws.config.key_path(dir.path()), &funder).unwrap();
        let plan = write_plan(dir.path(), &funder, &["1", "2.5", "3"]);

        distribute(
            &ws,
            &store,
            DistributeArgs {
                plan,
                batch: Some("round-1".into()),
                key: None,
                dry_run: false,
            },
        )
        .unwrap();

        let id = BatchId::new("round-1").unwrap();
        let items = store.get(&id).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|(_, status)| status.is_pending()));
        assert_eq!(items[1].0.intent.sequence, 12);
    }

    #[test]
    fn dry_run_stores_nothing_and_bad_plan_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let store = ws.store().unwrap();
        let funder = AccountKeypair::from_seed(&[5u8; 32]);

        let plan = write_plan(dir.path(), &funder, &["1"]);
        distribute(
            &ws,
            &store,
            DistributeArgs {
                plan,
                batch: Some("dry".into()),
                key: None,
                dry_run: true,
            },
        )
        .unwrap();
        assert!(store.batch_ids().unwrap().is_empty());

        let bad = write_plan(dir.path(), &funder, &["1", "-4"]);
        assert!(distribute(
            &ws,
            &store,
            DistributeArgs {
                plan: bad,
                batch: None,
                key: None,
                dry_run: true,
            },
        )
        .is_err());
    }

    #[test]
    fn purge_unknown_batch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = workspace(dir.path()).store().unwrap();
        assert!(purge_batch(
            &store,
            BatchArgs {
                batch: "missing".into(),
                json: false,
            },
        )
        .is_err());
    }
}
