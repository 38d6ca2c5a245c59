//! DropCraft CLI
//!
//! Build distribution trees, publish roots, and settle claims against a
//! local file-backed distributor.

mod local;
mod tree_file;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use dropcraft_core::{compute_leaf, AccountId, Amount, AssetId, Hash};
use dropcraft_distributor::{AssetLedger, ClaimOutcome};
use dropcraft_logging::LogLevel;
use dropcraft_merkle::verify;
use dropcraft_settings::{default_settings_path, Settings};

use local::LocalNode;
use tree_file::{load_entitlements, TreeFile};

/// DropCraft - Merkle-proof rewards distributor
#[derive(Parser)]
#[command(name = "dropcraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the administrator into the settings file
    Init {
        /// Administrator address
        #[arg(long)]
        admin: AccountId,

        /// Custody account address
        #[arg(long)]
        custodian: Option<AccountId>,

        /// Replace an already configured administrator
        #[arg(long)]
        force: bool,
    },

    /// Print the leaf hash for an entitlement
    Leaf {
        #[arg(long)]
        asset: AssetId,
        #[arg(long)]
        recipient: AccountId,
        #[arg(long)]
        amount: Amount,
    },

    /// Build per-asset Merkle trees and proofs from an entitlement list
    BuildTree {
        /// JSON array of {asset, recipient, amount}
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write roots and proofs
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a proof against a root offline
    Verify {
        #[arg(long)]
        leaf: Hash,
        #[arg(long)]
        root: Hash,
        /// Comma-separated sibling hashes, leaf level first
        #[arg(long, value_delimiter = ',')]
        proof: Vec<Hash>,
    },

    /// Publish the Merkle root for an asset (administrator only)
    SetRoot {
        /// Account performing the call
        #[arg(long)]
        caller: AccountId,
        #[arg(long)]
        asset: AssetId,
        #[arg(long)]
        root: Hash,
    },

    /// Show the current root for an asset
    Root {
        #[arg(long)]
        asset: AssetId,
    },

    /// List registered assets with their roots and custody balances
    Assets,

    /// Mint funds into the custody account of the local ledger
    Fund {
        #[arg(long)]
        asset: AssetId,
        #[arg(long)]
        amount: Amount,
    },

    /// Settle an entitlement
    Claim {
        #[arg(long)]
        asset: AssetId,
        #[arg(long)]
        recipient: AccountId,
        /// Required unless it can be read from --tree
        #[arg(long)]
        amount: Option<Amount>,
        /// Comma-separated sibling hashes, leaf level first
        #[arg(long, value_delimiter = ',', conflicts_with = "tree")]
        proof: Vec<Hash>,
        /// Tree file from `build-tree` to take the proof from
        #[arg(long)]
        tree: Option<PathBuf>,
    },

    /// Show an account's balance on the local ledger
    Balance {
        #[arg(long)]
        asset: AssetId,
        /// Defaults to the custody account
        #[arg(long)]
        account: Option<AccountId>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let settings = Settings::load_from(&settings_path)
        .with_context(|| format!("Failed to load settings from {:?}", settings_path))?;

    let level = settings
        .logging
        .level
        .parse::<LogLevel>()
        .unwrap_or_default()
        .raised_by(cli.verbose);
    dropcraft_logging::init_with_target(level, settings.logging.show_target)
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Init { admin, custodian, force } => init(settings, admin, custodian, force),
        Commands::Leaf { asset, recipient, amount } => {
            println!("{}", compute_leaf(&asset, &recipient, amount));
            Ok(())
        }
        Commands::BuildTree { input, output } => build_tree(&input, output.as_deref()),
        Commands::Verify { leaf, root, proof } => {
            if verify(&leaf, &proof, &root) {
                println!("valid");
                Ok(())
            } else {
                println!("invalid");
                std::process::exit(1);
            }
        }
        Commands::SetRoot { caller, asset, root } => {
            let node = LocalNode::open(&settings)?;
            node.distributor.set_root_for_asset(&caller, asset, root)?;
            println!("Root for {} set to {}", asset, root);
            Ok(())
        }
        Commands::Root { asset } => {
            let node = LocalNode::open(&settings)?;
            let root = node.distributor.root_for_asset(&asset);
            if root.is_zero() {
                println!("No root published for {}", asset);
            } else {
                println!("{}", root);
            }
            Ok(())
        }
        Commands::Assets => list_assets(&settings),
        Commands::Fund { asset, amount } => {
            let node = LocalNode::open(&settings)?;
            let custody = node.ledger.custody_account();
            node.ledger.mint(&asset, &custody, amount)?;
            println!(
                "Custody balance of {}: {}",
                asset,
                node.distributor.custody_balance(&asset)
            );
            Ok(())
        }
        Commands::Claim {
            asset,
            recipient,
            amount,
            proof,
            tree,
        } => claim(&settings, asset, recipient, amount, proof, tree),
        Commands::Balance { asset, account } => {
            let node = LocalNode::open(&settings)?;
            let account = account.unwrap_or_else(|| node.ledger.custody_account());
            println!("{}", node.ledger.balance_of(&asset, &account));
            Ok(())
        }
    }
}

fn init(
    mut settings: Settings,
    admin: AccountId,
    custodian: Option<AccountId>,
    force: bool,
) -> Result<()> {
    if let Some(existing) = settings.distributor.administrator_address()? {
        if existing != admin && !force {
            bail!(
                "Administrator already set to {}; pass --force to replace it",
                existing
            );
        }
    }

    settings.distributor.administrator = Some(admin.to_string());
    if let Some(custodian) = custodian {
        settings.distributor.custodian = custodian.to_string();
    }
    settings.save()?;

    info!("Administrator set to {}", admin);
    println!("Administrator: {}", admin);
    println!("Custodian:     {}", settings.distributor.custodian);
    if let Some(path) = settings.config_path() {
        println!("Settings:      {}", path.display());
    }
    Ok(())
}

fn build_tree(input: &Path, output: Option<&Path>) -> Result<()> {
    let entitlements = load_entitlements(input)?;
    if entitlements.is_empty() {
        bail!("{:?} contains no entitlements", input);
    }

    let file = TreeFile::build(&entitlements)?;
    for tree in &file.trees {
        let total: Amount = tree
            .claims
            .iter()
            .try_fold(0u128, |acc, c| acc.checked_add(c.amount))
            .context("Entitlement total overflows")?;
        println!(
            "{}  root {}  ({} entitlements, total {})",
            tree.asset,
            tree.root,
            tree.claims.len(),
            total
        );
    }

    if let Some(path) = output {
        file.save(path)?;
        info!("Wrote {} trees to {:?}", file.trees.len(), path);
    }
    Ok(())
}

fn list_assets(settings: &Settings) -> Result<()> {
    let node = LocalNode::open(settings)?;
    let assets = node.distributor.registered_assets();
    if assets.is_empty() {
        println!("No assets registered");
        return Ok(());
    }

    println!("Registered Assets");
    println!("=================");
    for asset in assets {
        println!(
            "{}  root {}  custody {}",
            asset,
            node.distributor.root_for_asset(&asset),
            node.distributor.custody_balance(&asset)
        );
    }
    Ok(())
}

fn claim(
    settings: &Settings,
    asset: AssetId,
    recipient: AccountId,
    amount: Option<Amount>,
    proof: Vec<Hash>,
    tree: Option<PathBuf>,
) -> Result<()> {
    let (amount, proof) = match tree {
        Some(path) => {
            let file = TreeFile::load(&path)?;
            let entry = file
                .find(&asset, &recipient, amount)
                .with_context(|| format!("No entitlement for {} under {} in {:?}", recipient, asset, path))?;
            (entry.amount, entry.proof.clone())
        }
        None => (amount.context("--amount is required without --tree")?, proof),
    };

    let node = LocalNode::open(settings)?;
    let outcome = node.distributor.claim(&asset, &recipient, amount, &proof)?;
    match outcome {
        ClaimOutcome::Settled { leaf, amount } => {
            println!("Paid {} of {} to {} (leaf {})", amount, asset, recipient, leaf);
        }
        ClaimOutcome::AlreadySettled { leaf } => {
            println!("Already claimed (leaf {})", leaf);
        }
    }
    Ok(())
}
