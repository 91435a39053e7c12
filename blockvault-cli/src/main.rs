//! BlockVault command-line tool
//!
//! Manages block types and documents in a local BlockVault store.
//!
//! Usage:
//!   blockvault --config blockvault.toml type register --builtins
//!   blockvault block create aws-credentials/prod --file prod.json
//!   blockvault block inspect webhook/deploy-hook
//!
//! The master passphrase is read from the environment variable named in the
//! config (`BLOCKVAULT_PASSPHRASE` by default).

use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use blockvault_client::{init_tracing, BlockClient, BlockVaultConfig};
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "blockvault")]
#[command(about = "Typed, secret-aware configuration blocks")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage block types
    #[command(name = "type", subcommand)]
    Type(TypeCommand),

    /// Manage block documents
    #[command(subcommand)]
    Block(BlockCommand),
}

#[derive(Subcommand, Debug)]
enum TypeCommand {
    /// Register block types from a JSON or TOML file, or the built-in catalog
    Register {
        #[arg(short, long, required_unless_present = "builtins")]
        file: Option<PathBuf>,

        #[arg(long, conflicts_with = "file")]
        builtins: bool,
    },
    /// List registered block types
    Ls,
    /// Show a block type definition
    Inspect { slug: String },
    /// Delete a block type (fails while documents use it)
    Delete { slug: String },
}

#[derive(Subcommand, Debug)]
enum BlockCommand {
    /// Save a block from a JSON file of field values
    Create {
        /// `type_slug/name`
        key: String,

        #[arg(short, long)]
        file: PathBuf,

        /// Replace an existing block
        #[arg(long)]
        overwrite: bool,
    },
    /// List blocks, optionally of one type
    Ls {
        #[arg(short, long = "type")]
        type_slug: Option<String>,
    },
    /// Show a block with references resolved and secrets masked
    Inspect { key: String },
    /// Delete a block by key or id
    Delete {
        #[arg(required_unless_present = "id")]
        key: Option<String>,

        #[arg(long, conflicts_with = "key")]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(if args.verbose { "debug" } else { "info" });

    let config = match &args.config {
        Some(path) => BlockVaultConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BlockVaultConfig::default(),
    }
    .with_env_overrides()?;
    debug!(path = %config.database_path.display(), "opening block store");

    let client = BlockClient::connect(&config)
        .await
        .context("Failed to open block store")?;

    let mut out = std::io::stdout().lock();
    match args.command {
        Command::Type(command) => match command {
            TypeCommand::Register { builtins: true, .. } => {
                blockvault_cli::install_builtins(&client, &mut out).await
            }
            TypeCommand::Register { file: Some(file), .. } => {
                blockvault_cli::register_types(&client, &file, &mut out).await
            }
            TypeCommand::Register { .. } => bail!("either --file or --builtins is required"),
            TypeCommand::Ls => blockvault_cli::list_types(&client, &mut out).await,
            TypeCommand::Inspect { slug } => {
                blockvault_cli::inspect_type(&client, &slug, &mut out).await
            }
            TypeCommand::Delete { slug } => {
                blockvault_cli::delete_type(&client, &slug, &mut out).await
            }
        },
        Command::Block(command) => match command {
            BlockCommand::Create { key, file, overwrite } => {
                blockvault_cli::create_block(&client, &key, &file, overwrite, &mut out).await
            }
            BlockCommand::Ls { type_slug } => {
                blockvault_cli::list_blocks(&client, type_slug.as_deref(), &mut out).await
            }
            BlockCommand::Inspect { key } => {
                blockvault_cli::inspect_block(&client, &key, &mut out).await
            }
            BlockCommand::Delete { id: Some(id), .. } => {
                blockvault_cli::delete_block_by_id(&client, &id, &mut out).await
            }
            BlockCommand::Delete { key: Some(key), .. } => {
                blockvault_cli::delete_block(&client, &key, &mut out).await
            }
            BlockCommand::Delete { .. } => bail!("either a key or --id is required"),
        },
    }
}
