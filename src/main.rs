//! stx-multisig CLI Application
//!
//! A command-line interface for building and inspecting multisig transfers.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stx_multisig::cli;
use stx_multisig::config::SessionConfig;
use stx_multisig::network::{parse_network_name, Network};

#[derive(Parser)]
#[command(name = "stx-multisig")]
#[command(version = "0.1.0")]
#[command(about = "Build and inspect M-of-N multisig STX transfers", long_about = None)]
struct Cli {
    /// Session config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network override ("mainnet" or "testnet")
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Default fee override in micro-STX
    #[arg(long, global = true)]
    fee: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a multisig address from public keys
    Address {
        /// Public keys (hex), repeated or comma separated
        #[arg(short, long, required = true, num_args = 1..)]
        keys: Vec<String>,

        /// Signatures required
        #[arg(short, long)]
        threshold: usize,

        /// Sort keys before deriving
        #[arg(short, long)]
        sort: bool,
    },

    /// Recover the key order that produces a known address
    CheckAddress {
        #[arg(short, long, required = true, num_args = 1..)]
        keys: Vec<String>,

        #[arg(short, long)]
        threshold: usize,

        /// Expected multisig address
        #[arg(short, long)]
        address: String,
    },

    /// Build unsigned transfers from a JSON batch file
    Create {
        /// Batch file: array of transfer records (explicit nonces required)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Decode base64 transactions
    Decode {
        /// A single base64 transaction
        #[arg(short, long)]
        tx: Option<String>,

        /// JSON file with an array of base64 transactions
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show signing progress of a multisig transaction
    Info {
        #[arg(short, long)]
        tx: String,
    },

    /// List signed slots after a signer's slot
    SignersAfter {
        #[arg(short, long)]
        tx: String,

        /// Signer public key (hex)
        #[arg(short, long)]
        key: String,
    },

    /// Print standard derivation paths
    Paths {
        #[arg(long, default_value = "3")]
        count: u32,
    },
}

fn session_config(cli: &Cli) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = SessionConfig::load_or_default(cli.config.as_deref())?;
    if let Some(name) = &cli.network {
        let network = parse_network_name(name).ok_or_else(|| format!("unknown network '{}'", name))?;
        config = config.with_network(network);
    }
    if let Some(fee) = cli.fee {
        config = config.with_fee(fee);
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = session_config(&cli)?;
    let network: Network = config.default_network;

    match cli.command {
        Commands::Address {
            keys,
            threshold,
            sort,
        } => {
            cli::cmd_address(&keys, threshold, network, sort)?;
        }

        Commands::CheckAddress {
            keys,
            threshold,
            address,
        } => {
            cli::cmd_check_address(&keys, threshold, &address)?;
        }

        Commands::Create { input } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_create(&input, config))?;
        }

        Commands::Decode { tx, file } => {
            cli::cmd_decode(tx.as_deref(), file.as_deref())?;
        }

        Commands::Info { tx } => {
            cli::cmd_info(&tx)?;
        }

        Commands::SignersAfter { tx, key } => {
            cli::cmd_signers_after(&tx, &key)?;
        }

        Commands::Paths { count } => {
            cli::cmd_paths(count)?;
        }
    }

    Ok(())
}
