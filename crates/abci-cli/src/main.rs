//! ABCI CLI - serve the reference application or exercise a running one.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{parse_payload, Session};
use config::Config;
use logging::{init_logging, LogFormat};

/// Boundary protocol tooling
#[derive(Parser, Debug)]
#[command(name = "abci-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML or TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Application address (tcp://host:port or unix://path)
    #[arg(short, long)]
    address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty or json)
    #[arg(long)]
    log_format: Option<String>,

    /// Print connection call timings after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the key/value application
    Kvstore {
        /// Take a snapshot every this many heights (0 disables)
        #[arg(long)]
        snapshot_interval: Option<u64>,
    },

    /// Round-trip a message through the application
    Echo {
        /// Message to echo
        message: String,
    },

    /// Show application info
    Info,

    /// Query committed state
    Query {
        /// Key to look up (text or 0x-prefixed hex)
        data: String,
        /// Query path
        #[arg(long, default_value = "/store")]
        path: String,
    },

    /// Validate a transaction against the mempool connection
    CheckTx {
        /// Transaction (text or 0x-prefixed hex)
        tx: String,
    },

    /// Execute and commit one block holding the given transactions
    DeliverTx {
        /// Transactions (text or 0x-prefixed hex)
        #[arg(required = true)]
        txs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(address) = cli.address {
        config.address = address;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format.as_deref() {
        config.log_format = LogFormat::parse(format);
    }
    if let Commands::Kvstore {
        snapshot_interval: Some(interval),
    } = &cli.command
    {
        config.kvstore.snapshot_interval = *interval;
    }
    config.validate()?;

    init_logging(&config.log_level, config.log_format);
    let address = config.parsed_address()?;

    let session = match cli.command {
        Commands::Kvstore { .. } => return commands::kvstore(&address, config.kvstore).await,
        _ => Session::connect(address).await?,
    };
    match cli.command {
        Commands::Kvstore { .. } => {}
        Commands::Echo { message } => session.echo(message).await?,
        Commands::Info => session.info().await?,
        Commands::Query { data, path } => session.query(parse_payload(&data)?, path).await?,
        Commands::CheckTx { tx } => session.check_tx(parse_payload(&tx)?).await?,
        Commands::DeliverTx { txs } => {
            let txs = txs
                .iter()
                .map(|tx| parse_payload(tx))
                .collect::<Result<Vec<_>>>()?;
            session.deliver_block(txs).await?
        }
    }

    if cli.metrics {
        print!("{}", session.metrics()?);
    }
    Ok(())
}
