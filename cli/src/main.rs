//! ChainCall CLI — run aggregate calls and inspect call-data from the terminal.
//!
//! # Commands
//! ```text
//! chaincall call   --config <file> --request <file> [--block N] [--json-logs]
//! chaincall encode --abi <file> --method <name> --args <json>
//! chaincall decode --abi <file> --method <name> --data <hex>
//! chaincall block  --config <file>
//! ```
//!
//! The request file is a JSON array of contract call groups:
//!
//! ```json
//! [{
//!   "reference": "usdc",
//!   "contractAddress": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
//!   "abi": [ ... ],
//!   "calls": [{
//!     "reference": "bal",
//!     "methodName": "balanceOf",
//!     "arguments": [{"type": "address", "value": "0x..."}]
//!   }]
//! }]
//! ```

use std::path::{Path, PathBuf};

use alloy_json_abi::JsonAbi;
use anyhow::{Context, Result};
use chaincall_codec::AbiCodec;
use chaincall_core::{AggregatorConfig, Codec, ContractCallGroup, Value};
use chaincall_engine::{init_tracing, Aggregator, CallOptions, CancellationToken, LogConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chaincall",
    about = "Aggregate many read-only contract calls into a few round trips",
    version
)]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn", env = "CHAINCALL_LOG")]
    log_level: String,

    /// Emit structured JSON logs on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every call in a request file and print the aggregate response
    Call {
        /// Aggregator config (JSON or YAML)
        #[arg(long)]
        config: PathBuf,
        /// JSON array of contract call groups
        #[arg(long)]
        request: PathBuf,
        /// Evaluate at this block instead of latest
        #[arg(long)]
        block: Option<u64>,
    },

    /// Encode call-data for one method
    Encode {
        /// Path to the ABI JSON file
        #[arg(long)]
        abi: PathBuf,
        /// Method name or full signature, e.g. `balanceOf(address)`
        #[arg(long)]
        method: String,
        /// JSON array of tagged values, e.g. '[{"type":"address","value":"0x..."}]'
        #[arg(long, default_value = "[]")]
        args: String,
    },

    /// Decode the return data of one method
    Decode {
        /// Path to the ABI JSON file
        #[arg(long)]
        abi: PathBuf,
        #[arg(long)]
        method: String,
        /// Return data (0x-prefixed hex)
        #[arg(long)]
        data: String,
    },

    /// Print the head block seen by the configured backend
    Block {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.json_logs,
        ..LogConfig::default()
    });

    match cli.command {
        Commands::Call {
            config,
            request,
            block,
        } => cmd_call(&config, &request, block).await,
        Commands::Encode { abi, method, args } => cmd_encode(&abi, &method, &args),
        Commands::Decode { abi, method, data } => cmd_decode(&abi, &method, &data),
        Commands::Block { config } => cmd_block(&config).await,
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_call(config: &Path, request: &Path, block: Option<u64>) -> Result<()> {
    let aggregator = load_aggregator(config)?;

    let raw = std::fs::read_to_string(request)
        .with_context(|| format!("read request file '{}'", request.display()))?;
    let groups: Vec<ContractCallGroup> =
        serde_json::from_str(&raw).context("parse request file")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let options = CallOptions {
        at_block: block,
        cancel: Some(cancel),
    };
    let response = aggregator
        .call_with(groups, options)
        .await
        .context("aggregate call failed")?;

    tracing::info!(
        block = response.block_number,
        calls = response.results.len(),
        decoded = response.decoded_count(),
        "done"
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_encode(abi_path: &Path, method: &str, args_json: &str) -> Result<()> {
    let abi = load_abi(abi_path)?;
    let args: Vec<Value> = serde_json::from_str(args_json).context("parse args JSON")?;
    let calldata = AbiCodec.encode(&abi, method, &args)?;
    println!("0x{}", hex::encode(&calldata));
    Ok(())
}

fn cmd_decode(abi_path: &Path, method: &str, data: &str) -> Result<()> {
    let abi = load_abi(abi_path)?;
    let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data)).context("invalid data hex")?;
    match AbiCodec.decode(&abi, method, &bytes) {
        Ok(values) => {
            println!("{}", serde_json::to_string_pretty(&values)?);
            Ok(())
        }
        Err(e) => match AbiCodec.describe_revert(&abi, &bytes) {
            Some(reason) => anyhow::bail!("{e} (looks like a revert: {reason})"),
            None => Err(e.into()),
        },
    }
}

async fn cmd_block(config: &Path) -> Result<()> {
    let aggregator = load_aggregator(config)?;
    let block = aggregator
        .block_number()
        .await
        .context("fetch head block")?;
    println!("{block}");
    Ok(())
}

fn load_aggregator(path: &Path) -> Result<Aggregator> {
    let config = AggregatorConfig::from_file(path)
        .with_context(|| format!("load config '{}'", path.display()))?;
    tracing::debug!(kind = %config.transport_kind, "config loaded");
    Aggregator::from_config(config).context("build aggregator")
}

fn load_abi(path: &Path) -> Result<JsonAbi> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read ABI file '{}'", path.display()))?;
    serde_json::from_str(&raw).context("parse ABI JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_call_with_block() {
        let cli = Cli::parse_from([
            "chaincall",
            "call",
            "--config",
            "cfg.yaml",
            "--request",
            "req.json",
            "--block",
            "1000",
            "--json-logs",
        ]);
        assert!(cli.json_logs);
        match cli.command {
            Commands::Call { block, config, .. } => {
                assert_eq!(block, Some(1000));
                assert_eq!(config, PathBuf::from("cfg.yaml"));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn encode_args_default_to_empty() {
        let cli = Cli::parse_from(["chaincall", "encode", "--abi", "a.json", "--method", "totalSupply"]);
        match cli.command {
            Commands::Encode { args, .. } => assert_eq!(args, "[]"),
            _ => panic!("expected encode"),
        }
    }
}
