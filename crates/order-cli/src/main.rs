//! zkCLOB order CLI
//!
//! Derives trading keys from a wallet, proves order authorization and submits
//! orders to the sequencer.

use anyhow::{Context, Result};
use auth::{IdentityRegistry, KeyInfoCache, TradingKeyManager, TradingWallet};
use circuit_prover::ProofGenerator;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use trading_engine::OrderSubmitter;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zkclob_core::api::SequencerClient;
use zkclob_core::config::Config;
use zkclob_core::types::{OrderKind, OrderRequest, OrderSide};

#[derive(Parser)]
#[command(name = "order-cli")]
#[command(about = "Zero-knowledge order authentication for the zkCLOB", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file. Environment variables are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive (or show cached) trading key info for the wallet
    Keys {
        /// Discard cached key info and derive again
        #[arg(long)]
        refresh: bool,
    },

    /// Fetch the circuit artifacts into the cache
    Artifacts {
        /// Purge cached artifacts before fetching
        #[arg(long)]
        clear: bool,
    },

    /// Prove and submit an order
    Submit {
        /// Trading pair symbol
        #[arg(long, default_value = "HYPE-USDC")]
        pair: String,

        /// buy or sell
        #[arg(long)]
        side: OrderSide,

        /// Base amount in whole units
        #[arg(long)]
        amount: Decimal,

        /// Limit price; omit for a market order
        #[arg(long)]
        price: Option<Decimal>,

        /// market or limit
        #[arg(long = "type", default_value = "market")]
        order_type: OrderKind,

        /// Treat the wallet as identity-verified
        #[arg(long)]
        kyc_verified: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "order_cli=info,trading_engine=info,circuit_prover=info,auth=info,zkclob_core=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let keys = Arc::new(TradingKeyManager::new(Arc::new(KeyInfoCache::from_config(
        &config.keys,
    ))));
    let generator = Arc::new(ProofGenerator::from_config(&config, Arc::clone(&keys))?);

    match cli.command {
        Commands::Keys { refresh } => {
            let wallet = TradingWallet::from_env()?;
            let key_info = if refresh {
                keys.force_key_refresh(&wallet).await?
            } else {
                keys.get_trading_key_info(&wallet).await?
            };
            println!("{}", serde_json::to_string_pretty(&key_info)?);
        }

        Commands::Artifacts { clear } => {
            let loader = generator.loader();
            if clear {
                loader.clear_cache().await?;
                info!("Artifact cache cleared");
            }
            let artifacts = loader.load_artifacts().await?;
            println!(
                "wasm: {} bytes, zkey: {} bytes, status: {:?}",
                artifacts.wasm.len(),
                artifacts.zkey.len(),
                loader.status()
            );
        }

        Commands::Submit {
            pair,
            side,
            amount,
            price,
            order_type,
            kyc_verified,
        } => {
            let wallet = TradingWallet::from_env()?;
            let identity = Arc::new(IdentityRegistry::new());
            if kyc_verified {
                identity.mark_verified(&wallet.address_lower());
            }

            // Key info must be cached before the submitter's readiness guard.
            keys.get_trading_key_info(&wallet).await?;
            generator.initialize().await?;

            let submitter = OrderSubmitter::new(
                Arc::clone(&generator),
                Arc::clone(&keys),
                identity,
                Arc::new(SequencerClient::from_config(&config.backend)),
                config.pairs.clone(),
            );

            let request = OrderRequest {
                pair_id: pair,
                side,
                amount,
                price,
                order_type,
            };

            let mut updates = submitter.subscribe();
            let progress = tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let state = updates.borrow_and_update().clone();
                    info!(state = %state, progress = state.progress(), "Submission progress");
                }
            });

            let result = submitter.submit_order(&request, &wallet).await;
            generator.terminate();
            progress.abort();

            let receipt = result?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    Ok(())
}
