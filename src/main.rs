use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use auction_indexer::contract::ChainRegistry;
use auction_indexer::db::DbPool;
use auction_indexer::store::{PgStore, ReplicaStore};
use auction_indexer::sync::{Scheduler, SyncOptions};
use auction_indexer::types::config::indexer::IndexerConfig;

const DEFAULT_CONFIG_PATH: &str = "config/config.json";

#[derive(Debug)]
struct Args {
    config_path: PathBuf,
    once: bool,
    reset_cursors: Option<u64>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut parsed = Args {
        config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        once: false,
        reset_cursors: None,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" => parsed.once = true,
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config_path = PathBuf::from(path);
            }
            "--reset-cursors" => {
                let chain_id = args.next().context("--reset-cursors needs a chain id")?;
                parsed.reset_cursors = Some(
                    chain_id
                        .parse()
                        .with_context(|| format!("invalid chain id {:?}", chain_id))?,
                );
            }
            other => anyhow::bail!("unknown argument {:?}", other),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(env::args().skip(1))?;

    // Contract addresses may come from .env, so it is read before the config
    // is resolved. Variables already set in the environment win.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env file");
        }
    }
    let config = IndexerConfig::load(&args.config_path)?;

    ensure_env_vars(&config.required_env_vars())?;

    tracing::info!("Loaded config with {} chain(s)", config.chains.len());

    let database_url = env::var(&config.database_url_env_var)
        .with_context(|| format!("{} is not set", config.database_url_env_var))?;
    let pool = Arc::new(DbPool::new(&database_url).await?);
    pool.run_migrations().await?;
    let store: Arc<dyn ReplicaStore> = Arc::new(PgStore::new(pool));

    let registry = ChainRegistry::new(config.chains.clone(), config.sync.clone());

    if let Some(chain_id) = args.reset_cursors {
        let chain = registry.chain(chain_id)?;
        store.reset_cursors(chain_id).await?;
        tracing::info!(
            "Reset sync cursors for chain {} ({}); next pass replays from block {}",
            chain.name,
            chain_id,
            chain.initial_cursor() + 1
        );
        return Ok(());
    }

    let scheduler = Scheduler::from_registry(
        &registry,
        store,
        SyncOptions::from(&config.sync),
        config.sync.interval(),
    );
    if scheduler.chain_count() == 0 {
        tracing::warn!("No chain is ready to index (missing contract address or RPC url)");
    }

    if args.once {
        scheduler.run_round().await;
        tracing::info!("Single round complete");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, finishing in-flight passes");
                shutdown.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    scheduler.run(cancel).await;
    Ok(())
}

fn ensure_env_vars(required: &[&str]) -> anyhow::Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|var| env::var(var).is_err())
        .copied()
        .collect();

    anyhow::ensure!(
        missing.is_empty(),
        "Missing required env vars: {:?}",
        missing
    );
    Ok(())
}
