//! Interval scheduler.
//!
//! Each tick spawns one pass per enabled chain. A chain whose previous pass is
//! still running is skipped for that tick; other chains are unaffected. On
//! cancellation the timer stops and in-flight passes are awaited.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::context::{ChainContext, SyncOptions};
use super::pass::run_chain_pass;
use crate::contract::ChainRegistry;
use crate::store::ReplicaStore;

struct ChainSlot {
    ctx: ChainContext,
    in_flight: Arc<Mutex<()>>,
}

pub struct Scheduler {
    slots: Vec<ChainSlot>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(contexts: Vec<ChainContext>, interval: Duration) -> Self {
        let slots = contexts
            .into_iter()
            .map(|ctx| ChainSlot {
                ctx,
                in_flight: Arc::new(Mutex::new(())),
            })
            .collect();
        Self { slots, interval }
    }

    /// One context per configured chain whose client can be built. A chain
    /// without a contract address is skipped quietly; one whose RPC url is
    /// missing or invalid is logged and skipped, so the rest still run.
    pub fn from_registry(
        registry: &ChainRegistry,
        store: Arc<dyn ReplicaStore>,
        options: SyncOptions,
        interval: Duration,
    ) -> Self {
        let mut contexts = Vec::new();
        for chain in registry.chains() {
            let client = match registry.client(chain.chain_id) {
                Ok(Some(client)) => client,
                Ok(None) => {
                    tracing::debug!("Chain {} has no contract address, skipping", chain.name);
                    continue;
                }
                Err(e) => {
                    tracing::error!("Chain {} will not be indexed: {}", chain.name, e);
                    continue;
                }
            };
            contexts.push(ChainContext::new(
                chain.clone(),
                Arc::new(client),
                store.clone(),
                options,
            ));
        }
        Self::new(contexts, interval)
    }

    pub fn chain_count(&self) -> usize {
        self.slots.len()
    }

    /// Spawns a pass for every chain that is not already running one.
    fn spawn_round(&self, tasks: &mut JoinSet<()>) {
        for slot in &self.slots {
            let Ok(guard) = slot.in_flight.clone().try_lock_owned() else {
                tracing::info!(
                    "Chain {}: previous pass still running, skipping this tick",
                    slot.ctx.name()
                );
                continue;
            };
            let ctx = slot.ctx.clone();
            tasks.spawn(async move {
                let _guard = guard;
                if let Err(e) = run_chain_pass(&ctx).await {
                    tracing::error!("Chain {}: pass failed: {}", ctx.name(), e);
                }
            });
        }
    }

    /// Runs a single round and waits for every spawned pass.
    pub async fn run_round(&self) {
        let mut tasks = JoinSet::new();
        self.spawn_round(&mut tasks);
        drain(&mut tasks).await;
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            "Scheduler started for {} chain(s), interval {:?}",
            self.slots.len(),
            self.interval
        );

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler shutting down, waiting for {} in-flight pass(es)", tasks.len());
                    break;
                }
                _ = timer.tick() => {
                    while let Some(result) = tasks.try_join_next() {
                        log_join(result);
                    }
                    self.spawn_round(&mut tasks);
                }
            }
        }

        drain(&mut tasks).await;
        tracing::info!("Scheduler stopped");
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        log_join(result);
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!("Chain pass task ended abnormally: {}", e);
    }
}
