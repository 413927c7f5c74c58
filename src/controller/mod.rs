//! Reconciliation control loop.
//!
//! # Data Flow
//! ```text
//! interval tick
//!     → inventory snapshot (once per tick, shared by all listeners)
//!     → one task per listener:
//!         per-listener slot busy?   → skip (previous pass still running)
//!         backing off after error?  → skip
//!         reconciler.reconcile(listener, nodes)
//!         → success resets backoff, failure extends it
//! ```
//!
//! # Design Decisions
//! - Passes for one listener never overlap; different listeners run in parallel
//! - A failed inventory snapshot skips the tick instead of draining pools
//! - Retrying is this loop's job: the whole pass is re-run after a backoff

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tokio::time;

use crate::config::ReconcileConfig;
use crate::inventory::{InventoryError, Node, NodeInventory};
use crate::reconcile::{ReconcileError, ReconcileReport, Reconciler};
use crate::registry::ListenerRef;
use crate::resilience::backoff::Backoff;

/// Result of attempting one listener's pass.
#[derive(Debug)]
pub enum PassOutcome {
    Reconciled(ReconcileReport),
    Failed(ReconcileError),
    /// A pass for this listener was already in flight.
    Busy,
    /// The listener is waiting out a backoff after an earlier failure.
    BackingOff,
}

impl PassOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PassOutcome::Failed(_))
    }
}

/// Drives reconciliation passes for a set of listeners.
pub struct Controller {
    reconciler: Reconciler,
    inventory: Arc<dyn NodeInventory>,
    listeners: Vec<ListenerRef>,
    config: ReconcileConfig,
    /// Per-listener mutual exclusion; the guarded value is the failure streak.
    slots: DashMap<ListenerRef, Arc<Mutex<Backoff>>>,
}

impl Controller {
    pub fn new(
        reconciler: Reconciler,
        inventory: Arc<dyn NodeInventory>,
        listeners: Vec<ListenerRef>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            reconciler,
            inventory,
            listeners,
            config,
            slots: DashMap::new(),
        }
    }

    pub fn listeners(&self) -> &[ListenerRef] {
        &self.listeners
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            listeners = self.listeners.len(),
            interval_secs = self.config.interval_secs,
            "Reconciliation controller starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Skipping tick: node inventory unavailable");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Controller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Take one inventory snapshot and run one pass per listener in parallel.
    pub async fn tick(self: &Arc<Self>) -> Result<Vec<(ListenerRef, PassOutcome)>, InventoryError> {
        let nodes: Arc<[Node]> = self.inventory.snapshot().await?.into();
        tracing::debug!(nodes = nodes.len(), "Node inventory snapshot taken");

        let mut tasks = JoinSet::new();
        for listener in self.listeners.iter().cloned() {
            let this = Arc::clone(self);
            let nodes = Arc::clone(&nodes);
            tasks.spawn(async move {
                let outcome = this.reconcile_listener(&listener, &nodes).await;
                (listener, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(self.listeners.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => outcomes.push(result),
                Err(e) => tracing::error!(error = %e, "Reconciliation task panicked"),
            }
        }
        Ok(outcomes)
    }

    /// Run one pass for `listener` unless one is in flight or it is backing off.
    pub async fn reconcile_listener(&self, listener: &ListenerRef, nodes: &[Node]) -> PassOutcome {
        let slot = self
            .slots
            .entry(listener.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Backoff::new(
                    self.config.backoff_base_ms,
                    self.config.backoff_max_ms,
                )))
            })
            .clone();

        let Ok(mut backoff) = slot.try_lock_owned() else {
            tracing::debug!(listener = %listener, "Previous pass still running, skipping");
            return PassOutcome::Busy;
        };

        if !backoff.is_ready(Instant::now()) {
            tracing::debug!(listener = %listener, failures = backoff.failures(), "Backing off");
            return PassOutcome::BackingOff;
        }

        match self.reconciler.reconcile(listener, nodes).await {
            Ok(report) => {
                backoff.record_success();
                PassOutcome::Reconciled(report)
            }
            Err(e) => {
                let delay = backoff.record_failure(Instant::now());
                tracing::warn!(
                    listener = %listener,
                    failures = backoff.failures(),
                    retry_in_ms = delay.as_millis() as u64,
                    "Pass failed, backing off"
                );
                PassOutcome::Failed(e)
            }
        }
    }
}
