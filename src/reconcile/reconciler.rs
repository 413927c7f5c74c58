//! Reconciliation pass orchestration.
//!
//! # Responsibilities
//! - List the listener's current backends
//! - Diff them against the desired nodes
//! - Apply additions, then deletions, each as a single batch
//!
//! # Design Decisions
//! - Fail fast: the first dependency failure ends the pass
//! - Additions before deletions so replacements are live before old nodes drain
//! - A delete answered with NotFound has already reached its goal
//! - Callers serialize passes per listener and own any retry policy

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::inventory::Node;
use crate::observability::metrics;
use crate::reconcile::differ::{diff, ReconciliationPlan};
use crate::registry::{BackendRegistry, ListenerRef, RegistryError};

/// Step of a pass that talks to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    List,
    Create,
    Delete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::List => "list",
            Phase::Create => "create",
            Phase::Delete => "delete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed pass: which phase failed, for which listener, and why.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("listing backends of {listener} failed: {source}")]
    List {
        listener: ListenerRef,
        #[source]
        source: RegistryError,
    },

    #[error("creating backends on {listener} failed: {source}")]
    Create {
        listener: ListenerRef,
        #[source]
        source: RegistryError,
    },

    #[error("deleting backends from {listener} failed: {source}")]
    Delete {
        listener: ListenerRef,
        #[source]
        source: RegistryError,
    },
}

impl ReconcileError {
    fn new(phase: Phase, listener: &ListenerRef, source: RegistryError) -> Self {
        let listener = listener.clone();
        match phase {
            Phase::List => ReconcileError::List { listener, source },
            Phase::Create => ReconcileError::Create { listener, source },
            Phase::Delete => ReconcileError::Delete { listener, source },
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            ReconcileError::List { .. } => Phase::List,
            ReconcileError::Create { .. } => Phase::Create,
            ReconcileError::Delete { .. } => Phase::Delete,
        }
    }

    pub fn listener(&self) -> &ListenerRef {
        match self {
            ReconcileError::List { listener, .. }
            | ReconcileError::Create { listener, .. }
            | ReconcileError::Delete { listener, .. } => listener,
        }
    }

    /// The registry error exactly as the client returned it.
    pub fn registry_error(&self) -> &RegistryError {
        match self {
            ReconcileError::List { source, .. }
            | ReconcileError::Create { source, .. }
            | ReconcileError::Delete { source, .. } => source,
        }
    }

    pub fn into_registry_error(self) -> RegistryError {
        match self {
            ReconcileError::List { source, .. }
            | ReconcileError::Create { source, .. }
            | ReconcileError::Delete { source, .. } => source,
        }
    }
}

/// What a successful pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Backends registered before the pass.
    pub registered: usize,
    pub added: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.deleted > 0
    }
}

/// Runs list → diff → apply against a backend registry.
#[derive(Clone)]
pub struct Reconciler {
    registry: Arc<dyn BackendRegistry>,
}

impl Reconciler {
    pub fn new(registry: Arc<dyn BackendRegistry>) -> Self {
        Self { registry }
    }

    /// List and diff without changing anything.
    pub async fn plan(&self, listener: &ListenerRef, desired: &[Node]) -> Result<ReconciliationPlan, ReconcileError> {
        let actual = self
            .registry
            .list(listener)
            .await
            .map_err(|e| ReconcileError::new(Phase::List, listener, e))?;
        metrics::record_registered_backends(listener, actual.len());
        Ok(diff(listener, desired, &actual))
    }

    /// Bring the listener's pool to `desired` in one pass.
    pub async fn reconcile(&self, listener: &ListenerRef, desired: &[Node]) -> Result<ReconcileReport, ReconcileError> {
        let start = Instant::now();
        let result = self.apply(listener, desired).await;
        metrics::record_pass(listener, &result, start);

        match &result {
            Ok(report) if report.changed() => tracing::info!(
                listener = %listener,
                added = report.added,
                deleted = report.deleted,
                skipped = report.skipped,
                "Backend pool reconciled"
            ),
            Ok(report) => tracing::debug!(
                listener = %listener,
                registered = report.registered,
                skipped = report.skipped,
                "Backend pool already converged"
            ),
            Err(e) => tracing::error!(
                listener = %listener,
                phase = %e.phase(),
                error = %e.registry_error(),
                "Reconciliation pass failed"
            ),
        }

        result
    }

    async fn apply(&self, listener: &ListenerRef, desired: &[Node]) -> Result<ReconcileReport, ReconcileError> {
        tracing::debug!(listener = %listener, desired = desired.len(), "Starting reconciliation pass");

        let actual = self
            .registry
            .list(listener)
            .await
            .map_err(|e| ReconcileError::new(Phase::List, listener, e))?;
        metrics::record_registered_backends(listener, actual.len());

        let plan = diff(listener, desired, &actual);
        let mut report = ReconcileReport {
            registered: actual.len(),
            skipped: plan.skipped.len(),
            ..Default::default()
        };

        if !plan.to_add.is_empty() {
            tracing::info!(
                listener = %listener,
                count = plan.to_add.len(),
                nodes = ?plan.to_add.iter().map(|b| b.node_id.as_str()).collect::<Vec<_>>(),
                "Creating backends"
            );
            self.registry
                .create_batch(listener, &plan.to_add)
                .await
                .map_err(|e| ReconcileError::new(Phase::Create, listener, e))?;
            report.added = plan.to_add.len();
        }

        if !plan.to_delete.is_empty() {
            tracing::info!(
                listener = %listener,
                count = plan.to_delete.len(),
                backends = ?plan.to_delete.iter().map(|b| b.as_str()).collect::<Vec<_>>(),
                "Deleting backends"
            );
            match self.registry.delete_batch(listener, &plan.to_delete).await {
                Ok(()) => {}
                Err(RegistryError::NotFound(detail)) => {
                    tracing::warn!(listener = %listener, detail = %detail, "Backends already removed");
                }
                Err(e) => return Err(ReconcileError::new(Phase::Delete, listener, e)),
            }
            report.deleted = plan.to_delete.len();
        }

        Ok(report)
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}
