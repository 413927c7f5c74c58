//! Load balancer backend membership sync.
//!
//! Keeps each configured listener's backend pool equal to the set of healthy
//! cluster nodes, keyed by provider instance id.

pub mod config;
pub mod controller;
pub mod inventory;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod registry;
pub mod resilience;

pub use config::SyncConfig;
pub use controller::{Controller, PassOutcome};
pub use inventory::{Node, NodeId, NodeInventory};
pub use lifecycle::Shutdown;
pub use reconcile::{diff, resolve, ReconcileError, ReconciliationPlan, Reconciler};
pub use registry::{BackendRegistry, ListenerRef, RegistryError};
