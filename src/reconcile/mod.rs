//! Backend membership reconciliation.
//!
//! # Data Flow
//! ```text
//! reconciler.rs
//!     → registry.list(listener)           (current pool)
//!     → differ.rs (by NodeId)             (plan: to_add / to_delete)
//!         → resolver.rs                   (address for each new backend)
//!     → registry.create_batch(to_add)
//!     → registry.delete_batch(to_delete)
//! ```
//!
//! # Design Decisions
//! - Resolver and differ are pure and synchronous
//! - Only the registry calls can suspend or fail
//! - Re-running a pass on a converged pool issues no writes

pub mod differ;
pub mod reconciler;
pub mod resolver;

pub use differ::{diff, ReconciliationPlan};
pub use reconciler::{Phase, ReconcileError, ReconcileReport, Reconciler};
pub use resolver::{resolve, ResolveError};
