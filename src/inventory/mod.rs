//! Node inventory subsystem.
//!
//! # Data Flow
//! ```text
//! NodeList document (kubectl get nodes -o json)
//!     → file.rs (read, filter not-ready, map annotation → NodeId)
//!     → node.rs (Node snapshot)
//!     → reconciler (desired node set)
//! ```
//!
//! # Design Decisions
//! - Snapshots are read-only; nothing here mutates node objects
//! - Nodes without an instance id cannot be correlated and are dropped

pub mod file;
pub mod node;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use file::FileInventory;
pub use node::{AddressType, Node, NodeAddress, NodeId};

/// Errors produced while taking a node snapshot.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read node inventory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse node inventory: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of the desired node set.
#[async_trait]
pub trait NodeInventory: Send + Sync {
    /// Take a fresh snapshot of the nodes that should be registered.
    async fn snapshot(&self) -> Result<Vec<Node>, InventoryError>;
}

/// A fixed node set, mostly useful in tests and one-shot tooling.
#[async_trait]
impl NodeInventory for Vec<Node> {
    async fn snapshot(&self) -> Result<Vec<Node>, InventoryError> {
        Ok(self.clone())
    }
}
