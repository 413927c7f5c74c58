//! Backend registry types and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::inventory::NodeId;

/// Backend kind registered for every cluster node.
pub const BACKEND_KIND_COMPUTE: &str = "compute";

/// Weight assigned to newly registered backends.
pub const DEFAULT_BACKEND_WEIGHT: u32 = 10;

/// Registry-assigned handle of a registered backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(pub String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the backend pool of one load balancer listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerRef {
    pub load_balancer_id: String,
    pub listener_id: String,
    /// Backend port registered for every member of this listener.
    pub port: u16,
}

impl ListenerRef {
    pub fn new(load_balancer_id: impl Into<String>, listener_id: impl Into<String>, port: u16) -> Self {
        Self {
            load_balancer_id: load_balancer_id.into(),
            listener_id: listener_id.into(),
            port,
        }
    }
}

impl fmt::Display for ListenerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.load_balancer_id, self.listener_id)
    }
}

/// A backend entry that should be created for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredBackend {
    pub node_id: NodeId,
    pub address: String,
    pub port: u16,
    pub name: String,
    pub kind: String,
    pub weight: u32,
}

/// A backend entry currently registered in a listener's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualBackend {
    pub backend_id: BackendId,
    pub node_id: NodeId,
    pub address: String,
    pub port: u16,
    pub name: String,
    pub kind: String,
    pub weight: u32,
}

/// Errors returned by a backend registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transport failure or unexpected server response.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its deadline.
    #[error("registry call timed out after {0:?}")]
    Timeout(Duration),

    /// Listener or backend does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The registry refused a create that collides with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Credentials were rejected or could not be obtained.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Response body did not match the expected format.
    #[error("failed to decode registry response: {0}")]
    Decode(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
