//! Backend registry abstraction.
//!
//! # Contract
//! - `list`: `Unavailable`/`Timeout`, or `NotFound` if the listener is missing
//! - `create_batch`: one request for the whole batch; `Conflict` on collision
//! - `delete_batch`: `NotFound` if an entry is already gone
//!
//! Implementations issue exactly one call per method and never retry.

use async_trait::async_trait;

use crate::registry::types::{ActualBackend, BackendId, DesiredBackend, ListenerRef, RegistryResult};

/// Create/list/delete access to a load balancer's backend pools.
#[async_trait]
pub trait BackendRegistry: Send + Sync {
    /// List the backends currently registered for a listener.
    async fn list(&self, listener: &ListenerRef) -> RegistryResult<Vec<ActualBackend>>;

    /// Register a batch of backends in a single request.
    async fn create_batch(&self, listener: &ListenerRef, backends: &[DesiredBackend]) -> RegistryResult<()>;

    /// Remove a batch of backends by their registry handles.
    async fn delete_batch(&self, listener: &ListenerRef, backend_ids: &[BackendId]) -> RegistryResult<()>;
}
