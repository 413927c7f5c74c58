//! In-memory backend registry.
//!
//! Behaves like the remote registry: assigns backend ids, rejects creates
//! for nodes that are already registered and reports unknown ids on delete.
//! Supports failure injection and keeps a log of every call it received.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::inventory::NodeId;
use crate::registry::client::BackendRegistry;
use crate::registry::types::{
    ActualBackend, BackendId, DesiredBackend, ListenerRef, RegistryError, RegistryResult,
};

/// Registry operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Delete,
}

/// A call observed by the in-memory registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    List(ListenerRef),
    Create(ListenerRef, Vec<NodeId>),
    Delete(ListenerRef, Vec<BackendId>),
}

impl RegistryCall {
    pub fn operation(&self) -> Operation {
        match self {
            RegistryCall::List(_) => Operation::List,
            RegistryCall::Create(..) => Operation::Create,
            RegistryCall::Delete(..) => Operation::Delete,
        }
    }
}

type PoolKey = (String, String);

fn pool_key(listener: &ListenerRef) -> PoolKey {
    (listener.load_balancer_id.clone(), listener.listener_id.clone())
}

#[derive(Debug, Default)]
struct State {
    pools: HashMap<PoolKey, Vec<ActualBackend>>,
    next_id: u64,
    failures: HashMap<Operation, VecDeque<RegistryError>>,
    calls: Vec<RegistryCall>,
}

impl State {
    fn take_failure(&mut self, op: Operation) -> Option<RegistryError> {
        self.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn allocate_id(&mut self) -> BackendId {
        self.next_id += 1;
        BackendId(format!("backend-{}", self.next_id))
    }
}

/// Backend registry held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the maps consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declare a listener with an empty backend pool.
    pub fn add_listener(&self, listener: &ListenerRef) {
        self.state().pools.entry(pool_key(listener)).or_default();
    }

    /// Register a backend directly, bypassing conflict checks.
    pub fn seed(&self, listener: &ListenerRef, node_id: &str, address: &str) -> BackendId {
        let mut state = self.state();
        let backend_id = state.allocate_id();
        state.pools.entry(pool_key(listener)).or_default().push(ActualBackend {
            backend_id: backend_id.clone(),
            node_id: NodeId::new(node_id),
            address: address.to_string(),
            port: listener.port,
            name: node_id.to_string(),
            kind: crate::registry::types::BACKEND_KIND_COMPUTE.to_string(),
            weight: crate::registry::types::DEFAULT_BACKEND_WEIGHT,
        });
        backend_id
    }

    /// Current pool contents for a listener.
    pub fn backends(&self, listener: &ListenerRef) -> Vec<ActualBackend> {
        self.state()
            .pools
            .get(&pool_key(listener))
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next call of `op` fail with `err`. Failures queue up in order.
    pub fn fail_next(&self, op: Operation, err: RegistryError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl BackendRegistry for InMemoryRegistry {
    async fn list(&self, listener: &ListenerRef) -> RegistryResult<Vec<ActualBackend>> {
        let mut state = self.state();
        state.calls.push(RegistryCall::List(listener.clone()));
        if let Some(err) = state.take_failure(Operation::List) {
            return Err(err);
        }

        state
            .pools
            .get(&pool_key(listener))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("listener {}", listener)))
    }

    async fn create_batch(&self, listener: &ListenerRef, backends: &[DesiredBackend]) -> RegistryResult<()> {
        let mut state = self.state();
        state.calls.push(RegistryCall::Create(
            listener.clone(),
            backends.iter().map(|b| b.node_id.clone()).collect(),
        ));
        if let Some(err) = state.take_failure(Operation::Create) {
            return Err(err);
        }

        let key = pool_key(listener);
        let pool = state
            .pools
            .get(&key)
            .ok_or_else(|| RegistryError::NotFound(format!("listener {}", listener)))?;
        if let Some(dup) = backends
            .iter()
            .find(|b| pool.iter().any(|existing| existing.node_id == b.node_id))
        {
            return Err(RegistryError::Conflict(format!(
                "server {} already registered on {}",
                dup.node_id, listener
            )));
        }

        let mut created = Vec::with_capacity(backends.len());
        for b in backends {
            created.push(ActualBackend {
                backend_id: state.allocate_id(),
                node_id: b.node_id.clone(),
                address: b.address.clone(),
                port: b.port,
                name: b.name.clone(),
                kind: b.kind.clone(),
                weight: b.weight,
            });
        }
        state.pools.entry(key).or_default().extend(created);
        Ok(())
    }

    async fn delete_batch(&self, listener: &ListenerRef, backend_ids: &[BackendId]) -> RegistryResult<()> {
        let mut state = self.state();
        state
            .calls
            .push(RegistryCall::Delete(listener.clone(), backend_ids.to_vec()));
        if let Some(err) = state.take_failure(Operation::Delete) {
            return Err(err);
        }

        let pool = state
            .pools
            .get_mut(&pool_key(listener))
            .ok_or_else(|| RegistryError::NotFound(format!("listener {}", listener)))?;

        let missing: Vec<&BackendId> = backend_ids
            .iter()
            .filter(|id| !pool.iter().any(|b| &b.backend_id == *id))
            .collect();
        pool.retain(|b| !backend_ids.contains(&b.backend_id));

        if missing.is_empty() {
            Ok(())
        } else {
            let ids: Vec<&str> = missing.iter().map(|id| id.as_str()).collect();
            Err(RegistryError::NotFound(format!("backends {}", ids.join(","))))
        }
    }
}
