//! Membership diff between desired nodes and registered backends.
//!
//! # Responsibilities
//! - Find desired nodes with no registered backend (to add)
//! - Find registered backends whose node is no longer desired (to delete)
//! - Skip nodes that currently report no address
//!
//! # Design Decisions
//! - Matching is by `NodeId` only; addresses may change under a stable identity
//! - Keyed lookups, O(n + m)
//! - Output order follows input order so plans are reproducible
//! - Never fails; an unresolvable node is left out of the plan

use serde::Serialize;
use std::collections::HashSet;

use crate::inventory::{Node, NodeId};
use crate::reconcile::resolver::resolve;
use crate::registry::{
    ActualBackend, BackendId, DesiredBackend, ListenerRef, BACKEND_KIND_COMPUTE, DEFAULT_BACKEND_WEIGHT,
};

/// Changes needed to bring a listener's pool to the desired membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub to_add: Vec<DesiredBackend>,
    pub to_delete: Vec<BackendId>,
    /// Desired nodes left out of `to_add` because they report no address.
    pub skipped: Vec<NodeId>,
}

impl ReconciliationPlan {
    /// True when the pool already matches the desired membership.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the plan for `listener`.
pub fn diff(listener: &ListenerRef, desired_nodes: &[Node], actual: &[ActualBackend]) -> ReconciliationPlan {
    let registered: HashSet<&NodeId> = actual.iter().map(|b| &b.node_id).collect();
    let desired: HashSet<&NodeId> = desired_nodes.iter().map(|n| &n.id).collect();

    let mut plan = ReconciliationPlan::default();
    let mut planned: HashSet<&NodeId> = HashSet::new();

    for node in desired_nodes {
        if registered.contains(&node.id) || !planned.insert(&node.id) {
            continue;
        }

        match resolve(node) {
            Ok(address) => plan.to_add.push(DesiredBackend {
                node_id: node.id.clone(),
                address: address.to_string(),
                port: listener.port,
                name: node.name.clone(),
                kind: BACKEND_KIND_COMPUTE.to_string(),
                weight: DEFAULT_BACKEND_WEIGHT,
            }),
            Err(e) => {
                tracing::warn!(
                    listener = %listener,
                    node_id = %node.id,
                    error = %e,
                    "Skipping backend for node without address"
                );
                plan.skipped.push(node.id.clone());
            }
        }
    }

    plan.to_delete = actual
        .iter()
        .filter(|b| !desired.contains(&b.node_id))
        .map(|b| b.backend_id.clone())
        .collect();

    plan
}
