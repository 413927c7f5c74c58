//! Routable address selection for a node.
//!
//! The load balancer and the nodes share a subnet, so the first internal IP
//! wins. A node reporting no internal IP falls back to its first address.

use thiserror::Error;

use crate::inventory::{AddressType, Node};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("node {node} reports no addresses")]
    NoAddressAvailable { node: String },
}

/// Pick the address to register for `node`.
pub fn resolve(node: &Node) -> Result<&str, ResolveError> {
    node.addresses
        .iter()
        .find(|a| a.kind == AddressType::InternalIp)
        .or_else(|| node.addresses.first())
        .map(|a| a.address.as_str())
        .ok_or_else(|| ResolveError::NoAddressAvailable {
            node: node.name.clone(),
        })
}
