//! Cluster node snapshot types.
//!
//! # Responsibilities
//! - Represent a node as the reconciler sees it: identity, name, addresses
//! - Parse Kubernetes node address types
//!
//! # Design Decisions
//! - `NodeId` is the provider-assigned instance identifier, never an address
//! - Address order is preserved exactly as reported by the inventory

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, provider-assigned instance identifier of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of a reported node address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AddressType {
    InternalIp,
    ExternalIp,
    Hostname,
    InternalDns,
    ExternalDns,
    Other(String),
}

impl From<String> for AddressType {
    fn from(val: String) -> Self {
        match val.as_str() {
            "InternalIP" => AddressType::InternalIp,
            "ExternalIP" => AddressType::ExternalIp,
            "Hostname" => AddressType::Hostname,
            "InternalDNS" => AddressType::InternalDns,
            "ExternalDNS" => AddressType::ExternalDns,
            _ => AddressType::Other(val),
        }
    }
}

impl From<AddressType> for String {
    fn from(val: AddressType) -> Self {
        match val {
            AddressType::InternalIp => "InternalIP".to_string(),
            AddressType::ExternalIp => "ExternalIP".to_string(),
            AddressType::Hostname => "Hostname".to_string(),
            AddressType::InternalDns => "InternalDNS".to_string(),
            AddressType::ExternalDns => "ExternalDNS".to_string(),
            AddressType::Other(other) => other,
        }
    }
}

/// A single typed address reported by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub kind: AddressType,
    pub address: String,
}

impl NodeAddress {
    pub fn new(kind: AddressType, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }
}

/// A read-only snapshot of one cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identity used to correlate the node with its backend entry.
    pub id: NodeId,
    /// Human-readable node name.
    pub name: String,
    /// Addresses in the order the node reports them.
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.into(),
            addresses: Vec::new(),
        }
    }

    /// Append an address, keeping report order.
    pub fn with_address(mut self, kind: AddressType, address: impl Into<String>) -> Self {
        self.addresses.push(NodeAddress::new(kind, address));
        self
    }
}
