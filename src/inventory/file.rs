//! Node inventory read from a Kubernetes `NodeList` document on disk.
//!
//! The file has the shape produced by `kubectl get nodes -o json`. It is
//! re-read on every snapshot so an external writer can refresh it in place.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::inventory::node::{Node, NodeAddress, NodeId};
use crate::inventory::{InventoryError, NodeInventory};

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<KubeNode>,
}

#[derive(Debug, Deserialize)]
struct KubeNode {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: NodeSpec,
    #[serde(default)]
    status: NodeStatus,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeSpec {
    #[serde(default)]
    unschedulable: bool,
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    addresses: Vec<NodeAddress>,
    #[serde(default)]
    conditions: Vec<NodeCondition>,
}

#[derive(Debug, Deserialize)]
struct NodeCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

impl KubeNode {
    /// Ready condition is `True` and the node accepts workloads.
    fn is_ready(&self) -> bool {
        !self.spec.unschedulable
            && self
                .status
                .conditions
                .iter()
                .any(|c| c.kind == "Ready" && c.status == "True")
    }
}

/// Reads node snapshots from a JSON file.
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
    instance_id_annotation: String,
    ready_only: bool,
}

impl FileInventory {
    pub fn new(path: impl AsRef<Path>, instance_id_annotation: impl Into<String>, ready_only: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            instance_id_annotation: instance_id_annotation.into(),
            ready_only,
        }
    }

    /// Map a `NodeList` document to the desired node set.
    pub fn parse(&self, content: &str) -> Result<Vec<Node>, InventoryError> {
        let list: NodeList = serde_json::from_str(content)?;
        let mut nodes = Vec::with_capacity(list.items.len());

        for item in list.items {
            if self.ready_only && !item.is_ready() {
                tracing::debug!(node = %item.metadata.name, "Excluding node that is not ready");
                continue;
            }

            let id = match item.metadata.annotations.get(&self.instance_id_annotation) {
                Some(id) if !id.is_empty() => NodeId::new(id.clone()),
                _ => {
                    tracing::warn!(
                        node = %item.metadata.name,
                        annotation = %self.instance_id_annotation,
                        "Node has no instance id annotation, skipping"
                    );
                    continue;
                }
            };

            nodes.push(Node {
                id,
                name: item.metadata.name,
                addresses: item.status.addresses,
            });
        }

        Ok(nodes)
    }
}

#[async_trait]
impl NodeInventory for FileInventory {
    async fn snapshot(&self) -> Result<Vec<Node>, InventoryError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| InventoryError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::node::AddressType;

    const ANNOTATION: &str = "loadbalancer.io/instance-id";

    fn node_json(name: &str, id: Option<&str>, ready: &str, unschedulable: bool) -> String {
        let annotations = match id {
            Some(id) => format!(r#"{{"{}":"{}"}}"#, ANNOTATION, id),
            None => "{}".to_string(),
        };
        format!(
            r#"{{
                "metadata": {{"name": "{name}", "annotations": {annotations}}},
                "spec": {{"unschedulable": {unschedulable}}},
                "status": {{
                    "addresses": [
                        {{"type": "Hostname", "address": "{name}"}},
                        {{"type": "InternalIP", "address": "10.0.0.1"}}
                    ],
                    "conditions": [{{"type": "Ready", "status": "{ready}"}}]
                }}
            }}"#
        )
    }

    fn list(items: &[String]) -> String {
        format!(r#"{{"apiVersion":"v1","kind":"NodeList","items":[{}]}}"#, items.join(","))
    }

    #[test]
    fn test_parse_maps_annotation_to_node_id() {
        let inv = FileInventory::new("unused", ANNOTATION, true);
        let nodes = inv.parse(&list(&[node_json("node-a", Some("i-a"), "True", false)])).unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, NodeId::from("i-a"));
        assert_eq!(nodes[0].name, "node-a");
        assert_eq!(nodes[0].addresses[0].kind, AddressType::Hostname);
        assert_eq!(nodes[0].addresses[1].address, "10.0.0.1");
    }

    #[test]
    fn test_parse_skips_nodes_without_identity() {
        let inv = FileInventory::new("unused", ANNOTATION, false);
        let nodes = inv
            .parse(&list(&[
                node_json("node-a", None, "True", false),
                node_json("node-b", Some(""), "True", false),
                node_json("node-c", Some("i-c"), "True", false),
            ]))
            .unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "node-c");
    }

    #[test]
    fn test_ready_only_filters_unhealthy_nodes() {
        let doc = list(&[
            node_json("ready", Some("i-1"), "True", false),
            node_json("not-ready", Some("i-2"), "False", false),
            node_json("cordoned", Some("i-3"), "True", true),
        ]);

        let strict = FileInventory::new("unused", ANNOTATION, true);
        assert_eq!(strict.parse(&doc).unwrap().len(), 1);

        let lenient = FileInventory::new("unused", ANNOTATION, false);
        assert_eq!(lenient.parse(&doc).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_rejects_malformed_document() {
        let inv = FileInventory::new("unused", ANNOTATION, true);
        assert!(matches!(inv.parse("{not json"), Err(InventoryError::Parse(_))));
    }

    #[tokio::test]
    async fn test_snapshot_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        std::fs::write(&path, list(&[node_json("node-a", Some("i-a"), "True", false)])).unwrap();

        let inv = FileInventory::new(&path, ANNOTATION, true);
        let nodes = inv.snapshot().await.unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_missing_file() {
        let inv = FileInventory::new("/nonexistent/nodes.json", ANNOTATION, true);
        let err = inv.snapshot().await.unwrap_err();
        assert!(matches!(err, InventoryError::Io { .. }));
    }
}
