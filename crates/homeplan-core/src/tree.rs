//! Inventory tree for path-based exports
//!
//! Mirrors the normalized item tree but keeps only what the exports print:
//! each node's name and, when its identifier resolves, the manufacturer and
//! model of its metadata entry.

use serde::{Deserialize, Serialize};

use crate::metadata::{is_known, MetadataIndex};
use crate::normalize::Node;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InventoryNode>,
}

impl InventoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manufacturer: None,
            model: None,
            children: Vec::new(),
        }
    }

    pub fn with_device(mut self, manufacturer: &str, model: &str) -> Self {
        self.manufacturer = Some(manufacturer.to_string());
        self.model = Some(model.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<InventoryNode>) -> Self {
        self.children = children;
        self
    }

    /// True when this node itself has manufacturer or model data
    pub fn carries_device_data(&self) -> bool {
        self.manufacturer.as_deref().is_some_and(is_known) || self.model.as_deref().is_some_and(is_known)
    }

    fn from_node(node: &Node, metadata: &MetadataIndex) -> Self {
        let mut out = Self::new(node.name.clone());
        if let Some(meta) = node.device_id.as_ref().and_then(|id| metadata.get(id)) {
            if meta.is_known() {
                out.manufacturer = Some(meta.manufacturer.clone());
                out.model = Some(meta.model.clone());
            }
        }
        out.children = node
            .children
            .iter()
            .map(|child| Self::from_node(child, metadata))
            .collect();
        out
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(InventoryNode::count).sum::<usize>()
    }
}

/// Reconstructed tree with one root per selected top-level item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTree {
    pub roots: Vec<InventoryNode>,
}

impl InventoryTree {
    /// Attach metadata to a normalized tree. Any node whose identifier
    /// resolves gets manufacturer/model, whatever its role.
    pub fn build(nodes: &[Node], metadata: &MetadataIndex) -> Self {
        Self {
            roots: nodes
                .iter()
                .map(|node| InventoryNode::from_node(node, metadata))
                .collect(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.roots.iter().map(InventoryNode::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
