//! Location-annotated device records
//!
//! Location markers in the export behave like headings in an outline: a
//! room marker applies to every device that follows it in the same sibling
//! list (and below it) until another room marker appears. The walker threads
//! a [`LocationContext`] through each sibling list as a fold. A node's
//! children start from the context in effect at that node, and nothing a
//! subtree does flows back out to the siblings that follow it.

use serde::{Deserialize, Serialize};

use crate::codes::NodeRole;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::metadata::{DeviceId, MetadataIndex};
use crate::normalize::Node;

/// Building / floor / room attribution at one point of the traversal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationContext {
    pub building: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
}

impl LocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context in effect once `node` has been visited.
    ///
    /// A location node replaces exactly one field; any other node leaves the
    /// context unchanged.
    pub fn enter(&self, node: &Node) -> Self {
        let mut next = self.clone();
        let name = Some(node.name.clone());
        match node.role {
            NodeRole::Building => next.building = name,
            NodeRole::Floor => next.floor = name,
            NodeRole::Room => next.room = name,
            NodeRole::Device | NodeRole::Structural => {}
        }
        next
    }
}

/// One device found in the tree, with the location it was found at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub building: String,
    pub floor: String,
    pub room: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub device_id: Option<DeviceId>,
    /// Display name from the metadata entry, empty when unresolved
    pub device_name: String,
}

/// Result of [`walk`]
#[derive(Debug, Clone, Default)]
pub struct WalkOutput {
    pub records: Vec<DeviceRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walk `nodes` starting from `context` and collect device records
pub fn walk(nodes: &[Node], context: &LocationContext, metadata: &MetadataIndex) -> WalkOutput {
    let mut walker = Walker::new(metadata);
    let records = walker.walk(nodes, context);
    WalkOutput {
        records,
        diagnostics: walker.into_diagnostics().into_vec(),
    }
}

/// Pre-order, left-to-right traversal joined against a [`MetadataIndex`]
pub struct Walker<'a> {
    metadata: &'a MetadataIndex,
    diagnostics: Diagnostics,
}

impl<'a> Walker<'a> {
    pub fn new(metadata: &'a MetadataIndex) -> Self {
        Self {
            metadata,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Emit one record per device node, in document order
    pub fn walk(&mut self, nodes: &[Node], context: &LocationContext) -> Vec<DeviceRecord> {
        let mut records = Vec::new();
        nodes.iter().fold(context.clone(), |current, node| {
            let current = current.enter(node);
            if node.role.is_device() {
                records.push(self.record(node, &current));
            }
            records.extend(self.walk(&node.children, &current));
            current
        });
        records
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn record(&mut self, node: &Node, context: &LocationContext) -> DeviceRecord {
        let resolved = node.device_id.as_ref().and_then(|id| self.metadata.get(id));
        if resolved.is_none() {
            let message = match &node.device_id {
                Some(id) => format!("device '{}' ({id}) has no metadata entry", node.name),
                None => format!("device '{}' has no identifier", node.name),
            };
            self.diagnostics.push(DiagnosticKind::UnresolvedMetadata, message);
        }
        let metadata = self.metadata.resolve(node.device_id.as_ref());

        let name = if node.name.trim().is_empty() {
            metadata.name.clone()
        } else {
            node.name.clone()
        };

        DeviceRecord {
            building: context.building.clone().unwrap_or_default(),
            floor: context.floor.clone().unwrap_or_default(),
            room: context.room.clone().unwrap_or_default(),
            name,
            manufacturer: metadata.manufacturer.clone(),
            model: metadata.model.clone(),
            device_id: node.device_id.clone(),
            device_name: metadata.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DeviceMetadata, UNKNOWN};

    fn device(name: &str, id: &str) -> Node {
        Node::new(name, NodeRole::Device).with_device_id(id)
    }

    fn metadata() -> MetadataIndex {
        let mut index = MetadataIndex::new();
        index.insert(DeviceId::new("42"), DeviceMetadata::new("Acme", "T1", "Therm"));
        index.insert(DeviceId::new("2"), DeviceMetadata::new("Lutron", "RRD", "Keypad"));
        index
    }

    #[test]
    fn test_floor_room_device_chain() {
        let tree = vec![Node::new("Root", NodeRole::Structural).with_children(vec![
            Node::new("2nd", NodeRole::Floor).with_children(vec![
                Node::new("Kitchen", NodeRole::Room).with_children(vec![device("Thermostat", "42")]),
            ]),
        ])];

        let output = walk(&tree, &LocationContext::new(), &metadata());
        assert_eq!(output.records.len(), 1);
        let record = &output.records[0];
        assert_eq!(record.building, "");
        assert_eq!(record.floor, "2nd");
        assert_eq!(record.room, "Kitchen");
        assert_eq!(record.name, "Thermostat");
        assert_eq!(record.manufacturer, "Acme");
        assert_eq!(record.model, "T1");
        assert_eq!(record.device_name, "Therm");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_unresolved_sibling_gets_unknown() {
        let tree = vec![Node::new("Den", NodeRole::Room)
            .with_children(vec![device("Remote", "1"), device("Keypad", "2")])];

        let output = walk(&tree, &LocationContext::new(), &metadata());
        assert_eq!(output.records.len(), 2);
        assert_eq!(output.records[0].manufacturer, UNKNOWN);
        assert_eq!(output.records[0].model, UNKNOWN);
        assert_eq!(output.records[0].name, "Remote");
        assert_eq!(output.records[1].manufacturer, "Lutron");
        assert_eq!(output.records[0].room, output.records[1].room);
        assert_eq!(output.records[0].room, "Den");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::UnresolvedMetadata);
    }

    #[test]
    fn test_room_markers_propagate_forward_across_siblings() {
        let tree = vec![
            Node::new("Kitchen", NodeRole::Room),
            device("Thermostat", "42"),
            Node::new("Office", NodeRole::Room),
            device("Keypad", "2"),
        ];

        let output = walk(&tree, &LocationContext::new(), &metadata());
        let rooms: Vec<_> = output.records.iter().map(|r| r.room.as_str()).collect();
        assert_eq!(rooms, vec!["Kitchen", "Office"]);
        let names: Vec<_> = output.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Thermostat", "Keypad"]);
    }

    #[test]
    fn test_no_lookahead_for_earlier_siblings() {
        let tree = vec![device("Early", "42"), Node::new("Late", NodeRole::Room)];
        let output = walk(&tree, &LocationContext::new(), &metadata());
        assert_eq!(output.records[0].room, "");
    }

    #[test]
    fn test_subtree_changes_do_not_leak_back() {
        let tree = vec![
            Node::new("Main", NodeRole::Floor),
            Node::new("Group", NodeRole::Structural).with_children(vec![
                Node::new("Upper", NodeRole::Floor),
                Node::new("Loft", NodeRole::Room),
            ]),
            device("Thermostat", "42"),
        ];

        let output = walk(&tree, &LocationContext::new(), &metadata());
        assert_eq!(output.records[0].floor, "Main");
        assert_eq!(output.records[0].room, "");
    }

    #[test]
    fn test_device_marker_with_children() {
        // A device node can itself contain devices; both are emitted in pre-order.
        let tree = vec![Node::new("Rack", NodeRole::Room).with_children(vec![
            device("Controller", "42").with_children(vec![device("Expansion", "2")]),
        ])];
        let output = walk(&tree, &LocationContext::new(), &metadata());
        let names: Vec<_> = output.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Controller", "Expansion"]);
    }

    #[test]
    fn test_starting_context_is_respected() {
        let start = LocationContext {
            building: Some("North".into()),
            floor: Some("1".into()),
            room: None,
        };
        let output = walk(&[device("Thermostat", "42")], &start, &metadata());
        assert_eq!(output.records[0].building, "North");
        assert_eq!(output.records[0].floor, "1");
    }

    #[test]
    fn test_tree_without_devices_is_empty() {
        let tree = vec![Node::new("Main", NodeRole::Floor)
            .with_children(vec![Node::new("Kitchen", NodeRole::Room)])];
        let output = walk(&tree, &LocationContext::new(), &metadata());
        assert!(output.records.is_empty());
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_blank_device_name_falls_back_to_metadata() {
        let output = walk(&[device("  ", "42")], &LocationContext::new(), &metadata());
        assert_eq!(output.records[0].name, "Therm");
    }

    #[test]
    fn test_missing_identifier_is_reported() {
        let output = walk(
            &[Node::new("Orphan", NodeRole::Device)],
            &LocationContext::new(),
            &metadata(),
        );
        assert_eq!(output.records[0].manufacturer, UNKNOWN);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::UnresolvedMetadata);
    }

    /// Replays the sibling-forward rule independently of the fold and
    /// compares the results on a generated tree.
    #[test]
    fn test_matches_reference_replay() {
        fn reference(nodes: &[Node], mut ctx: LocationContext, out: &mut Vec<LocationContext>) {
            for node in nodes {
                match node.role {
                    NodeRole::Building => ctx.building = Some(node.name.clone()),
                    NodeRole::Floor => ctx.floor = Some(node.name.clone()),
                    NodeRole::Room => ctx.room = Some(node.name.clone()),
                    _ => {}
                }
                if node.role == NodeRole::Device {
                    out.push(ctx.clone());
                }
                reference(&node.children, ctx.clone(), out);
            }
        }

        fn build(seed: &mut u64, depth: usize) -> Vec<Node> {
            let mut nodes = Vec::new();
            let count = 1 + (next(seed) % 4) as usize;
            for i in 0..count {
                let role = match next(seed) % 5 {
                    0 => NodeRole::Building,
                    1 => NodeRole::Floor,
                    2 => NodeRole::Room,
                    3 => NodeRole::Device,
                    _ => NodeRole::Structural,
                };
                let mut node = Node::new(format!("n{depth}-{i}-{}", next(seed) % 100), role);
                if depth < 4 {
                    node.children = build(seed, depth + 1);
                }
                nodes.push(node);
            }
            nodes
        }

        fn next(seed: &mut u64) -> u64 {
            *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            *seed >> 33
        }

        for mut seed in 1..50u64 {
            let tree = build(&mut seed, 0);
            let mut expected = Vec::new();
            reference(&tree, LocationContext::new(), &mut expected);

            let output = walk(&tree, &LocationContext::new(), &MetadataIndex::new());
            assert_eq!(output.records.len(), expected.len());
            for (record, ctx) in output.records.iter().zip(&expected) {
                assert_eq!(record.building, ctx.building.clone().unwrap_or_default());
                assert_eq!(record.floor, ctx.floor.clone().unwrap_or_default());
                assert_eq!(record.room, ctx.room.clone().unwrap_or_default());
            }
        }
    }
}
