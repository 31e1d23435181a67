//! Project export to inventory pipeline
//!
//! [`parse_inventory`] runs the whole read side in one synchronous call:
//! element tree, normalization, root selection, metadata index, then the
//! walker and the tree builder over the same selected items. Nothing is
//! shared between calls.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, EmptyPolicy, ParseConfig};
use crate::diagnostics::Diagnostic;
use crate::export::{flat_path_table, leaf_table, record_table, ExportMode, ExportOptions, Table};
use crate::metadata::MetadataIndex;
use crate::normalize::{normalize, Node, NormalizedDocument};
use crate::raw::RawElement;
use crate::tree::InventoryTree;
use crate::walker::{DeviceRecord, LocationContext, Walker};

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("XML error: {0}")]
    Xml(String),
    #[error("Malformed project export: {0}")]
    MalformedDocument(String),
    #[error("Project export contains no system items")]
    NoItemsFound,
    #[error("No top-level item matches root name '{0}'")]
    RootNotFound(String),
    #[error("Invalid parse configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    /// Items were found and walked
    Complete,
    /// The export had no system items and the empty policy accepted it
    Empty,
}

/// Everything read from one project export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub records: Vec<DeviceRecord>,
    pub tree: InventoryTree,
    pub diagnostics: Vec<Diagnostic>,
    pub status: InventoryStatus,
}

impl Inventory {
    fn empty(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            records: Vec::new(),
            tree: InventoryTree::default(),
            diagnostics,
            status: InventoryStatus::Empty,
        }
    }

    /// Rows for the given export mode
    pub fn table(&self, mode: ExportMode, options: &ExportOptions) -> Table {
        match mode {
            ExportMode::Records => record_table(&self.records),
            ExportMode::FlatPath => flat_path_table(&self.tree, options),
            ExportMode::LeafOnly => leaf_table(&self.tree, options),
        }
    }
}

/// Parse a project export into device records and an inventory tree
pub fn parse_inventory(xml: &str, config: &ParseConfig) -> Result<Inventory, InventoryError> {
    config.validate()?;

    let root = RawElement::parse(xml)?;
    let NormalizedDocument {
        items,
        device_data,
        device_records,
        mut diagnostics,
    } = normalize(&root, &config.type_codes)?;

    if items.is_empty() {
        return match config.empty_policy {
            EmptyPolicy::Reject => Err(InventoryError::NoItemsFound),
            EmptyPolicy::Accept => {
                info!("project export has no system items");
                Ok(Inventory::empty(diagnostics.into_vec()))
            }
        };
    }

    let selected = select_roots(items, config.root_name.as_deref())?;

    let mut metadata = match &device_data {
        Some(collection) => {
            MetadataIndex::from_collection(collection, &config.metadata_prefix, &mut diagnostics)
        }
        None => MetadataIndex::new(),
    };
    if let Some(devices) = &device_records {
        metadata.add_device_records(devices, &mut diagnostics);
    }
    debug!(entries = metadata.len(), "built device metadata index");

    let mut walker = Walker::new(&metadata);
    let records = walker.walk(&selected, &LocationContext::new());
    diagnostics.extend(walker.into_diagnostics());

    let tree = InventoryTree::build(&selected, &metadata);

    info!(
        roots = tree.roots.len(),
        nodes = tree.node_count(),
        devices = records.len(),
        metadata_entries = metadata.len(),
        diagnostics = diagnostics.len(),
        "parsed project export"
    );

    Ok(Inventory {
        records,
        tree,
        diagnostics: diagnostics.into_vec(),
        status: InventoryStatus::Complete,
    })
}

/// Keep the top-level items whose name contains `root_name`
fn select_roots(items: Vec<Node>, root_name: Option<&str>) -> Result<Vec<Node>, InventoryError> {
    let Some(root_name) = root_name else {
        return Ok(items);
    };
    let selected: Vec<Node> = items
        .into_iter()
        .filter(|item| item.name.contains(root_name))
        .collect();
    if selected.is_empty() {
        return Err(InventoryError::RootNotFound(root_name.to_string()));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::NodeRole;
    use crate::diagnostics::DiagnosticKind;
    use crate::export::{LEAF_HEADER, PATH_HEADER, RECORD_HEADER};
    use crate::metadata::UNKNOWN;

    const PROJECT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<currentstate version="4">
  <systemitems>
    <item>
      <id>1</id><name>206-15 Shearwater</name><type>1</type>
      <subitems>
        <item>
          <id>2</id><name>Main House</name><type>2</type>
          <subitems>
            <item>
              <id>3</id><name>Ground</name><type>3</type>
              <subitems>
                <item id="10" type="8" name="Kitchen">
                  <subitems>
                    <item><id>42</id><name>Thermostat</name><type>6</type></item>
                    <item><id>43</id><name>Keypad</name><type>7</type></item>
                  </subitems>
                </item>
                <item><id>11</id><name>Office</name><type>8</type></item>
                <item><id>44</id><name>Remote</name><type>6</type><deviceid>900</deviceid></item>
              </subitems>
            </item>
          </subitems>
        </item>
      </subitems>
    </item>
    <item><id>99</id><name>Spare Parts</name><type>1</type></item>
  </systemitems>
  <devicedata>
    <:index:42><manufacturer>Acme</manufacturer><model>T1</model><name>Therm</name></:index:42>
    <:index:43><manufacturer>Control4</manufacturer><model>C4-KD120</model><name>Keypad</name></:index:43>
    <version>1</version>
  </devicedata>
</currentstate>"#;

    fn parse(config: &ParseConfig) -> Inventory {
        parse_inventory(PROJECT, config).unwrap()
    }

    #[test]
    fn test_records_carry_location_and_metadata() {
        let inventory = parse(&ParseConfig::default());
        assert_eq!(inventory.status, InventoryStatus::Complete);

        let names: Vec<_> = inventory.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Thermostat", "Keypad", "Remote"]);

        let thermostat = &inventory.records[0];
        assert_eq!(thermostat.building, "Main House");
        assert_eq!(thermostat.floor, "Ground");
        assert_eq!(thermostat.room, "Kitchen");
        assert_eq!(thermostat.manufacturer, "Acme");
        assert_eq!(thermostat.model, "T1");
        assert_eq!(thermostat.device_name, "Therm");

        assert_eq!(inventory.records[1].manufacturer, "Control4");
    }

    #[test]
    fn test_room_marker_applies_to_following_sibling() {
        let inventory = parse(&ParseConfig::default());
        let remote = &inventory.records[2];
        assert_eq!(remote.room, "Office");
        assert_eq!(remote.floor, "Ground");
        // deviceid 900 has no entry
        assert_eq!(remote.manufacturer, UNKNOWN);
        assert_eq!(remote.model, UNKNOWN);
    }

    #[test]
    fn test_diagnostics_are_returned() {
        let inventory = parse(&ParseConfig::default());
        let kinds: Vec<_> = inventory.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::IgnoredMetadataEntry, DiagnosticKind::UnresolvedMetadata]
        );
        assert!(inventory.diagnostics[1].message.contains("900"));
    }

    #[test]
    fn test_tree_and_tables() {
        let inventory = parse(&ParseConfig::default());
        assert_eq!(inventory.tree.roots.len(), 2);
        assert_eq!(inventory.tree.node_count(), 9);

        let options = ExportOptions::default();
        let records = inventory.table(ExportMode::Records, &options);
        assert_eq!(records.header, RECORD_HEADER);
        assert_eq!(records.len(), 3);

        let paths = inventory.table(ExportMode::FlatPath, &options);
        assert_eq!(paths.header, PATH_HEADER);
        assert_eq!(paths.len(), 9);
        assert_eq!(
            paths.rows[4],
            vec![
                "206-15 Shearwater > Main House > Ground > Kitchen > Thermostat",
                "Acme",
                "T1",
            ]
        );

        let leaves = inventory.table(ExportMode::LeafOnly, &options);
        assert_eq!(leaves.header, LEAF_HEADER);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves.rows[1][6], "Control4");
        assert_eq!(leaves.rows[1][7], "C4-KD120");
    }

    #[test]
    fn test_root_name_filters_walker_and_tree() {
        let config = ParseConfig {
            root_name: Some("Shearwater".to_string()),
            ..ParseConfig::default()
        };
        let inventory = parse(&config);
        assert_eq!(inventory.tree.roots.len(), 1);
        assert_eq!(inventory.tree.roots[0].name, "206-15 Shearwater");
        assert_eq!(inventory.records.len(), 3);

        let config = ParseConfig {
            root_name: Some("Spare".to_string()),
            ..ParseConfig::default()
        };
        let inventory = parse(&config);
        assert!(inventory.records.is_empty());
        assert_eq!(inventory.tree.node_count(), 1);
    }

    #[test]
    fn test_unknown_root_name_fails() {
        let config = ParseConfig {
            root_name: Some("Nowhere".to_string()),
            ..ParseConfig::default()
        };
        let err = parse_inventory(PROJECT, &config).unwrap_err();
        assert!(matches!(err, InventoryError::RootNotFound(name) if name == "Nowhere"));
    }

    #[test]
    fn test_empty_export_policy() {
        let xml = "<currentstate><systemitems/><devicedata/></currentstate>";

        let inventory = parse_inventory(xml, &ParseConfig::default()).unwrap();
        assert_eq!(inventory.status, InventoryStatus::Empty);
        assert!(inventory.records.is_empty());
        assert!(inventory.tree.is_empty());

        let strict = ParseConfig {
            empty_policy: EmptyPolicy::Reject,
            ..ParseConfig::default()
        };
        let err = parse_inventory(xml, &strict).unwrap_err();
        assert!(matches!(err, InventoryError::NoItemsFound));
    }

    #[test]
    fn test_malformed_input() {
        let err = parse_inventory("<currentstate><systemitems>", &ParseConfig::default()).unwrap_err();
        assert!(matches!(err, InventoryError::Xml(_)));

        let err = parse_inventory("<currentstate/>", &ParseConfig::default()).unwrap_err();
        assert!(matches!(err, InventoryError::MalformedDocument(_)));
    }

    #[test]
    fn test_missing_device_data_resolves_unknown() {
        let xml = r#"<currentstate><systemitems>
            <item><id>8</id><name>Den</name><type>8</type>
                <subitems><item><id>5</id><name>Amp</name><type>6</type></item></subitems>
            </item>
        </systemitems></currentstate>"#;
        let inventory = parse_inventory(xml, &ParseConfig::default()).unwrap();
        assert_eq!(inventory.records.len(), 1);
        assert_eq!(inventory.records[0].room, "Den");
        assert_eq!(inventory.records[0].manufacturer, UNKNOWN);
        assert!(inventory
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MissingDeviceData));
    }

    #[test]
    fn test_custom_type_codes_and_prefix() {
        let xml = r#"<currentstate><systemitems>
            <item><id>1</id><name>Upstairs</name><type>4</type>
                <subitems><item><id>5</id><name>Amp</name><type>6</type></item></subitems>
            </item>
        </systemitems>
        <devicedata><dev-5 manufacturer="Sonos" model="Amp"/></devicedata></currentstate>"#;

        let mut config = ParseConfig {
            metadata_prefix: "dev-".to_string(),
            ..ParseConfig::default()
        };
        config.type_codes.set(NodeRole::Floor, vec![4]);

        let inventory = parse_inventory(xml, &config).unwrap();
        assert_eq!(inventory.records[0].floor, "Upstairs");
        assert_eq!(inventory.records[0].manufacturer, "Sonos");
    }

    #[test]
    fn test_ambiguous_codes_rejected() {
        let mut config = ParseConfig::default();
        config.type_codes.set(NodeRole::Room, vec![6]);
        let err = parse_inventory(PROJECT, &config).unwrap_err();
        assert!(matches!(err, InventoryError::Config(ConfigError::AmbiguousTypeCode { code: 6, .. })));
    }

    #[test]
    fn test_device_records_list_resolves_metadata() {
        let xml = r#"<currentstate>
            <systemitems>
                <item><id>8</id><name>Den</name><type>8</type>
                    <subitems><item><id>5</id><name>Amp</name><type>6</type></item></subitems>
                </item>
            </systemitems>
            <devices>
                <device><deviceid>5</deviceid><manufacturer>Sonos</manufacturer><model>Amp</model><name>Den Amp</name></device>
            </devices>
        </currentstate>"#;
        let inventory = parse_inventory(xml, &ParseConfig::default()).unwrap();
        assert_eq!(inventory.records[0].manufacturer, "Sonos");
        assert_eq!(inventory.records[0].device_name, "Den Amp");
        assert!(inventory.diagnostics.is_empty());
    }

    fn nested_project(levels: usize) -> String {
        let mut xml = String::from("<currentstate><systemitems>");
        for i in 0..levels {
            xml.push_str(&format!("<item><id>{i}</id><name>n{i}</name><type>1</type><subitems>"));
        }
        xml.push_str("<item><id>leaf</id><name>Leaf</name><type>6</type></item>");
        xml.push_str(&"</subitems></item>".repeat(levels));
        xml.push_str("</systemitems></currentstate>");
        xml
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let inventory = parse_inventory(&nested_project(200), &ParseConfig::default()).unwrap();
        assert_eq!(inventory.records.len(), 1);

        for levels in [300, 5_000] {
            let err = parse_inventory(&nested_project(levels), &ParseConfig::default()).unwrap_err();
            assert!(matches!(err, InventoryError::MalformedDocument(_)));
        }
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let config = ParseConfig::default();
        assert_eq!(parse(&config), parse(&config));
    }
}
