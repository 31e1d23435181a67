//! Device metadata lookup
//!
//! The export keeps manufacturer/model data apart from the item tree, in a
//! collection whose entry names are a fixed prefix followed by the device
//! identifier (`<:index:42>...</:index:42>`). [`MetadataIndex`] strips the
//! prefix once and answers lookups by bare identifier for the rest of the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::raw::RawElement;

/// Sentinel for manufacturer/model values that could not be resolved
pub const UNKNOWN: &str = "Unknown";

/// Identifier linking a system item to its metadata entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Manufacturer, model and display name of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

impl DeviceMetadata {
    pub fn new(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            name: name.into(),
        }
    }

    /// The value returned for identifiers with no entry
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN, "")
    }

    /// True when manufacturer or model holds real data
    pub fn is_known(&self) -> bool {
        is_known(&self.manufacturer) || is_known(&self.model)
    }
}

pub(crate) fn is_known(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != UNKNOWN
}

/// Read-only map from device identifier to metadata, built once per document
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    entries: HashMap<DeviceId, DeviceMetadata>,
    unknown: DeviceMetadata,
}

impl Default for MetadataIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataIndex {
    /// Create an empty index; every lookup resolves to the sentinel
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            unknown: DeviceMetadata::unknown(),
        }
    }

    /// Build the index from the raw device metadata collection.
    ///
    /// Entries whose name does not start with `prefix`, or has nothing after
    /// it, are skipped. When an identifier repeats, the first entry wins.
    pub fn from_collection(collection: &RawElement, prefix: &str, diagnostics: &mut Diagnostics) -> Self {
        let mut index = Self::new();
        for entry in &collection.children {
            let Some(id) = entry.name.strip_prefix(prefix).map(str::trim).filter(|id| !id.is_empty())
            else {
                diagnostics.push(
                    DiagnosticKind::IgnoredMetadataEntry,
                    format!("metadata entry <{}> does not match prefix '{prefix}'", entry.name),
                );
                continue;
            };
            index.insert_first(DeviceId::new(id), parse_entry(entry), diagnostics);
        }
        index
    }

    /// Add entries from a `<devices>` list of `<device>` records, each keyed
    /// by its own `deviceid` field. Identifiers already present are kept.
    pub fn add_device_records(&mut self, devices: &RawElement, diagnostics: &mut Diagnostics) {
        for record in &devices.children {
            let id = record
                .child("deviceid")
                .and_then(RawElement::text)
                .or_else(|| record.attribute("deviceid"))
                .filter(|id| !id.trim().is_empty());
            match id {
                Some(id) if record.is_named("device") => {
                    self.insert_first(DeviceId::new(id), parse_entry(record), diagnostics);
                }
                _ => diagnostics.push(
                    DiagnosticKind::IgnoredMetadataEntry,
                    format!("device record <{}> has no deviceid", record.name),
                ),
            }
        }
    }

    fn insert_first(&mut self, id: DeviceId, metadata: DeviceMetadata, diagnostics: &mut Diagnostics) {
        if self.entries.contains_key(&id) {
            diagnostics.push(
                DiagnosticKind::IgnoredMetadataEntry,
                format!("duplicate metadata entry for device {id}, keeping the first"),
            );
            return;
        }
        self.entries.insert(id, metadata);
    }

    /// Insert or replace one entry
    pub fn insert(&mut self, id: DeviceId, metadata: DeviceMetadata) {
        self.entries.insert(id, metadata);
    }

    /// Metadata for an identifier, if the collection has an entry for it
    pub fn get(&self, id: &DeviceId) -> Option<&DeviceMetadata> {
        self.entries.get(id)
    }

    /// Metadata for an optional identifier, falling back to the Unknown sentinel
    pub fn resolve(&self, id: Option<&DeviceId>) -> &DeviceMetadata {
        id.and_then(|id| self.get(id)).unwrap_or(&self.unknown)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(entry: &RawElement) -> DeviceMetadata {
    let field = |name: &str| {
        entry
            .child(name)
            .and_then(RawElement::text)
            .or_else(|| entry.attribute(name))
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    let or_unknown = |value: String| if value.is_empty() { UNKNOWN.to_string() } else { value };

    DeviceMetadata {
        manufacturer: or_unknown(field("manufacturer")),
        model: or_unknown(field("model")),
        name: field("name"),
    }
}
