//! Canonical system item tree
//!
//! Converts the raw element tree into [`Node`]s. This is the only place that
//! knows how the export spells item fields: `id`, `name`, `type` and
//! `deviceid` may each be an attribute or a child element, and children live
//! in one or more `subitems` containers. Anything irregular is coerced and
//! reported as an [`UnexpectedNodeShape`](DiagnosticKind::UnexpectedNodeShape)
//! diagnostic.

use serde::Serialize;

use crate::codes::{NodeRole, TypeCodeMap};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::inventory::InventoryError;
use crate::metadata::DeviceId;
use crate::raw::RawElement;

const SYSTEM_ITEMS: &str = "systemitems";
const ITEM: &str = "item";
const SUBITEMS: &str = "subitems";
const DEVICE_DATA: &str = "devicedata";
const DEVICES: &str = "devices";

/// A system item after normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: Option<String>,
    pub name: String,
    /// Raw `type` code as found in the export
    pub code: Option<i64>,
    pub role: NodeRole,
    /// Key into the device metadata collection
    pub device_id: Option<DeviceId>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>, role: NodeRole) -> Self {
        Self {
            id: None,
            name: name.into(),
            code: None,
            role,
            device_id: None,
            children: Vec::new(),
        }
    }

    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(DeviceId::new(id));
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }
}

/// Output of the normalizer
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    /// Top-level system items in document order
    pub items: Vec<Node>,
    /// The raw device metadata collection, if the export has one
    pub device_data: Option<RawElement>,
    /// A `<devices>` list of `<device>` records, if the export has one
    pub device_records: Option<RawElement>,
    pub diagnostics: Diagnostics,
}

/// Normalize a parsed export. Fails only when there is no system items container.
pub fn normalize(root: &RawElement, codes: &TypeCodeMap) -> Result<NormalizedDocument, InventoryError> {
    let system_items = root.find_descendant(SYSTEM_ITEMS).ok_or_else(|| {
        InventoryError::MalformedDocument(format!(
            "no <{SYSTEM_ITEMS}> container under <{}>",
            root.name
        ))
    })?;

    let mut normalizer = Normalizer {
        codes,
        diagnostics: Diagnostics::new(),
    };
    let items = normalizer.items(system_items, "");

    let device_data = root.find_descendant(DEVICE_DATA).cloned();
    let device_records = root.find_descendant(DEVICES).cloned();
    if device_data.is_none() && device_records.is_none() {
        normalizer.diagnostics.push(
            DiagnosticKind::MissingDeviceData,
            format!("no <{DEVICE_DATA}> or <{DEVICES}> collection, all devices resolve to Unknown"),
        );
    }

    Ok(NormalizedDocument {
        items,
        device_data,
        device_records,
        diagnostics: normalizer.diagnostics,
    })
}

struct Normalizer<'a> {
    codes: &'a TypeCodeMap,
    diagnostics: Diagnostics,
}

impl Normalizer<'_> {
    /// Normalize the `item` children of one container
    fn items(&mut self, container: &RawElement, parent: &str) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(container.children.len());
        for child in &container.children {
            if child.is_named(ITEM) {
                nodes.push(self.item(child));
            } else {
                self.diagnostics.push(
                    DiagnosticKind::UnexpectedNodeShape,
                    format!(
                        "skipping <{}> inside <{}> of '{parent}'",
                        child.name, container.name
                    ),
                );
            }
        }
        nodes
    }

    fn item(&mut self, element: &RawElement) -> Node {
        let id = self.scalar(element, "id");
        let label = id.as_deref().unwrap_or("?").to_string();

        let name = self.scalar(element, "name").unwrap_or_else(|| {
            self.diagnostics.push(
                DiagnosticKind::UnexpectedNodeShape,
                format!("item {label} has no name"),
            );
            String::new()
        });

        let code = self.scalar(element, "type").and_then(|raw| match raw.parse::<i64>() {
            Ok(code) => Some(code),
            Err(_) => {
                self.diagnostics.push(
                    DiagnosticKind::UnexpectedNodeShape,
                    format!("item {label} ('{name}') has non-numeric type '{raw}'"),
                );
                None
            }
        });
        let role = self.codes.role_of(code);

        let device_id = self
            .scalar(element, "deviceid")
            .or_else(|| id.clone())
            .map(DeviceId::new);

        let mut containers = element.children_named(SUBITEMS).peekable();
        let mut children = Vec::new();
        let mut container_count = 0;
        while let Some(container) = containers.next() {
            container_count += 1;
            children.extend(self.items(container, &name));
            if containers.peek().is_some() && container_count == 1 {
                self.diagnostics.push(
                    DiagnosticKind::UnexpectedNodeShape,
                    format!("item {label} ('{name}') has several <{SUBITEMS}> containers, merging"),
                );
            }
        }

        Node {
            id,
            name,
            code,
            role,
            device_id,
            children,
        }
    }

    /// Read a single-valued field from either an attribute or a child element
    fn scalar(&mut self, element: &RawElement, field: &str) -> Option<String> {
        let attribute = element.attribute(field).filter(|v| !v.is_empty());
        let mut elements = element.children_named(field);
        let first = elements.next();
        if elements.next().is_some() {
            self.diagnostics.push(
                DiagnosticKind::UnexpectedNodeShape,
                format!("<{}> repeats <{field}>, using the first", element.name),
            );
        }
        let text = first.map(|e| e.text().unwrap_or_default().to_string());

        let value = match (attribute, text) {
            (Some(attr), Some(text)) if !text.is_empty() => {
                if attr != text {
                    self.diagnostics.push(
                        DiagnosticKind::UnexpectedNodeShape,
                        format!(
                            "<{}> has {field}=\"{attr}\" and <{field}>{text}</{field}>, using the element",
                            element.name
                        ),
                    );
                }
                Some(text)
            }
            (Some(attr), _) => Some(attr.to_string()),
            (None, text) => text,
        };
        value.filter(|value| !value.is_empty())
    }
}
