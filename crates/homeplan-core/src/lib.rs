//! Homeplan Core - project export parsing and inventory exports
//!
//! This crate turns a home-automation project export (XML) into:
//! - Device records annotated with the building, floor and room they sit in
//! - A reconstructed inventory tree with manufacturer/model on each node
//! - Tabular exports of either, serialized as CSV or XLSX

pub mod codes;
pub mod config;
pub mod diagnostics;
pub mod export;
pub mod inventory;
pub mod metadata;
pub mod normalize;
pub mod raw;
pub mod tree;
pub mod walker;

pub use codes::{NodeRole, TypeCodeMap};
pub use config::{ConfigError, EmptyPolicy, ParseConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use export::{
    flat_path_rows, leaf_rows, record_table, to_csv_bytes, to_xlsx_bytes, write_csv, write_xlsx,
    ExportError, ExportMode, ExportOptions, LeafRow, PathRow, Table,
};
pub use inventory::{parse_inventory, Inventory, InventoryError, InventoryStatus};
pub use metadata::{DeviceId, DeviceMetadata, MetadataIndex};
pub use normalize::Node;
pub use tree::{InventoryNode, InventoryTree};
pub use walker::{walk, DeviceRecord, LocationContext, WalkOutput, Walker};
