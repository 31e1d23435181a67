//! Tabular exports: row selection, CSV and XLSX serialization
//!
//! Row selection happens here and nowhere else. The CSV and XLSX writers
//! only format a finished [`Table`]; saving or downloading the bytes is the
//! caller's business.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Seek, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::tree::{InventoryNode, InventoryTree};
use crate::walker::DeviceRecord;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("Delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),
}

/// Which rows an export contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// One row per device record from the walker
    #[default]
    Records,
    /// One row per tree node, keyed by its full path
    FlatPath,
    /// One row per deepest device-bearing node
    LeafOnly,
}

/// Formatting options shared by all exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Joins path segments in flat-path and leaf-only rows
    #[serde(default = "default_path_separator")]
    pub path_separator: String,
    /// CSV field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Worksheet name for XLSX output
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

fn default_path_separator() -> String {
    " > ".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_sheet_name() -> String {
    "Inventory".to_string()
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            path_separator: default_path_separator(),
            delimiter: default_delimiter(),
            sheet_name: default_sheet_name(),
        }
    }
}

impl ExportOptions {
    fn delimiter_byte(&self) -> Result<u8, ExportError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ExportError::InvalidDelimiter(self.delimiter))
    }
}

/// Header plus rows, ready for serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub const RECORD_HEADER: [&str; 7] = [
    "Building",
    "Floor",
    "Room",
    "Name",
    "Manufacturer",
    "Model",
    "Device Name",
];
pub const PATH_HEADER: [&str; 3] = ["Path", "Manufacturer", "Model"];
pub const LEAF_HEADER: [&str; 8] = [
    "Project",
    "Home",
    "Building",
    "Floor",
    "Room",
    "Device",
    "Manufacturer",
    "Model",
];

/// One row per device record
pub fn record_table(records: &[DeviceRecord]) -> Table {
    let mut table = Table::new(&RECORD_HEADER);
    for record in records {
        table.push_row(vec![
            record.building.clone(),
            record.floor.clone(),
            record.room.clone(),
            record.name.clone(),
            record.manufacturer.clone(),
            record.model.clone(),
            record.device_name.clone(),
        ]);
    }
    table
}

/// A node with its ancestor path, root first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRow {
    pub path: Vec<String>,
    pub manufacturer: String,
    pub model: String,
}

/// Every node of the tree in pre-order, devices or not
pub fn flat_path_rows(tree: &InventoryTree) -> Vec<PathRow> {
    fn visit(node: &InventoryNode, path: &mut Vec<String>, rows: &mut Vec<PathRow>) {
        path.push(node.name.clone());
        rows.push(PathRow {
            path: path.clone(),
            manufacturer: node.manufacturer.clone().unwrap_or_default(),
            model: node.model.clone().unwrap_or_default(),
        });
        for child in &node.children {
            visit(child, path, rows);
        }
        path.pop();
    }

    let mut rows = Vec::new();
    let mut path = Vec::new();
    for root in &tree.roots {
        visit(root, &mut path, &mut rows);
    }
    rows
}

pub fn flat_path_table(tree: &InventoryTree, options: &ExportOptions) -> Table {
    let mut table = Table::new(&PATH_HEADER);
    for row in flat_path_rows(tree) {
        table.push_row(vec![
            row.path.join(options.path_separator.as_str()),
            row.manufacturer,
            row.model,
        ]);
    }
    table
}

/// A leaf device row with its path split into fixed location columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafRow {
    pub project: String,
    pub home: String,
    pub building: String,
    pub floor: String,
    pub room: String,
    /// Remaining path segments below the room column, joined
    pub device: String,
    pub manufacturer: String,
    pub model: String,
    /// Full path, root first
    #[serde(skip)]
    pub path: Vec<String>,
}

impl LeafRow {
    /// Split a path positionally: project, home, building, floor, room, then
    /// everything deeper as the device sub-path. This assumes every branch has
    /// the same depth above the room level.
    fn from_path(path: &[&str], node: &InventoryNode, separator: &str) -> Self {
        let part = |i: usize| path.get(i).map(|s| s.to_string()).unwrap_or_default();
        Self {
            project: part(0),
            home: part(1),
            building: part(2),
            floor: part(3),
            room: part(4),
            device: path.get(5..).map(|rest| rest.join(separator)).unwrap_or_default(),
            manufacturer: node.manufacturer.clone().unwrap_or_default(),
            model: node.model.clone().unwrap_or_default(),
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Rows for the deepest device-bearing node of every branch.
///
/// A node is emitted when it carries device data and none of its descendants
/// does, so an ancestor already represented by a device below it never
/// appears.
pub fn leaf_rows(tree: &InventoryTree, separator: &str) -> Vec<LeafRow> {
    fn visit<'a>(
        node: &'a InventoryNode,
        path: &mut Vec<&'a str>,
        separator: &str,
        rows: &mut Vec<LeafRow>,
    ) -> bool {
        path.push(&node.name);
        let mut below = false;
        for child in &node.children {
            below |= visit(child, path, separator, rows);
        }
        let carries = node.carries_device_data();
        if carries && !below {
            rows.push(LeafRow::from_path(path, node, separator));
        }
        path.pop();
        carries || below
    }

    let mut rows = Vec::new();
    let mut path = Vec::new();
    for root in &tree.roots {
        visit(root, &mut path, separator, &mut rows);
    }
    rows
}

pub fn leaf_table(tree: &InventoryTree, options: &ExportOptions) -> Table {
    let mut table = Table::new(&LEAF_HEADER);
    for row in leaf_rows(tree, &options.path_separator) {
        table.push_row(vec![
            row.project,
            row.home,
            row.building,
            row.floor,
            row.room,
            row.device,
            row.manufacturer,
            row.model,
        ]);
    }
    table
}

/// Write a table as delimited text with standard CSV quoting
pub fn write_csv<W: Write>(table: &Table, writer: W, options: &ExportOptions) -> Result<(), ExportError> {
    let mut csv = csv::WriterBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .from_writer(writer);
    csv.write_record(&table.header)?;
    for row in &table.rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv_bytes(table: &Table, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf, options)?;
    Ok(buf)
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Write a single-sheet XLSX workbook and return the underlying writer
pub fn write_xlsx<W: Write + Seek>(table: &Table, writer: W, options: &ExportOptions) -> Result<W, ExportError> {
    let mut zip = ZipWriter::new(writer);
    let file_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let workbook = workbook_xml(&sheet_name(&options.sheet_name))?;
    let sheet = sheet_xml(table)?;
    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", workbook.as_slice()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/worksheets/sheet1.xml", sheet.as_slice()),
    ];
    for (name, content) in parts {
        zip.start_file(name, file_options)?;
        zip.write_all(content)?;
    }

    Ok(zip.finish()?)
}

pub fn to_xlsx_bytes(table: &Table, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let cursor = write_xlsx(table, Cursor::new(Vec::new()), options)?;
    Ok(cursor.into_inner())
}

/// Worksheet names are limited to 31 characters and may not contain `:\/?*[]`
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|&c| is_xml_char(c))
        .map(|c| if ":\\/?*[]".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

/// Characters allowed in an XML 1.0 document
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA
fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'A' + (index % 26) as u8));
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn xml_error(err: impl std::fmt::Display) -> ExportError {
    ExportError::Xml(err.to_string())
}

struct XmlParts {
    writer: Writer<Vec<u8>>,
}

impl XmlParts {
    fn new() -> Result<Self, ExportError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_error)?;
        Ok(Self { writer })
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ExportError> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(element)).map_err(xml_error)
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ExportError> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(element)).map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> Result<(), ExportError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    /// Write character data, dropping characters XML cannot carry
    fn text(&mut self, text: &str) -> Result<(), ExportError> {
        let text: String = text.chars().filter(|&c| is_xml_char(c)).collect();
        self.writer
            .write_event(Event::Text(BytesText::new(&text)))
            .map_err(xml_error)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

fn workbook_xml(sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut xml = XmlParts::new()?;
    xml.start("workbook", &[("xmlns", SPREADSHEET_NS), ("xmlns:r", RELATIONSHIPS_NS)])?;
    xml.start("sheets", &[])?;
    xml.empty("sheet", &[("name", sheet_name), ("sheetId", "1"), ("r:id", "rId1")])?;
    xml.end("sheets")?;
    xml.end("workbook")?;
    Ok(xml.finish())
}

/// Cells are inline strings, so the workbook needs no shared string table
fn sheet_xml(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut xml = XmlParts::new()?;
    xml.start("worksheet", &[("xmlns", SPREADSHEET_NS)])?;
    xml.start("sheetData", &[])?;
    for (i, row) in std::iter::once(&table.header).chain(&table.rows).enumerate() {
        let row_number = (i + 1).to_string();
        xml.start("row", &[("r", row_number.as_str())])?;
        for (col, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let reference = format!("{}{}", column_name(col), row_number);
            xml.start("c", &[("r", reference.as_str()), ("t", "inlineStr")])?;
            xml.start("is", &[])?;
            xml.start("t", &[("xml:space", "preserve")])?;
            xml.text(value)?;
            xml.end("t")?;
            xml.end("is")?;
            xml.end("c")?;
        }
        xml.end("row")?;
    }
    xml.end("sheetData")?;
    xml.end("worksheet")?;
    Ok(xml.finish())
}
