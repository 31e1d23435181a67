//! Rendering a table in the requested output format

use anyhow::{bail, Result};
use clap::ValueEnum;
use homeplan_core::{to_csv_bytes, to_xlsx_bytes, ExportMode, ExportOptions, Table};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// One row per device with its building, floor and room
    Records,
    /// Every node of the project tree with its full path
    FlatPath,
    /// Only the deepest device-bearing node of each branch
    LeafOnly,
}

impl From<Mode> for ExportMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Records => ExportMode::Records,
            Mode::FlatPath => ExportMode::FlatPath,
            Mode::LeafOnly => ExportMode::LeafOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Aligned columns for a terminal
    Table,
    Json,
    Csv,
    Xlsx,
}

/// Pick the output format: explicit flag first, then the output file extension
pub fn resolve_format(format: Option<Format>, output: Option<&Path>) -> Result<Format> {
    let format = match (format, output) {
        (Some(format), _) => format,
        (None, None) => Format::Table,
        (None, Some(path)) => {
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase);
            match extension.as_deref() {
                Some("csv") => Format::Csv,
                Some("xlsx") => Format::Xlsx,
                Some("json") => Format::Json,
                Some("txt") => Format::Table,
                _ => bail!(
                    "cannot infer output format from {}, pass --format",
                    path.display()
                ),
            }
        }
    };

    if format == Format::Xlsx && output.is_none() {
        bail!("xlsx output is binary, pass --output <FILE>");
    }
    Ok(format)
}

/// Serialize a table into the bytes to write
pub fn render(table: &Table, format: Format, options: &ExportOptions) -> Result<Vec<u8>> {
    Ok(match format {
        Format::Table => render_text(table).into_bytes(),
        Format::Json => {
            let mut json = serde_json::to_vec_pretty(&json_rows(table))?;
            json.push(b'\n');
            json
        }
        Format::Csv => to_csv_bytes(table, options)?,
        Format::Xlsx => to_xlsx_bytes(table, options)?,
    })
}

/// One JSON object per row, keyed by column header
fn json_rows(table: &Table) -> Vec<Value> {
    table
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = table
                .header
                .iter()
                .zip(row)
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect();
            Value::Object(object)
        })
        .collect()
}

fn render_text(table: &Table) -> String {
    let mut widths: Vec<usize> = table.header.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(table.header.as_slice());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(rule.as_slice()));
    for row in &table.rows {
        out.push_str(&line(row.as_slice()));
    }
    out
}
