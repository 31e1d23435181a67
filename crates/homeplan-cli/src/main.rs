//! Homeplan - project export inventory tool
//!
//! Reads a home-automation project export and prints or writes its device
//! inventory as a table, JSON, CSV or XLSX.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use homeplan_core::{parse_inventory, EmptyPolicy, InventoryStatus, NodeRole, ParseConfig};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use output::{Format, Mode};

#[derive(Parser, Debug)]
#[command(name = "homeplan")]
#[command(about = "Device inventory from home-automation project exports")]
#[command(version)]
struct Args {
    /// Project export (XML) to read
    #[arg(required_unless_present = "init_config")]
    input: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "homeplan.toml")]
    config: PathBuf,

    /// Which rows to export
    #[arg(short, long, value_enum, default_value = "records")]
    mode: Mode,

    /// Output format (inferred from --output when omitted)
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep only top-level items whose name contains this text
    #[arg(long)]
    root: Option<String>,

    /// Type codes for building items (comma separated)
    #[arg(long, value_delimiter = ',')]
    building_code: Vec<i64>,

    /// Type codes for floor items
    #[arg(long, value_delimiter = ',')]
    floor_code: Vec<i64>,

    /// Type codes for room items
    #[arg(long, value_delimiter = ',')]
    room_code: Vec<i64>,

    /// Type codes for device items
    #[arg(long, value_delimiter = ',')]
    device_code: Vec<i64>,

    /// Fail when the export contains no items
    #[arg(long)]
    strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write a default configuration file to --config and exit
    #[arg(long)]
    init_config: bool,
}

impl Args {
    /// Command-line values take precedence over the configuration file
    fn apply_overrides(&self, parse: &mut ParseConfig) {
        if let Some(root) = &self.root {
            parse.root_name = Some(root.clone());
        }
        if self.strict {
            parse.empty_policy = EmptyPolicy::Reject;
        }
        let overrides = [
            (NodeRole::Building, &self.building_code),
            (NodeRole::Floor, &self.floor_code),
            (NodeRole::Room, &self.room_code),
            (NodeRole::Device, &self.device_code),
        ];
        for (role, codes) in overrides {
            if !codes.is_empty() {
                parse.type_codes.set(role, codes.clone());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for exported data
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.init_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let input = args.input.as_ref().context("no input file given")?;
    let format = output::resolve_format(args.format, args.output.as_deref())?;

    let mut config = config::load_config(&args.config)?;
    args.apply_overrides(&mut config.parse);

    let xml = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    let inventory = parse_inventory(&xml, &config.parse)
        .with_context(|| format!("failed to parse {}", input.display()))?;

    if inventory.status == InventoryStatus::Empty {
        warn!(path = %input.display(), "Project export contains no system items");
    }
    if !inventory.diagnostics.is_empty() {
        info!(
            count = inventory.diagnostics.len(),
            "Export had irregularities, see warnings above"
        );
    }

    let table = inventory.table(args.mode.into(), &config.export);
    let bytes = output::render(&table, format, &config.export)?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), rows = table.len(), "Wrote export");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
