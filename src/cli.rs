use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use crate::export::{self, ExportFormat};
use crate::model::Flowchart;
use crate::store::{default_data_dir, FlowchartStore};

#[derive(Debug, Parser)]
#[command(
    name = "flowboard",
    about = "Inspect and export flowcharts saved by the feature flowchart editor."
)]
pub struct Cli {
    /// Directory holding the saved flowchart data (defaults to the
    /// platform data directory).
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the flowcharts saved for a feature.
    List {
        /// Feature the flowcharts belong to.
        #[arg(short, long)]
        feature: String,
    },
    /// Print a saved flowchart as JSON.
    Show {
        #[arg(short, long)]
        feature: String,
        /// Flowchart id as shown by `list`.
        #[arg(short, long)]
        id: String,
    },
    /// Create an empty flowchart under a feature.
    Create {
        #[arg(short, long)]
        feature: String,
        /// Display name for the new flowchart.
        #[arg(short, long)]
        name: String,
    },
    /// Rename a saved flowchart.
    Rename {
        #[arg(short, long)]
        feature: String,
        #[arg(short, long)]
        id: String,
        /// New display name.
        #[arg(short, long)]
        name: String,
    },
    /// Import a flowchart from a JSON export.
    Import {
        #[arg(short, long)]
        feature: String,
        /// Path to a JSON file produced by `export --format json`.
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
    },
    /// Delete a saved flowchart.
    Delete {
        #[arg(short, long)]
        feature: String,
        #[arg(short, long)]
        id: String,
    },
    /// Export a saved flowchart to JSON, SVG, or PNG.
    Export {
        #[arg(short, long)]
        feature: String,
        #[arg(short, long)]
        id: String,
        #[arg(short = 'e', long = "format", value_enum, default_value = "svg")]
        format: ExportFormat,
        /// Output path; defaults to `<flowchart-name>.<ext>` in the current
        /// directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pixel density multiplier for PNG output.
        #[arg(long, default_value_t = export::PNG_SCALE)]
        scale: f32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let mut store = FlowchartStore::on_disk(&data_dir)
        .with_context(|| format!("open flowchart store at {}", data_dir.display()))?;

    match cli.command {
        Command::List { feature } => {
            let items = store.list(&feature)?;
            if items.is_empty() {
                println!("no flowcharts saved for feature '{feature}'");
                return Ok(());
            }
            for item in items {
                println!(
                    "{}  {:<30}  {} nodes  updated {}",
                    item.id,
                    item.name,
                    item.node_count,
                    item.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Command::Show { feature, id } => {
            let chart = store.load(&feature, &id)?;
            print!("{}", export::export_json(&chart)?);
        }
        Command::Create { feature, name } => {
            let chart = Flowchart::new(&feature, name.trim());
            store.save(&chart)?;
            println!("created '{}' as {}", chart.name, chart.id);
        }
        Command::Rename { feature, id, name } => {
            let mut chart = store.load(&feature, &id)?;
            chart.name = name.trim().to_string();
            store.save(&chart)?;
            println!("renamed {id} to '{}'", chart.name);
        }
        Command::Import { feature, input } => {
            let json = fs::read_to_string(&input)
                .with_context(|| format!("read {}", input.display()))?;
            let mut chart: Flowchart = export::import_json(&json)?;
            chart.feature_id = feature;
            store.save(&chart)?;
            println!("imported '{}' as {}", chart.name, chart.id);
        }
        Command::Delete { feature, id } => {
            store.delete(&feature, &id)?;
            println!("deleted {id}");
        }
        Command::Export {
            feature,
            id,
            format,
            output,
            scale,
        } => {
            let chart = store.load(&feature, &id)?;
            let path = output
                .unwrap_or_else(|| PathBuf::from(export::export_filename(&chart.name, format)));
            match format {
                ExportFormat::Json => fs::write(&path, export::export_json(&chart)?),
                ExportFormat::Svg => fs::write(&path, export::export_svg(&chart)?),
                ExportFormat::Png => fs::write(&path, export::export_png(&chart, scale)?),
            }
            .with_context(|| format!("write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
    }

    Ok(())
}
