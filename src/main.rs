use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use std::path::PathBuf;

use cycle_boxes::boxes::{VariantConfig, detect_all};
use cycle_boxes::config::AppConfig;
use cycle_boxes::data::{group_by_cycle, load_cycle_rows};
use cycle_boxes::output::{print_summary, write_variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Bear,
    Bull,
    Both,
}

/// Detect consolidation boxes in peak-aligned cycle data.
#[derive(Debug, Parser)]
struct Args {
    /// config-file path (toml/json/yaml); defaults and CYCLE_BOXES__* env vars otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the cycle CSV (cycle_number,days_since_peak,timestamp,close_rate,low_rate,high_rate)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory for box tables and chart annotations
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Which scan to run
    #[arg(long, value_enum, default_value_t = VariantArg::Both)]
    variant: VariantArg,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config)?;
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let rows = load_cycle_rows(&config.input)
        .with_context(|| format!("failed to load cycle rows from {:?}", config.input))?;
    if rows.is_empty() {
        println!("No data found in CSV.");
        return Ok(());
    }

    let cycles = group_by_cycle(rows);
    println!(
        "Loaded {} cycles: {:?}",
        cycles.len(),
        cycles.keys().collect::<Vec<_>>()
    );

    let mut scans = Vec::new();
    if matches!(args.variant, VariantArg::Bear | VariantArg::Both) {
        scans.push(VariantConfig::Bear(config.bear));
    }
    if matches!(args.variant, VariantArg::Bull | VariantArg::Both) {
        scans.push(VariantConfig::Bull(config.bull));
    }

    for scan in &scans {
        let results = detect_all(&cycles, scan);
        print_summary(scan.variant(), &results);
        write_variant(&config.output_dir, scan.variant(), &results)?;
        println!();
    }
    println!("Results written to {}", config.output_dir.display());

    Ok(())
}
