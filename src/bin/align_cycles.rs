use anyhow::{Context, Result};
use clap::Parser;

use std::path::PathBuf;

use cycle_boxes::cycles::{align_cycles, find_all_peaks, load_ohlcv};
use cycle_boxes::data::write_cycle_rows;

/// Align daily OHLCV candles by cycle peak and write the long-format cycle CSV.
#[derive(Debug, Parser)]
struct Args {
    /// Path to the daily OHLCV CSV (timestamp,open,high,low,close,volume)
    #[arg(long)]
    input: PathBuf,

    /// Where to write the cycle CSV
    #[arg(long, default_value = "data/cycles.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let candles = load_ohlcv(&args.input)
        .with_context(|| format!("failed to load candles from {:?}", args.input))?;
    if candles.is_empty() {
        println!("No data found in CSV.");
        return Ok(());
    }
    println!("Loaded {} daily candles.", candles.len());

    let peaks = find_all_peaks(&candles);
    if peaks.is_empty() {
        println!("No cycle peak found in the data.");
        return Ok(());
    }
    for peak in &peaks {
        println!(
            "Cycle {}: peak {} @ {:.2}",
            peak.cycle_number,
            peak.ts.date_naive(),
            peak.close
        );
    }

    let rows = align_cycles(&candles, &peaks);
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir: {:?}", parent))?;
    }
    write_cycle_rows(&args.output, &rows)?;
    println!("Wrote {} rows to {}", rows.len(), args.output.display());

    Ok(())
}
