use anyhow::{Context, Result};

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::annotate::cycle_chart;
use crate::boxes::{BoxRange, CycleResult, Variant};

pub fn print_summary(variant: Variant, results: &[CycleResult]) {
    let (extreme_label, move_label) = match variant {
        Variant::Bear => ("peak", "rise%"),
        Variant::Bull => ("low", "drop%"),
    };

    println!("=== {variant} boxes ===");
    for result in results {
        println!(
            "Cycle {} ({} rows): {} boxes",
            result.cycle_id,
            result.points.len(),
            result.boxes.len()
        );
        if result.boxes.is_empty() {
            continue;
        }
        println!(
            "  {:>3} {:>6} {:>8} {:>6} {:>8} {:>6} {:>8} {:>7} {:>5} broken",
            "id", "start", "rate", extreme_label, "rate", "end", "rate", move_label, "days"
        );
        for b in &result.boxes {
            println!(
                "  {:>3} {:>6} {:>8.2} {:>6} {:>8.2} {:>6} {:>8.2} {:>7.2} {:>5} {}",
                b.box_id,
                b.start_day,
                b.start_rate,
                b.extreme_day,
                b.extreme_rate,
                b.end_day,
                b.end_rate,
                b.move_percent,
                b.duration_days,
                b.broken
            );
        }
    }

    let total: usize = results.iter().map(|r| r.boxes.len()).sum();
    println!("Total {variant} boxes: {total}");
}

pub fn write_boxes_csv(output: &Path, boxes: &[BoxRange]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output)
        .with_context(|| format!("failed to create output file: {:?}", output))?;
    for b in boxes {
        wtr.serialize(b).with_context(|| {
            format!("failed to serialize box {} of cycle {}", b.box_id, b.cycle_id)
        })?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {:?}", output))?;
    Ok(())
}

pub fn write_boxes_json(output: &Path, boxes: &[BoxRange]) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("failed to create output file: {:?}", output))?;
    serde_json::to_writer_pretty(BufWriter::new(file), boxes)
        .with_context(|| format!("failed to write {:?}", output))?;
    Ok(())
}

/// One chart annotation file per cycle: `chart_<variant>_cycle<N>.json`.
pub fn write_charts(output_dir: &Path, variant: Variant, results: &[CycleResult]) -> Result<()> {
    for result in results {
        if result.points.is_empty() {
            continue;
        }
        let chart = cycle_chart(result.cycle_id, variant, &result.points, &result.boxes);
        let path = output_dir.join(format!("chart_{variant}_cycle{}.json", result.cycle_id));
        let file = File::create(&path)
            .with_context(|| format!("failed to create output file: {:?}", path))?;
        serde_json::to_writer(BufWriter::new(file), &chart)
            .with_context(|| format!("failed to write {:?}", path))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

/// Write the box table (CSV and JSON) and chart annotations for one variant.
pub fn write_variant(output_dir: &Path, variant: Variant, results: &[CycleResult]) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {:?}", output_dir))?;

    let boxes: Vec<BoxRange> = results.iter().flat_map(|r| r.boxes.iter().cloned()).collect();
    write_boxes_csv(&output_dir.join(format!("boxes_{variant}.csv")), &boxes)?;
    write_boxes_json(&output_dir.join(format!("boxes_{variant}.json")), &boxes)?;
    write_charts(output_dir, variant, results)
}
