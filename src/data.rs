use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// One row of the long-format cycle table, as produced by cycle alignment.
/// Rates are percentages of the cycle's peak close and may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRow {
    pub cycle_number: u32,
    pub days_since_peak: i64,
    #[serde(with = "calendar_date")]
    pub timestamp: NaiveDate,
    #[serde(default)]
    pub close_price: Option<f64>,
    #[serde(default)]
    pub low_price: Option<f64>,
    #[serde(default)]
    pub high_price: Option<f64>,
    pub close_rate: Option<f64>,
    pub low_rate: Option<f64>,
    pub high_rate: Option<f64>,
}

/// A clean, peak-normalized daily point of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub day_index: i64,
    pub timestamp: NaiveDate,
    pub close_rate: f64,
    pub low_rate: f64,
    pub high_rate: f64,
}

pub fn load_cycle_rows(input: &Path) -> Result<Vec<CycleRow>> {
    let file =
        File::open(input).with_context(|| format!("failed to open input file: {:?}", input))?;

    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut rows: Vec<CycleRow> = Vec::new();
    for (line, result) in rdr.deserialize::<CycleRow>().enumerate() {
        // +2: header line, 1-based numbering
        let row = result.with_context(|| format!("failed to deserialize CSV row {}", line + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_cycle_rows(output: &Path, rows: &[CycleRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output)
        .with_context(|| format!("failed to create output file: {:?}", output))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| "failed to serialize cycle row")?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {:?}", output))?;
    Ok(())
}

/// Split the long table into per-cycle tables, each sorted ascending by day.
/// A day that appears twice within a cycle keeps the later row.
pub fn group_by_cycle(rows: Vec<CycleRow>) -> BTreeMap<u32, Vec<CycleRow>> {
    let mut by_cycle: BTreeMap<u32, BTreeMap<i64, CycleRow>> = BTreeMap::new();
    for row in rows {
        by_cycle
            .entry(row.cycle_number)
            .or_default()
            .insert(row.days_since_peak, row);
    }

    by_cycle
        .into_iter()
        .map(|(cycle, days)| (cycle, days.into_values().collect()))
        .collect()
}

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `YYYY.MM.DD` calendar dates.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    // Timestamps such as 2021-11-08T00:00:00Z keep only the date part
    let date_part = raw.get(..10).unwrap_or(raw);
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, fmt) {
            return Ok(date);
        }
    }
    bail!("failed to parse date: {raw}")
}

pub(crate) mod calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_calendar_date(&raw).map_err(serde::de::Error::custom)
    }
}
