use crate::boxes::VariantConfig;
use crate::data::{CycleRow, PricePoint};

/// Restrict a cycle's rows to the variant's day range and drop rows without a
/// close rate. Missing low/high rates fall back to the close rate.
pub fn filter_series(rows: &[CycleRow], config: &VariantConfig) -> Vec<PricePoint> {
    let mut dropped = 0usize;
    let points: Vec<PricePoint> = rows
        .iter()
        .filter(|row| config.keeps_day(row.days_since_peak))
        .filter_map(|row| {
            let Some(close_rate) = row.close_rate.filter(|v| v.is_finite()) else {
                dropped += 1;
                return None;
            };
            Some(PricePoint {
                day_index: row.days_since_peak,
                timestamp: row.timestamp,
                close_rate,
                low_rate: row.low_rate.filter(|v| v.is_finite()).unwrap_or(close_rate),
                high_rate: row.high_rate.filter(|v| v.is_finite()).unwrap_or(close_rate),
            })
        })
        .collect();

    if dropped > 0 {
        log::warn!("dropped {dropped} rows without a close rate");
    }
    points
}

/// Strictly ascending by day, the only ordering the scanners accept.
pub fn is_strictly_ascending(points: &[PricePoint]) -> bool {
    points.windows(2).all(|w| w[0].day_index < w[1].day_index)
}
