use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;

use std::fs::File;
use std::path::Path;

use crate::data::CycleRow;

/// Historical cycle tops (UTC close dates), numbered from the 2013 cycle.
pub const KNOWN_PEAK_DATES: [(u32, &str); 3] = [
    (1, "2013-12-04"),
    (2, "2017-12-15"),
    (3, "2021-11-08"),
];

/// How long after the last known top the next one is searched for.
const AUTO_PEAK_DELAY_MS: i64 = (3.0 * 365.25 * 24.0 * 60.0 * 60.0 * 1000.0) as i64;

/// Seconds-resolution timestamps fall below this, milliseconds above.
const SECONDS_CUTOFF: i64 = 10_000_000_000;

#[derive(Debug, Deserialize)]
pub struct OhlcvRow {
    pub timestamp: i64,
    #[serde(default)]
    pub open: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub close: f64,
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclePeak {
    pub cycle_number: u32,
    pub ts: DateTime<Utc>,
    pub close: f64,
}

pub fn normalize_timestamp_ms(ts: i64) -> i64 {
    if ts < SECONDS_CUTOFF { ts * 1000 } else { ts }
}

/// Load daily candles from `timestamp,open,high,low,close,volume`, sorted by time.
pub fn load_ohlcv(input: &Path) -> Result<Vec<Candle>> {
    let file =
        File::open(input).with_context(|| format!("failed to open input file: {:?}", input))?;

    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut candles: Vec<Candle> = Vec::new();
    for result in rdr.deserialize::<OhlcvRow>() {
        let row: OhlcvRow = result.with_context(|| "failed to deserialize CSV row")?;
        let ms = normalize_timestamp_ms(row.timestamp);
        let ts = DateTime::from_timestamp_millis(ms)
            .with_context(|| format!("timestamp out of range: {}", row.timestamp))?;
        candles.push(Candle {
            ts,
            close: row.close,
            low: row.low,
            high: row.high,
        });
    }
    candles.sort_by_key(|c| c.ts);
    candles.dedup_by_key(|c| c.ts);
    Ok(candles)
}

/// Highest close in `[start, end]` (first one on ties).
pub fn find_peak(
    candles: &[Candle],
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Option<Candle> {
    candles
        .iter()
        .filter(|c| c.ts >= start && end.is_none_or(|end| c.ts <= end))
        .fold(None, |best: Option<&Candle>, c| match best {
            Some(b) if b.close >= c.close => Some(b),
            _ => Some(c),
        })
        .copied()
}

/// Locate every cycle top: known dates first, then the highest close from
/// three years after the latest known top onwards. The next top is only
/// searched for when every known top is present in the data.
pub fn find_all_peaks(candles: &[Candle]) -> Vec<CyclePeak> {
    let mut peaks: Vec<CyclePeak> = Vec::new();

    for (cycle_number, raw) in KNOWN_PEAK_DATES {
        let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") else {
            continue;
        };
        match candles.iter().find(|c| c.ts.date_naive() == date) {
            Some(candle) => {
                log::info!("cycle {cycle_number} peak: {date} @ {:.2}", candle.close);
                peaks.push(CyclePeak {
                    cycle_number,
                    ts: candle.ts,
                    close: candle.close,
                });
            }
            None => log::warn!("cycle {cycle_number} peak date {date} not in data"),
        }
    }

    if peaks.len() < KNOWN_PEAK_DATES.len() {
        return peaks;
    }
    let (Some(last), Some(latest)) = (peaks.last().copied(), candles.last()) else {
        return peaks;
    };
    let search_start = last.ts + TimeDelta::milliseconds(AUTO_PEAK_DELAY_MS);
    if search_start < latest.ts {
        if let Some(candle) = find_peak(candles, search_start, None) {
            let cycle_number = last.cycle_number + 1;
            log::info!(
                "cycle {cycle_number} peak (detected): {} @ {:.2}",
                candle.ts.date_naive(),
                candle.close
            );
            peaks.push(CyclePeak {
                cycle_number,
                ts: candle.ts,
                close: candle.close,
            });
        }
    }

    peaks
}

/// Normalize every cycle against its peak close. A cycle ends the day before
/// the next peak; the last one runs to the end of the data.
pub fn align_cycles(candles: &[Candle], peaks: &[CyclePeak]) -> Vec<CycleRow> {
    let mut rows = Vec::new();

    for (i, peak) in peaks.iter().enumerate() {
        if peak.close <= 0.0 {
            log::warn!("cycle {} peak close is not positive, skipped", peak.cycle_number);
            continue;
        }
        let end = peaks.get(i + 1).map(|next| next.ts - TimeDelta::days(1));
        let rate = |price: f64| price / peak.close * 100.0;

        rows.extend(
            candles
                .iter()
                .filter(|c| c.ts >= peak.ts && end.is_none_or(|end| c.ts <= end))
                .map(|c| CycleRow {
                    cycle_number: peak.cycle_number,
                    days_since_peak: (c.ts - peak.ts).num_days(),
                    timestamp: c.ts.date_naive(),
                    close_price: Some(c.close),
                    low_price: Some(c.low),
                    high_price: Some(c.high),
                    close_rate: Some(rate(c.close)),
                    low_rate: Some(rate(c.low)),
                    high_rate: Some(rate(c.high)),
                }),
        );
    }

    rows
}
