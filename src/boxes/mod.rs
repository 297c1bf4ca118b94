//! Consolidation-box detection over a single cycle's peak-normalized series.
//!
//! A scan runs one cycle at a time: the series filter restricts the rows to
//! the variant's day range, then [`scanner::scan_cycle`] repeatedly validates
//! an extremum, confirms a threshold move away from it, resolves where the
//! box closes and emits a [`BoxRange`]. Cycles share no state, so
//! [`detect_all`] fans them out over rayon.

mod closure;
mod extremum;
mod filter;
mod range;
mod scanner;
mod threshold;

pub use closure::{Closure, resolve_closure, settle_extreme};
pub use extremum::{Extremum, find_true_low_before_rise, is_significant_high, next_significant_high};
pub use filter::{filter_series, is_strictly_ascending};
pub use range::{BoxBounds, BoxRange, round2};
pub use scanner::scan_cycle;
pub use threshold::{Direction, MoveConfirmation, confirm_move};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{BearConfig, BullConfig};
use crate::data::{CycleRow, PricePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Trough -> rally -> breakdown, within the decline after the peak.
    Bear,
    /// Peak -> pullback -> breakout, within the recovery.
    Bull,
}

impl Variant {
    pub fn direction(self) -> Direction {
        match self {
            Variant::Bear => Direction::Up,
            Variant::Bull => Direction::Down,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Bear => write!(f, "bear"),
            Variant::Bull => write!(f, "bull"),
        }
    }
}

/// Thresholds for one scan, tagged with the variant they drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariantConfig {
    Bear(BearConfig),
    Bull(BullConfig),
}

impl VariantConfig {
    pub fn variant(&self) -> Variant {
        match self {
            VariantConfig::Bear(_) => Variant::Bear,
            VariantConfig::Bull(_) => Variant::Bull,
        }
    }

    /// Day range the series filter keeps.
    pub fn keeps_day(&self, day: i64) -> bool {
        match self {
            VariantConfig::Bear(cfg) => (0..=cfg.max_duration_days as i64).contains(&day),
            VariantConfig::Bull(cfg) => day >= cfg.min_days_from_peak,
        }
    }

    pub fn move_threshold(&self) -> f64 {
        match self {
            VariantConfig::Bear(cfg) => cfg.rise_threshold,
            VariantConfig::Bull(cfg) => cfg.drop_threshold,
        }
    }

    pub fn break_threshold(&self) -> f64 {
        match self {
            VariantConfig::Bear(cfg) => cfg.break_threshold,
            VariantConfig::Bull(cfg) => cfg.break_threshold,
        }
    }

    pub fn min_duration_days(&self) -> i64 {
        match self {
            VariantConfig::Bear(cfg) => cfg.min_duration_days,
            VariantConfig::Bull(cfg) => cfg.min_duration_days,
        }
    }

    /// Rows scanned past the box start before a forced close (bear only).
    pub fn horizon_days(&self) -> Option<usize> {
        match self {
            VariantConfig::Bear(cfg) => Some(cfg.max_duration_days),
            VariantConfig::Bull(_) => None,
        }
    }

    pub fn min_series_len(&self) -> usize {
        match self {
            VariantConfig::Bear(cfg) => cfg.min_series_len,
            VariantConfig::Bull(cfg) => cfg.min_series_len,
        }
    }
}

/// Filtered series and the boxes found in it, for one cycle.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub cycle_id: u32,
    pub points: Vec<PricePoint>,
    pub boxes: Vec<BoxRange>,
}

/// Filter one cycle's rows and scan them for boxes.
///
/// Short series (under `min_series_len` rows after filtering) and series that
/// are not strictly ascending by day yield no boxes.
pub fn detect_boxes(cycle_id: u32, rows: &[CycleRow], config: &VariantConfig) -> CycleResult {
    let points = filter_series(rows, config);

    let boxes = if points.len() < config.min_series_len() {
        log::info!(
            "cycle {cycle_id} {}: {} rows, need {} - skipped",
            config.variant(),
            points.len(),
            config.min_series_len()
        );
        Vec::new()
    } else if !is_strictly_ascending(&points) {
        log::warn!(
            "cycle {cycle_id} {}: rows not ascending by day - skipped",
            config.variant()
        );
        Vec::new()
    } else {
        let boxes = scan_cycle(cycle_id, &points, config);
        log::info!(
            "cycle {cycle_id} {}: {} boxes over {} rows",
            config.variant(),
            boxes.len(),
            points.len()
        );
        boxes
    };

    CycleResult {
        cycle_id,
        points,
        boxes,
    }
}

/// Run [`detect_boxes`] over every cycle in parallel, in cycle order.
pub fn detect_all(
    cycles: &BTreeMap<u32, Vec<CycleRow>>,
    config: &VariantConfig,
) -> Vec<CycleResult> {
    let cycles: Vec<(&u32, &Vec<CycleRow>)> = cycles.iter().collect();
    cycles
        .par_iter()
        .map(|(cycle_id, rows)| detect_boxes(**cycle_id, rows, config))
        .collect()
}
