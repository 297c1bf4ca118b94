use chrono::NaiveDate;
use serde::Serialize;

use crate::boxes::Variant;
use crate::boxes::extremum::Extremum;
use crate::boxes::threshold::Direction;
use crate::data::{PricePoint, calendar_date};

/// A closed consolidation range within one cycle. Never mutated once emitted.
///
/// Bear boxes run low -> peak -> end, bull boxes high -> trough -> end; the
/// `extreme_*` fields hold the peak or trough respectively.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxRange {
    pub cycle_id: u32,
    pub variant: Variant,
    pub box_id: u32,
    pub start_day: i64,
    #[serde(with = "calendar_date")]
    pub start_date: NaiveDate,
    pub start_rate: f64,
    pub extreme_day: i64,
    #[serde(with = "calendar_date")]
    pub extreme_date: NaiveDate,
    pub extreme_rate: f64,
    pub end_day: i64,
    #[serde(with = "calendar_date")]
    pub end_date: NaiveDate,
    pub end_rate: f64,
    /// Rise (bear) or drop (bull) from start to extreme, in rate points.
    pub move_percent: f64,
    pub duration_days: i64,
    pub broken: bool,
}

/// Boundary points of a box that passed every gate.
#[derive(Debug, Clone, Copy)]
pub struct BoxBounds {
    pub start: Extremum,
    pub extreme: Extremum,
    pub end_index: usize,
    pub broken: bool,
}

impl BoxBounds {
    pub fn duration_days(&self, points: &[PricePoint]) -> i64 {
        points[self.end_index].day_index - points[self.start.index].day_index
    }

    pub fn move_percent(&self) -> f64 {
        (self.extreme.rate - self.start.rate).abs()
    }
}

impl BoxRange {
    pub fn assemble(
        cycle_id: u32,
        box_id: u32,
        variant: Variant,
        points: &[PricePoint],
        bounds: &BoxBounds,
    ) -> Self {
        let start = &points[bounds.start.index];
        let extreme = &points[bounds.extreme.index];
        let end = &points[bounds.end_index];
        // Bear boxes end on a breakdown, reported on the low; bull on the high.
        let end_rate = match variant.direction() {
            Direction::Up => end.low_rate,
            Direction::Down => end.high_rate,
        };

        Self {
            cycle_id,
            variant,
            box_id,
            start_day: start.day_index,
            start_date: start.timestamp,
            start_rate: round2(bounds.start.rate),
            extreme_day: extreme.day_index,
            extreme_date: extreme.timestamp,
            extreme_rate: round2(bounds.extreme.rate),
            end_day: end.day_index,
            end_date: end.timestamp,
            end_rate: round2(end_rate),
            move_percent: round2(bounds.move_percent()),
            duration_days: bounds.duration_days(points),
            broken: bounds.broken,
        }
    }

    pub fn contains_day(&self, day: i64) -> bool {
        self.start_day <= day && day <= self.end_day
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
