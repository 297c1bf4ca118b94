use serde::Serialize;

use crate::boxes::{BoxRange, Variant, round2};
use crate::data::PricePoint;

const PEAK_RATE: f64 = 100.0;

const BOX_COLORS: [&str; 8] = [
    "#3B82F6", "#10B981", "#EF4444", "#F59E0B", "#8B5CF6", "#EC4899", "#06B6D4", "#84CC16",
];

/// Colour of the `index`-th box of a cycle (0-based), cycling the palette.
pub fn box_color(index: usize) -> &'static str {
    BOX_COLORS[index % BOX_COLORS.len()]
}

/// Per-day row handed to the chart renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub day: i64,
    pub rate: f64,
    pub date: String,
    pub box_id: Option<u32>,
    /// 1-based day inside the containing box.
    pub box_day: Option<i64>,
    pub box_duration: Option<i64>,
    pub box_start_rate: Option<f64>,
    pub box_extreme_rate: Option<f64>,
    /// Extreme of the latest box whose extreme day lies before this day: the
    /// previous peak on bear charts, the previous trough on bull charts.
    /// Starts at the cycle peak (100).
    pub prev_extreme: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartBox<'a> {
    pub color: &'static str,
    #[serde(flatten)]
    pub range: &'a BoxRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleChart<'a> {
    pub cycle_id: u32,
    pub variant: Variant,
    pub points: Vec<ChartPoint>,
    pub boxes: Vec<ChartBox<'a>>,
}

/// Bear charts follow the low rate, bull charts the high rate.
pub fn annotate_series(
    points: &[PricePoint],
    boxes: &[BoxRange],
    variant: Variant,
) -> Vec<ChartPoint> {
    points
        .iter()
        .map(|point| {
            let day = point.day_index;
            let current = boxes.iter().find(|b| b.contains_day(day));
            let prev_extreme = boxes
                .iter()
                .take_while(|b| b.extreme_day < day)
                .last()
                .map_or(PEAK_RATE, |b| b.extreme_rate);
            let rate = match variant {
                Variant::Bear => point.low_rate,
                Variant::Bull => point.high_rate,
            };

            ChartPoint {
                day,
                rate: round2(rate),
                date: point.timestamp.format("%Y.%m.%d").to_string(),
                box_id: current.map(|b| b.box_id),
                box_day: current.map(|b| day - b.start_day + 1),
                box_duration: current.map(|b| b.duration_days),
                box_start_rate: current.map(|b| b.start_rate),
                box_extreme_rate: current.map(|b| b.extreme_rate),
                prev_extreme,
            }
        })
        .collect()
}

pub fn cycle_chart<'a>(
    cycle_id: u32,
    variant: Variant,
    points: &[PricePoint],
    boxes: &'a [BoxRange],
) -> CycleChart<'a> {
    CycleChart {
        cycle_id,
        variant,
        points: annotate_series(points, boxes, variant),
        boxes: boxes
            .iter()
            .enumerate()
            .map(|(i, range)| ChartBox {
                color: box_color(i),
                range,
            })
            .collect(),
    }
}
