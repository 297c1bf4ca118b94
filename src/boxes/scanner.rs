use crate::boxes::closure::{resolve_closure, settle_extreme};
use crate::boxes::extremum::{Extremum, find_true_low_before_rise, next_significant_high};
use crate::boxes::range::{BoxBounds, BoxRange};
use crate::boxes::threshold::{MoveConfirmation, confirm_move};
use crate::boxes::{Variant, VariantConfig};
use crate::data::PricePoint;

/// Cycle peak rate every bear cycle starts from.
const CYCLE_PEAK_RATE: f64 = 100.0;

/// Where the scan cursor is in the detection of the next box.
#[derive(Debug, Clone, Copy)]
enum ScanState {
    SeekingExtremum,
    ConfirmingMove { origin: Extremum },
    TrackingClosure {
        origin: Extremum,
        confirmation: MoveConfirmation,
    },
    EmitOrSkip { bounds: BoxBounds },
    Done,
}

/// Scan-local state threaded through one cycle.
struct CycleScan<'a> {
    cycle_id: u32,
    points: &'a [PricePoint],
    config: &'a VariantConfig,
    cursor: usize,
    /// Peak of the last emitted bear box; gates the next low.
    prev_box_high: f64,
    boxes: Vec<BoxRange>,
}

impl<'a> CycleScan<'a> {
    fn new(cycle_id: u32, points: &'a [PricePoint], config: &'a VariantConfig) -> Self {
        let cursor = match config {
            // The peak day itself never opens a box
            VariantConfig::Bear(_) => 1,
            VariantConfig::Bull(cfg) => cfg.lookback_days,
        };
        Self {
            cycle_id,
            points,
            config,
            cursor,
            prev_box_high: CYCLE_PEAK_RATE,
            boxes: Vec::new(),
        }
    }

    fn resume_after(&mut self, index: usize) -> ScanState {
        self.cursor = index + 1;
        ScanState::SeekingExtremum
    }

    fn seek_extremum(&mut self) -> ScanState {
        if self.cursor >= self.points.len() {
            return ScanState::Done;
        }

        let candidate = match self.config {
            VariantConfig::Bear(cfg) => {
                find_true_low_before_rise(self.points, self.cursor, cfg.rise_threshold)
            }
            VariantConfig::Bull(cfg) => {
                next_significant_high(self.points, self.cursor, cfg.lookback_days)
            }
        };
        let Some(origin) = candidate else {
            return ScanState::Done;
        };

        if let VariantConfig::Bear(cfg) = self.config {
            let drop_from_prev_high = self.prev_box_high - origin.rate;
            if drop_from_prev_high < cfg.min_drop_from_prev_high {
                log::debug!(
                    "cycle {}: low {:.2} on day {} only {:.2} under previous high, skipped",
                    self.cycle_id,
                    origin.rate,
                    self.points[origin.index].day_index,
                    drop_from_prev_high
                );
                return self.resume_after(origin.index);
            }
        }

        ScanState::ConfirmingMove { origin }
    }

    fn confirm(&mut self, origin: Extremum) -> ScanState {
        let direction = self.config.variant().direction();
        let confirmation =
            confirm_move(self.points, origin, direction, self.config.move_threshold());
        if !confirmation.found {
            return self.resume_after(origin.index);
        }
        ScanState::TrackingClosure {
            origin,
            confirmation,
        }
    }

    fn track_closure(&mut self, origin: Extremum, confirmation: MoveConfirmation) -> ScanState {
        let direction = self.config.variant().direction();
        let horizon = self.config.horizon_days().map(|days| origin.index + days);
        let closure = resolve_closure(
            self.points,
            origin,
            confirmation,
            direction,
            self.config.break_threshold(),
            horizon,
        );

        let settled = settle_extreme(self.points, origin, &closure, direction);
        let Some(extreme) = settled else {
            return self.resume_after(origin.index);
        };
        let bounds = BoxBounds {
            start: origin,
            extreme,
            end_index: closure.end_index,
            broken: closure.broken,
        };
        // A horizon shorter than the confirming move leaves the box unconfirmed
        if bounds.move_percent() < self.config.move_threshold() {
            log::debug!(
                "cycle {}: box from day {} closed before its move confirmed",
                self.cycle_id,
                self.points[origin.index].day_index
            );
            return self.resume_after(origin.index);
        }

        ScanState::EmitOrSkip { bounds }
    }

    fn emit_or_skip(&mut self, bounds: BoxBounds) -> ScanState {
        if bounds.duration_days(self.points) < self.config.min_duration_days() {
            return self.resume_after(bounds.end_index);
        }

        let box_id = self.boxes.len() as u32 + 1;
        let range = BoxRange::assemble(
            self.cycle_id,
            box_id,
            self.config.variant(),
            self.points,
            &bounds,
        );
        log::debug!(
            "cycle {} {} box {}: day {} -> {} ({:+.2}, broken={})",
            self.cycle_id,
            self.config.variant(),
            box_id,
            range.start_day,
            range.end_day,
            range.move_percent,
            range.broken
        );
        self.boxes.push(range);
        if self.config.variant() == Variant::Bear {
            self.prev_box_high = bounds.extreme.rate;
        }

        self.resume_after(bounds.end_index)
    }

    fn run(mut self) -> Vec<BoxRange> {
        let mut state = ScanState::SeekingExtremum;
        loop {
            state = match state {
                ScanState::SeekingExtremum => self.seek_extremum(),
                ScanState::ConfirmingMove { origin } => self.confirm(origin),
                ScanState::TrackingClosure {
                    origin,
                    confirmation,
                } => self.track_closure(origin, confirmation),
                ScanState::EmitOrSkip { bounds } => self.emit_or_skip(bounds),
                ScanState::Done => return self.boxes,
            };
        }
    }
}

/// Run the box scan over an already filtered, ascending series.
///
/// No minimum-length gate is applied here; see [`crate::boxes::detect_boxes`].
pub fn scan_cycle(cycle_id: u32, points: &[PricePoint], config: &VariantConfig) -> Vec<BoxRange> {
    CycleScan::new(cycle_id, points, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::test_support::{flat_series, ohlc_series};
    use crate::config::{BearConfig, BullConfig};

    fn bear(overrides: impl FnOnce(&mut BearConfig)) -> VariantConfig {
        let mut cfg = BearConfig::default();
        overrides(&mut cfg);
        VariantConfig::Bear(cfg)
    }

    fn bull(overrides: impl FnOnce(&mut BullConfig)) -> VariantConfig {
        let mut cfg = BullConfig::default();
        overrides(&mut cfg);
        VariantConfig::Bull(cfg)
    }

    fn assert_box_invariants(boxes: &[BoxRange], threshold: f64, min_duration: i64) {
        for b in boxes {
            assert!(b.start_day < b.extreme_day, "{b:?}");
            assert!(b.extreme_day <= b.end_day, "{b:?}");
            assert_eq!(b.duration_days, b.end_day - b.start_day);
            assert!(b.duration_days >= min_duration, "{b:?}");
            assert!(b.move_percent >= threshold - 0.01, "{b:?}");
        }
        for pair in boxes.windows(2) {
            assert!(pair[1].start_day > pair[0].end_day, "{pair:?}");
            assert_eq!(pair[1].box_id, pair[0].box_id + 1);
        }
    }

    #[test]
    fn test_bear_rally_then_breakdown_yields_one_box() {
        // lows/highs per day: the low of 90 on day 2 rallies to 96 on day 4,
        // day 6 breaks 2% under 90 (88.2)
        let points = ohlc_series(
            0,
            &[
                (100.0, 100.0),
                (94.0, 94.0),
                (90.0, 90.0),
                (91.0, 91.0),
                (96.0, 96.0),
                (95.0, 95.0),
                (88.0, 89.0),
            ],
        );
        let boxes = scan_cycle(1, &points, &bear(|_| {}));

        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.box_id, 1);
        assert_eq!(b.start_day, 2);
        assert_eq!(b.start_rate, 90.0);
        assert_eq!(b.extreme_day, 4);
        assert_eq!(b.extreme_rate, 96.0);
        assert_eq!(b.end_day, 6);
        assert_eq!(b.end_rate, 88.0);
        assert!(b.broken);
        assert_eq!(b.move_percent, 6.0);
        assert_eq!(b.duration_days, 4);
    }

    #[test]
    fn test_bear_peak_keeps_rising_until_series_end_is_not_broken() {
        // 89 never reaches the 88.2 break level, so the box runs to the end
        let points = flat_series(0, &[100.0, 94.0, 90.0, 91.0, 96.0, 98.0, 89.0]);
        let boxes = scan_cycle(1, &points, &bear(|_| {}));

        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.start_day, 2);
        assert_eq!(b.extreme_day, 5);
        assert_eq!(b.extreme_rate, 98.0);
        assert_eq!(b.end_day, 6);
        assert!(!b.broken);
        assert_eq!(b.move_percent, 8.0);
    }

    #[test]
    fn test_bear_low_too_close_to_previous_box_high_is_skipped() {
        // box 1: low 92 (day 1) -> 99 (day 3), closed by a 4 day horizon at day 4
        // day 5 low 97 is only 2 points under 99 -> skipped
        // day 6 low 98 is 1 point under 99 -> skipped
        let points = flat_series(
            0,
            &[100.0, 92.0, 95.0, 99.0, 97.0, 97.0, 98.0, 103.0, 104.0, 104.0],
        );
        let cfg = bear(|c| c.max_duration_days = 4);
        let boxes = scan_cycle(1, &points, &cfg);

        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].start_day, 1);
        assert_eq!(boxes[0].extreme_rate, 99.0);
        assert_eq!(boxes[0].end_day, 4);
        assert!(boxes[0].broken);

        // Relaxing the gate lets the day 5 low through
        let cfg = bear(|c| {
            c.max_duration_days = 4;
            c.min_drop_from_prev_high = 1.0;
        });
        let boxes = scan_cycle(1, &points, &cfg);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[1].start_day, 5);
        assert_eq!(boxes[1].box_id, 2);
    }

    #[test]
    fn test_bear_first_low_gated_against_cycle_peak() {
        // the low of 98 is only 2 under the 100 peak
        let points = flat_series(0, &[100.0, 98.0, 104.0, 103.0]);
        assert!(scan_cycle(1, &points, &bear(|_| {})).is_empty());
    }

    #[test]
    fn test_bear_short_box_is_discarded() {
        let points = ohlc_series(0, &[(100.0, 100.0), (90.0, 90.0), (92.0, 96.0), (85.0, 86.0)]);
        let cfg = bear(|c| c.min_duration_days = 3);
        assert!(scan_cycle(1, &points, &cfg).is_empty());

        let boxes = scan_cycle(1, &points, &bear(|_| {}));
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].duration_days, 2);
    }

    #[test]
    fn test_bear_horizon_shorter_than_rally_rejects_box() {
        // the rally only confirms 5 rows after the low, past a 3 row horizon
        let points = flat_series(0, &[100.0, 90.0, 91.0, 92.0, 93.0, 94.0, 95.0, 95.0]);
        let cfg = bear(|c| c.max_duration_days = 3);
        assert!(scan_cycle(1, &points, &cfg).is_empty());
    }

    #[test]
    fn test_bear_multiple_boxes_are_ordered_and_disjoint() {
        let mut rates = vec![100.0];
        // three legs down, each with a rally and a breakdown
        for base in [90.0, 75.0, 60.0] {
            rates.extend([base, base + 1.0, base + 7.0, base + 4.0, base - 3.0]);
        }
        let points = flat_series(0, &rates);
        let boxes = scan_cycle(2, &points, &bear(|_| {}));

        assert_eq!(boxes.len(), 3);
        assert_box_invariants(&boxes, 5.0, 1);
        let starts: Vec<f64> = boxes.iter().map(|b| b.start_rate).collect();
        assert_eq!(starts, vec![90.0, 75.0, 60.0]);
        assert!(boxes.iter().all(|b| b.broken));
    }

    #[test]
    fn test_bull_high_pullback_without_breakout() {
        // days 420..=500, high of 120 on day 430, pullback to 114 by day 435
        let mut rates: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        rates.push(120.0);
        rates.extend([119.0, 118.0, 117.0, 116.0, 114.0]);
        while rates.len() < 81 {
            rates.push(117.0);
        }
        let points = flat_series(420, &rates);
        let boxes = scan_cycle(4, &points, &bull(|_| {}));

        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.start_day, 430);
        assert_eq!(b.start_rate, 120.0);
        assert_eq!(b.extreme_day, 435);
        assert_eq!(b.extreme_rate, 114.0);
        assert_eq!(b.end_day, 500);
        assert!(!b.broken);
        assert_eq!(b.move_percent, 6.0);
    }

    #[test]
    fn test_bull_breakout_closes_box_and_scan_continues() {
        let mut rates: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        // high of 120 on day 430, pullback to 113, breakout at 123 on day 441
        rates.push(120.0);
        rates.extend([117.0, 113.0, 116.0, 115.0, 116.0, 117.0, 118.0, 117.0, 118.0, 119.0]);
        rates.push(123.0);
        // a second leg: new high at 130 on day 443 then a pullback
        rates.extend([126.0, 130.0, 127.0, 124.0, 123.0, 124.0]);
        rates.extend(std::iter::repeat_n(125.0, 12));
        let points = flat_series(420, &rates);
        let boxes = scan_cycle(4, &points, &bull(|_| {}));

        assert_eq!(boxes.len(), 2);
        assert_box_invariants(&boxes, 5.0, 1);

        assert_eq!(boxes[0].start_day, 430);
        assert_eq!(boxes[0].extreme_day, 432);
        assert_eq!(boxes[0].extreme_rate, 113.0);
        assert_eq!(boxes[0].end_day, 441);
        assert!(boxes[0].broken);

        assert_eq!(boxes[1].start_day, 443);
        assert_eq!(boxes[1].start_rate, 130.0);
        assert_eq!(boxes[1].extreme_rate, 123.0);
        assert!(!boxes[1].broken);
    }

    #[test]
    fn test_bull_high_without_sufficient_drop_is_not_a_box() {
        let mut rates: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        rates.push(120.0);
        rates.extend(std::iter::repeat_n(117.0, 20));
        let points = flat_series(420, &rates);
        assert!(scan_cycle(4, &points, &bull(|_| {})).is_empty());
    }

    #[test]
    fn test_bear_zero_rise_threshold_never_emits_flat_box() {
        let points = flat_series(0, &[100.0, 90.0, 90.0, 80.0]);
        let boxes = scan_cycle(1, &points, &bear(|cfg| cfg.rise_threshold = 0.0));
        assert!(boxes.is_empty(), "{boxes:?}");
    }

    #[test]
    fn test_scan_cycle_empty_series() {
        assert!(scan_cycle(1, &[], &bear(|_| {})).is_empty());
        assert!(scan_cycle(1, &[], &bull(|_| {})).is_empty());
    }

    #[test]
    fn test_scan_cycle_is_deterministic() {
        let mut rates = vec![100.0];
        for base in [90.0, 80.0] {
            rates.extend([base, base + 6.0, base + 2.0, base - 2.5]);
        }
        let points = flat_series(0, &rates);
        let cfg = bear(|_| {});
        assert_eq!(scan_cycle(1, &points, &cfg), scan_cycle(1, &points, &cfg));
    }
}
