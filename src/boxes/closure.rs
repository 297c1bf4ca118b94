use crate::boxes::extremum::Extremum;
use crate::boxes::threshold::{Direction, MoveConfirmation};
use crate::data::PricePoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closure {
    pub end_index: usize,
    pub broken: bool,
    /// In-box extreme after the scan, never past `end_index`.
    pub extreme: Extremum,
}

impl Direction {
    /// Price level that closes a box opened at `start_rate`.
    ///
    /// `Up` boxes break down through the start low, `Down` boxes break out
    /// above the start high.
    pub fn break_level(self, start_rate: f64, break_threshold: f64) -> f64 {
        match self {
            Direction::Up => start_rate - start_rate * break_threshold / 100.0,
            Direction::Down => start_rate + start_rate * break_threshold / 100.0,
        }
    }

    fn breaks(self, point: &PricePoint, level: f64) -> bool {
        match self {
            Direction::Up => point.low_rate <= level,
            Direction::Down => point.high_rate >= level,
        }
    }
}

/// Scan forward from the confirmation until price reverses through the break
/// level or the search horizon runs out, tracking the in-box extreme.
///
/// `horizon` is an absolute series index (`None` scans to the series end).
/// On exhaustion the box closes at the last examined row and is flagged
/// broken only when the horizon itself was reached inside the series; a
/// series that simply ends first leaves `broken = false`.
pub fn resolve_closure(
    points: &[PricePoint],
    origin: Extremum,
    confirmation: MoveConfirmation,
    direction: Direction,
    break_threshold: f64,
    horizon: Option<usize>,
) -> Closure {
    let level = direction.break_level(origin.rate, break_threshold);
    let len = points.len();
    let bound = horizon.map_or(len, |h| h.min(len));

    let mut extreme = confirmation.extreme;
    let mut k = confirmation.extreme.index + 1;
    while k < bound {
        let point = &points[k];
        if direction.breaks(point, level) {
            return Closure {
                end_index: k,
                broken: true,
                extreme,
            };
        }
        let rate = direction.tracked_rate(point);
        if direction.extends(rate, extreme.rate) {
            extreme = Extremum { index: k, rate };
        }
        k += 1;
    }

    let end_index = bound.saturating_sub(1).max(origin.index);
    let broken = horizon.is_some_and(|h| h <= len);
    Closure {
        end_index,
        broken,
        extreme,
    }
}

/// When closure was forced before the confirming move (horizon shorter than
/// the rally), recompute the extreme inside `(origin.index, end_index]`.
///
/// Returns `None` when that window is empty.
pub fn settle_extreme(
    points: &[PricePoint],
    origin: Extremum,
    closure: &Closure,
    direction: Direction,
) -> Option<Extremum> {
    if closure.extreme.index <= closure.end_index {
        return Some(closure.extreme);
    }

    let mut settled: Option<Extremum> = None;
    for idx in (origin.index + 1)..=closure.end_index {
        let rate = direction.tracked_rate(&points[idx]);
        match settled {
            Some(current) if !direction.extends(rate, current.rate) => {}
            _ => settled = Some(Extremum { index: idx, rate }),
        }
    }
    settled
}
