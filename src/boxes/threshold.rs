use crate::boxes::extremum::Extremum;
use crate::data::PricePoint;

/// Direction of the move that opens a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Low -> rally, tracked on the high rate (bear boxes).
    Up,
    /// High -> pullback, tracked on the low rate (bull boxes).
    Down,
}

impl Direction {
    /// The rate this direction tracks its running extreme on.
    pub fn tracked_rate(self, point: &PricePoint) -> f64 {
        match self {
            Direction::Up => point.high_rate,
            Direction::Down => point.low_rate,
        }
    }

    /// True when `candidate` extends the running extreme.
    pub fn extends(self, candidate: f64, current: f64) -> bool {
        match self {
            Direction::Up => candidate > current,
            Direction::Down => candidate < current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveConfirmation {
    pub found: bool,
    /// Running extreme reached when the scan stopped.
    pub extreme: Extremum,
}

/// Scan forward from `origin.index + 1` tracking the opposing running extreme
/// until it has moved `threshold` rate points away from the origin (inclusive).
/// The extreme must lie on a later day than the origin, whatever the threshold.
pub fn confirm_move(
    points: &[PricePoint],
    origin: Extremum,
    direction: Direction,
    threshold: f64,
) -> MoveConfirmation {
    let mut extreme = origin;

    for (j, point) in points.iter().enumerate().skip(origin.index + 1) {
        let rate = direction.tracked_rate(point);
        if direction.extends(rate, extreme.rate) {
            extreme = Extremum { index: j, rate };
        }
        if extreme.index > origin.index && (extreme.rate - origin.rate).abs() >= threshold {
            return MoveConfirmation {
                found: true,
                extreme,
            };
        }
    }

    MoveConfirmation {
        found: false,
        extreme,
    }
}
