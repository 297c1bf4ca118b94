use crate::data::PricePoint;

/// A validated turning point: position in the filtered series and its rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub index: usize,
    pub rate: f64,
}

/// Walk forward from `start` tracking the running minimum of the low rate and
/// return it as soon as a later day's high rallies `rise_threshold` above it.
///
/// The search stops at the first confirmation, so a deeper low further on is
/// never considered. The high of the low's own day is not checked: a single
/// candle cannot validate its own low.
pub fn find_true_low_before_rise(
    points: &[PricePoint],
    start: usize,
    rise_threshold: f64,
) -> Option<Extremum> {
    let first = points.get(start)?;
    let mut low = Extremum {
        index: start,
        rate: first.low_rate,
    };

    for (j, point) in points.iter().enumerate().skip(start) {
        if point.low_rate < low.rate {
            low = Extremum {
                index: j,
                rate: point.low_rate,
            };
        }
        if j > low.index && point.high_rate - low.rate >= rise_threshold {
            return Some(low);
        }
    }

    None
}

/// True when the high at `idx` is the maximum high within
/// `[idx - lookback, idx + lookback]`, clipped to the series.
///
/// Days closer than `lookback` to the series start are never significant.
/// The window looks ahead, so a high near the end of a still-growing series
/// is provisional.
pub fn is_significant_high(points: &[PricePoint], idx: usize, lookback: usize) -> bool {
    if idx < lookback || idx >= points.len() {
        return false;
    }

    let current = points[idx].high_rate;
    let start = idx - lookback;
    let end = (idx + lookback + 1).min(points.len());
    let window_max = points[start..end]
        .iter()
        .map(|p| p.high_rate)
        .fold(f64::NEG_INFINITY, f64::max);

    current >= window_max
}

/// First significant high at or after `start`.
pub fn next_significant_high(
    points: &[PricePoint],
    start: usize,
    lookback: usize,
) -> Option<Extremum> {
    (start.max(lookback)..points.len())
        .find(|&idx| is_significant_high(points, idx, lookback))
        .map(|idx| Extremum {
            index: idx,
            rate: points[idx].high_rate,
        })
}
