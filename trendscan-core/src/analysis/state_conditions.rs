//! Historical-state conditions on the RS line.
//!
//! These ask whether something happened recently rather than whether it holds
//! on the latest bar. They feed universe selection only, never the daily entry filter.

/// Valid RS points needed to define a trailing-year high.
pub const RS_YEAR: usize = 252;

fn clean(rs_line: &[f64]) -> Vec<(usize, f64)> {
    rs_line
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .collect()
}

/// `threshold` × max of the last [`RS_YEAR`] valid points, or None with too little history.
fn target_level(points: &[(usize, f64)], threshold: f64) -> Option<f64> {
    if points.len() < RS_YEAR {
        return None;
    }
    let high = points[points.len() - RS_YEAR..]
        .iter()
        .map(|&(_, v)| v)
        .fold(f64::NEG_INFINITY, f64::max);
    Some(high * threshold)
}

/// True iff any of the last `window` valid RS points reaches `threshold` × the
/// trailing-year RS high. Missing points are dropped first.
pub fn has_recent_rs_new_high(rs_line: &[f64], window: usize, threshold: f64) -> bool {
    let points = clean(rs_line);
    let Some(level) = target_level(&points, threshold) else {
        tracing::debug!(valid = points.len(), "RS line too short for new-high check");
        return false;
    };
    let start = points.len().saturating_sub(window);
    points[start..].iter().any(|&(_, v)| v >= level)
}

/// Index into `rs_line` of the most recent point at or above the new-high level.
pub fn rs_new_high_index(rs_line: &[f64], threshold: f64) -> Option<usize> {
    let points = clean(rs_line);
    let level = target_level(&points, threshold)?;
    points.iter().rev().find(|&&(_, v)| v >= level).map(|&(i, _)| i)
}

/// Valid RS points strictly after the most recent new high.
pub fn days_since_rs_new_high(rs_line: &[f64], threshold: f64) -> Option<usize> {
    let idx = rs_new_high_index(rs_line, threshold)?;
    Some(rs_line[idx + 1..].iter().filter(|v| !v.is_nan()).count())
}
