use crate::protocol::DAYS_PER_WEEK;

/// Completion percentage for a learner's `(current_week, current_day)` cursor.
///
/// A missing or zero cursor means "not started" and yields 0. The result is
/// clamped to 0..=100 so a cursor recorded past the last week never reads as
/// more than complete.
pub fn progress_percent(
    current_week: Option<u32>,
    current_day: Option<u32>,
    total_weeks: u32,
) -> u8 {
    let (week, day) = match (current_week, current_day) {
        (Some(w), Some(d)) if w > 0 && d > 0 => (w as u64, d as u64),
        _ => return 0,
    };
    if total_weeks == 0 {
        return 0;
    }
    let days = DAYS_PER_WEEK as u64;
    let done = (week - 1) * days + day;
    let total = total_weeks as u64 * days;
    let pct = (done as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Number of days elapsed through the cursor, for "day N of M" displays.
/// Saturates at `u32::MAX` for out-of-range cursors.
pub fn days_elapsed(current_week: u32, current_day: u32) -> u32 {
    if current_week == 0 || current_day == 0 {
        return 0;
    }
    (current_week - 1)
        .saturating_mul(DAYS_PER_WEEK)
        .saturating_add(current_day)
}

/// Total scheduled days in a protocol of `total_weeks` weeks.
pub fn total_days(total_weeks: u32) -> u32 {
    total_weeks.saturating_mul(DAYS_PER_WEEK)
}
