//! Pure time gates used by the schedulers.

use chrono::{DateTime, Duration, Timelike, Utc};

/// Whether `now` falls inside the quiet window.
///
/// Hours are expressed as `HH.fraction` (23.5 = 23:30). A window whose start
/// is later than its end wraps midnight: quiet means after the start *or*
/// before the end.
pub fn is_quiet_hours<T: Timelike>(now: &T, start_hour: f64, end_hour: f64) -> bool {
    let hour_frac = now.hour() as f64 + now.minute() as f64 / 60.0;
    if start_hour > end_hour {
        hour_frac >= start_hour || hour_frac < end_hour
    } else {
        start_hour <= hour_frac && hour_frac < end_hour
    }
}

/// Whether enough wall-clock time has elapsed since the last action.
///
/// Wall-clock deltas, not counted ticks: restarts and suspends cannot bypass
/// the gate. Monotonic in `now` for a fixed `last_action_at`.
pub fn can_act(
    last_action_at: Option<DateTime<Utc>>,
    min_gap: Duration,
    now: DateTime<Utc>,
) -> bool {
    match last_action_at {
        None => true,
        Some(last) => now - last >= min_gap,
    }
}
