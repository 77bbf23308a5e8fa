use chrono::{DateTime, Utc};

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;
const MINUTES_PER_WEEK: i64 = 7 * MINUTES_PER_DAY;

/// Describes how long until `target`, in the largest unit that keeps the
/// number small. Past targets are "now"; a week or more out becomes a date.
pub fn describe_reset(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (target - now).num_seconds();
    if seconds <= 0 {
        return "now".into();
    }

    // Partial minutes round up so "in 20s" never reads as "0m".
    let minutes = (seconds + 59) / 60;

    if minutes < MINUTES_PER_HOUR {
        format!("{minutes}m")
    } else if minutes < MINUTES_PER_DAY {
        let (h, m) = (minutes / MINUTES_PER_HOUR, minutes % MINUTES_PER_HOUR);
        if m == 0 {
            format!("{h}h")
        } else {
            format!("{h}h {m}m")
        }
    } else if minutes < MINUTES_PER_WEEK {
        let (d, h) = (
            minutes / MINUTES_PER_DAY,
            (minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR,
        );
        if h == 0 {
            format!("{d}d")
        } else {
            format!("{d}d {h}h")
        }
    } else {
        target.format("%b %-d").to_string()
    }
}
