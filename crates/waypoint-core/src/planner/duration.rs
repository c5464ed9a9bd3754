//! Rough total-duration arithmetic over free-text step estimates.

use std::sync::LazyLock;

use regex::Regex;
use waypoint_db::models::PlanStep;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("hard-coded regex is valid"));

const MINUTES_PER_HOUR: u64 = 60;
const MINUTES_PER_DAY: u64 = 24 * MINUTES_PER_HOUR;

/// Minutes represented by one estimate such as `"2 hours"` or `"1-2 days"`.
///
/// Only the first number counts. Text without a number contributes nothing.
pub fn estimate_minutes(estimate: &str) -> u64 {
    let Some(n) = FIRST_NUMBER
        .find(estimate)
        .and_then(|m| m.as_str().parse::<u64>().ok())
    else {
        return 0;
    };

    let lower = estimate.to_lowercase();
    if lower.contains("hour") {
        n.saturating_mul(MINUTES_PER_HOUR)
    } else if lower.contains("day") {
        n.saturating_mul(MINUTES_PER_DAY)
    } else {
        n
    }
}

/// Render a minute count the way plan summaries show it.
pub fn format_minutes(total: u64) -> String {
    if total >= MINUTES_PER_DAY {
        let days = total / MINUTES_PER_DAY;
        let hours = (total % MINUTES_PER_DAY) / MINUTES_PER_HOUR;
        format!("{days} days, {hours} hours")
    } else if total >= MINUTES_PER_HOUR {
        let hours = total / MINUTES_PER_HOUR;
        let minutes = total % MINUTES_PER_HOUR;
        format!("{hours} hours, {minutes} minutes")
    } else {
        format!("{total} minutes")
    }
}

/// Sum of every step's estimate, formatted.
pub fn total_duration(steps: &[PlanStep]) -> String {
    let total = steps
        .iter()
        .map(|s| estimate_minutes(&s.estimated_duration))
        .fold(0u64, u64::saturating_add);
    format_minutes(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_number_and_unit() {
        assert_eq!(estimate_minutes("2 hours"), 120);
        assert_eq!(estimate_minutes("1-2 days"), 1440);
        assert_eq!(estimate_minutes("45 minutes"), 45);
        assert_eq!(estimate_minutes("90"), 90);
        assert_eq!(estimate_minutes("Ongoing"), 0);
        // "hour" wins when both units appear.
        assert_eq!(estimate_minutes("1 day, 3 hours"), 60);
    }

    #[test]
    fn formats_by_magnitude() {
        assert_eq!(format_minutes(0), "0 minutes");
        assert_eq!(format_minutes(59), "59 minutes");
        assert_eq!(format_minutes(60), "1 hours, 0 minutes");
        assert_eq!(format_minutes(390), "6 hours, 30 minutes");
        assert_eq!(format_minutes(1440 + 150), "1 days, 2 hours");
    }
}
