//! Pure calculation functions for size budgets and the quality schedule.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Quality;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Convert a size budget in megabytes to a byte count (truncating).
///
/// ```
/// # use photo_tidy::imaging::mb_to_bytes;
/// assert_eq!(mb_to_bytes(3.0), 3 * 1024 * 1024);
/// assert_eq!(mb_to_bytes(0.5), 512 * 1024);
/// ```
pub fn mb_to_bytes(mb: f64) -> u64 {
    (mb * BYTES_PER_MB) as u64
}

/// Convert a byte count to megabytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// First quality tried by the search loop.
///
/// Normally [`Quality::START`]; a floor above it wins so the sequence never
/// dips below `min_quality`.
pub fn start_quality(min_quality: Quality) -> Quality {
    Quality::START.max(min_quality)
}

/// Next quality to try after `current`, or `None` once the floor is reached.
///
/// The result is strictly lower than `current` and never below `min_quality`:
/// a step that would overshoot the floor lands exactly on it.
///
/// ```
/// # use photo_tidy::imaging::{Quality, next_quality};
/// assert_eq!(next_quality(Quality(95), 5, Quality(50)), Some(Quality(90)));
/// assert_eq!(next_quality(Quality(53), 5, Quality(50)), Some(Quality(50)));
/// assert_eq!(next_quality(Quality(50), 5, Quality(50)), None);
/// ```
pub fn next_quality(current: Quality, step: u8, min_quality: Quality) -> Option<Quality> {
    if current <= min_quality || step == 0 {
        return None;
    }
    let next = current.value().saturating_sub(step);
    Some(Quality(next.max(min_quality.value())))
}

/// The full sequence of qualities the loop would try if no attempt fit the budget.
pub fn quality_schedule(min_quality: Quality, step: u8) -> Vec<Quality> {
    let mut schedule = vec![start_quality(min_quality)];
    while let Some(next) = next_quality(schedule[schedule.len() - 1], step, min_quality) {
        schedule.push(next);
    }
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mb_round_trips_whole_megabytes() {
        assert_eq!(mb_to_bytes(1.0), 1_048_576);
        assert_eq!(bytes_to_mb(1_048_576), 1.0);
        assert_eq!(bytes_to_mb(0), 0.0);
    }

    #[test]
    fn mb_to_bytes_truncates_fractions() {
        // 0.1 MB = 104857.6 bytes
        assert_eq!(mb_to_bytes(0.1), 104_857);
    }

    #[test]
    fn schedule_default_settings() {
        let values: Vec<u8> = quality_schedule(Quality(50), 5)
            .into_iter()
            .map(Quality::value)
            .collect();
        assert_eq!(
            values,
            vec![95, 90, 85, 80, 75, 70, 65, 60, 55, 50],
            "default schedule walks down to the floor in steps of 5"
        );
    }

    #[test]
    fn schedule_clamps_last_step_to_floor() {
        let values: Vec<u8> = quality_schedule(Quality(50), 20)
            .into_iter()
            .map(Quality::value)
            .collect();
        assert_eq!(values, vec![95, 75, 55, 50]);
    }

    #[test]
    fn schedule_is_strictly_decreasing() {
        for step in 1..=40u8 {
            for floor in [0u8, 10, 33, 50, 94] {
                let schedule = quality_schedule(Quality(floor), step);
                assert!(schedule.windows(2).all(|w| w[0] > w[1]));
                assert!(schedule.iter().all(|q| q.value() >= floor));
                assert_eq!(*schedule.last().unwrap(), Quality(floor));
            }
        }
    }

    #[test]
    fn floor_above_start_yields_single_attempt() {
        assert_eq!(quality_schedule(Quality(98), 5), vec![Quality(98)]);
        assert_eq!(start_quality(Quality(98)), Quality(98));
        assert_eq!(start_quality(Quality(10)), Quality(95));
    }

    #[test]
    fn zero_step_stops_immediately() {
        assert_eq!(next_quality(Quality(95), 0, Quality(50)), None);
    }
}
