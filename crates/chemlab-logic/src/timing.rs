//! Timer arithmetic shared by the reaction scheduler and the countdown.

use crate::constants::{DEFAULT_REACTION_MS, MIN_REACTION_MS, MIN_SIM_SPEED, MIN_TICK_MS};

/// Wall-clock duration of a reaction at the given simulation speed.
///
/// `max(800, round(duration / max(0.5, speed)))`, with 3000 ms when the
/// rule gives no duration.
pub fn adjusted_duration_ms(duration_ms: Option<u64>, sim_speed: f64) -> u64 {
    scaled_duration_ms(
        duration_ms,
        sim_speed,
        DEFAULT_REACTION_MS,
        MIN_REACTION_MS,
        MIN_SIM_SPEED,
    )
}

/// [`adjusted_duration_ms`] with explicit default, duration floor and
/// speed floor.
pub fn scaled_duration_ms(
    duration_ms: Option<u64>,
    sim_speed: f64,
    default_ms: u64,
    min_ms: u64,
    min_speed: f64,
) -> u64 {
    let base = duration_ms.unwrap_or(default_ms) as f64;
    let scaled = (base / speed_with_floor(sim_speed, min_speed)).round() as u64;
    scaled.max(min_ms)
}

/// Milliseconds between countdown ticks: one simulated second, never
/// shorter than 200 ms.
pub fn tick_interval_ms(sim_speed: f64) -> u64 {
    tick_interval_with_floor(sim_speed, MIN_SIM_SPEED)
}

/// [`tick_interval_ms`] with an explicit speed floor.
pub fn tick_interval_with_floor(sim_speed: f64, min_speed: f64) -> u64 {
    ((1000.0 / speed_with_floor(sim_speed, min_speed)).round() as u64).max(MIN_TICK_MS)
}

/// Speed used for arithmetic: at least 0.5; NaN counts as 1.
pub fn effective_speed(sim_speed: f64) -> f64 {
    speed_with_floor(sim_speed, MIN_SIM_SPEED)
}

/// Speed used for arithmetic under a configured floor. A floor that is not
/// a positive finite number falls back to 0.5.
pub fn speed_with_floor(sim_speed: f64, min_speed: f64) -> f64 {
    let floor = if min_speed.is_finite() && min_speed > 0.0 {
        min_speed
    } else {
        MIN_SIM_SPEED
    };
    if sim_speed.is_nan() {
        1.0
    } else {
        sim_speed.max(floor)
    }
}

/// Whole seconds for a countdown of `minutes`. Non-finite or negative
/// input falls back to one minute.
pub fn countdown_seconds(minutes: f64) -> u32 {
    if !minutes.is_finite() || minutes <= 0.0 {
        return 60;
    }
    (minutes * 60.0).floor().min(u32::MAX as f64) as u32
}

/// `m:ss` rendering of a countdown.
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjusted_duration_defaults() {
        assert_eq!(adjusted_duration_ms(None, 1.0), 3000);
        assert_eq!(adjusted_duration_ms(Some(5000), 2.0), 2500);
    }

    #[test]
    fn test_adjusted_duration_floors() {
        // 1000 / 4 = 250 → floored to 800
        assert_eq!(adjusted_duration_ms(Some(1000), 4.0), 800);
        // speed below 0.5 is treated as 0.5
        assert_eq!(adjusted_duration_ms(Some(1000), 0.1), 2000);
        assert_eq!(adjusted_duration_ms(Some(0), 1.0), 800);
    }

    #[test]
    fn test_adjusted_duration_rounds() {
        // 1000 / 0.75 = 1333.3
        assert_eq!(adjusted_duration_ms(Some(1000), 0.75), 1333);
        // 1000 / 1.5 = 666.7, under the floor
        assert_eq!(adjusted_duration_ms(Some(1000), 1.5), 800);
    }

    #[test]
    fn test_configured_speed_floor() {
        assert_eq!(scaled_duration_ms(Some(1000), 0.25, 3000, 800, 0.25), 4000);
        assert_eq!(scaled_duration_ms(Some(1000), 0.1, 3000, 800, 0.25), 4000);
        assert_eq!(tick_interval_with_floor(0.25, 0.25), 4000);
        // unusable floors fall back to 0.5
        assert_eq!(speed_with_floor(0.1, 0.0), 0.5);
        assert_eq!(speed_with_floor(0.1, f64::NAN), 0.5);
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval_ms(1.0), 1000);
        assert_eq!(tick_interval_ms(2.0), 500);
        assert_eq!(tick_interval_ms(10.0), 200);
        assert_eq!(tick_interval_ms(0.25), 2000);
        assert_eq!(tick_interval_ms(f64::NAN), 1000);
    }

    #[test]
    fn test_countdown_seconds() {
        assert_eq!(countdown_seconds(1.5), 90);
        assert_eq!(countdown_seconds(0.0), 60);
        assert_eq!(countdown_seconds(f64::NAN), 60);
        assert_eq!(countdown_seconds(0.01), 0);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(65), "1:05");
        assert_eq!(format_countdown(600), "10:00");
    }
}
