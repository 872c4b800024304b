//! Pure level math for the plan monitor.
//!
//! These helpers carry the monitor's numeric semantics: signed
//! distance, the approach band, and straddle-based cross detection.
//! They hold no state so every rule is testable in isolation.

/// Signed distance of `price` from `level`, as a percentage of the
/// level. Negative means the price is below the level.
pub fn distance_pct(price: f64, level: f64) -> f64 {
    (price - level) / level * 100.0
}

/// Whether a signed distance falls inside the approach band.
pub fn is_approaching(distance_pct: f64, threshold_pct: f64) -> bool {
    distance_pct.abs() <= threshold_pct
}

/// Whether the move from `prev` to `curr` straddles `level` in either
/// direction. Landing exactly on the level counts as a cross; starting
/// on it does not.
pub fn crossed(prev: f64, curr: f64, level: f64) -> bool {
    (prev < level && level <= curr) || (prev > level && level >= curr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_signed() {
        assert!((distance_pct(101.0, 100.0) - 1.0).abs() < 1e-10);
        assert!((distance_pct(99.0, 100.0) - (-1.0)).abs() < 1e-10);
        assert_eq!(distance_pct(100.0, 100.0), 0.0);
    }

    #[test]
    fn test_approaching_band_is_closed() {
        assert!(is_approaching(0.5, 0.5));
        assert!(is_approaching(-0.5, 0.5));
        assert!(is_approaching(0.0, 0.5));
        assert!(!is_approaching(0.51, 0.5));
        assert!(!is_approaching(-0.51, 0.5));
    }

    #[test]
    fn test_crossed_upward() {
        assert!(crossed(99.0, 101.0, 100.0));
        // Landing exactly on the level counts.
        assert!(crossed(99.0, 100.0, 100.0));
        assert!(!crossed(99.0, 99.9, 100.0));
    }

    #[test]
    fn test_crossed_downward() {
        assert!(crossed(101.0, 99.0, 100.0));
        assert!(crossed(101.0, 100.0, 100.0));
        assert!(!crossed(101.0, 100.1, 100.0));
    }

    #[test]
    fn test_starting_on_level_is_not_a_cross() {
        assert!(!crossed(100.0, 105.0, 100.0));
        assert!(!crossed(100.0, 95.0, 100.0));
        assert!(!crossed(100.0, 100.0, 100.0));
    }

    #[test]
    fn test_no_move_no_cross() {
        assert!(!crossed(99.0, 99.0, 100.0));
        assert!(!crossed(101.0, 101.0, 100.0));
    }
}
