use crate::constants::{MAX_ZOOM, MIN_ZOOM, ZOOM_STEPS};

/// Discrete zoom level for a viewport latitude span (degrees).
///
/// The first step whose threshold the delta is strictly below wins, so a
/// delta equal to a threshold falls through to the next (lower) zoom.
/// Negative spans are treated as the tightest view, NaN and infinities
/// as the widest.
pub fn zoom_for_latitude_delta(latitude_delta: f64) -> u8 {
    if !latitude_delta.is_finite() {
        return MIN_ZOOM;
    }
    if latitude_delta < 0.0 {
        return MAX_ZOOM;
    }
    ZOOM_STEPS
        .iter()
        .find(|(threshold, _)| latitude_delta < *threshold)
        .map(|&(_, zoom)| zoom)
        .unwrap_or(MIN_ZOOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_table_is_well_formed() {
        for pair in ZOOM_STEPS.windows(2) {
            assert!(pair[0].0 < pair[1].0, "thresholds must ascend");
            assert!(pair[0].1 > pair[1].1, "zooms must descend");
        }
        assert_eq!(ZOOM_STEPS.first().map(|s| s.1), Some(MAX_ZOOM));
    }

    #[test]
    fn known_values() {
        assert_eq!(zoom_for_latitude_delta(0.0), 17);
        assert_eq!(zoom_for_latitude_delta(0.004), 17);
        assert_eq!(zoom_for_latitude_delta(0.005), 16);
        assert_eq!(zoom_for_latitude_delta(0.0922), 7);
        assert_eq!(zoom_for_latitude_delta(0.239), 1);
        assert_eq!(zoom_for_latitude_delta(0.24), 0);
        assert_eq!(zoom_for_latitude_delta(120.0), 0);
    }

    #[test]
    fn degenerate_inputs_stay_in_range() {
        assert_eq!(zoom_for_latitude_delta(f64::NAN), MIN_ZOOM);
        assert_eq!(zoom_for_latitude_delta(f64::INFINITY), MIN_ZOOM);
        assert_eq!(zoom_for_latitude_delta(-1.0), MAX_ZOOM);
    }

    #[test]
    fn monotonic_non_increasing_and_bounded() {
        let mut previous = u8::MAX;
        let mut delta = 0.0;
        while delta < 1.0 {
            let zoom = zoom_for_latitude_delta(delta);
            assert!(zoom <= MAX_ZOOM);
            assert!(zoom <= previous, "zoom rose at delta {delta}");
            previous = zoom;
            delta += 0.0005;
        }
    }
}
