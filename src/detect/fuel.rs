//! Rule-based fuel theft: a sharp fuel drop while the vehicle stood still.

use super::features::FeatureVector;
use super::PartialVerdict;
use crate::params::ParameterTable;

/// Largest representable fuel change (L); the risk score saturates here.
pub const MAX_FUEL_DELTA: f64 = 50.0;

/// Flag when fuel dropped by at least the drop threshold, speed stayed at or
/// below the speed threshold, and distance stayed strictly below the distance
/// threshold. Risk is linear in the drop magnitude, independent of the flag.
pub fn detect(features: &FeatureVector, table: &ParameterTable) -> PartialVerdict {
    let flag = features.fuel_delta <= -table.fuel_theft_drop_threshold
        && features.speed <= table.fuel_theft_speed_threshold
        && features.distance_delta < table.fuel_theft_distance_threshold;

    PartialVerdict::new(flag, features.fuel_delta.abs() / MAX_FUEL_DELTA)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stationary(fuel_delta: f64, distance_delta: f64) -> FeatureVector {
        FeatureVector {
            fuel_delta,
            distance_delta,
            idle_duration: 5.0,
            ..FeatureVector::default()
        }
    }

    #[test]
    fn test_drop_at_threshold_while_parked_is_theft() {
        let v = detect(&stationary(-5.0, 0.09), &ParameterTable::default());
        assert!(v.flag);
        assert!((v.score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_distance_bound_is_strict() {
        let v = detect(&stationary(-5.0, 0.1), &ParameterTable::default());
        assert!(!v.flag);
    }

    #[test]
    fn test_moving_vehicle_is_not_theft() {
        let mut f = stationary(-20.0, 0.0);
        f.speed = 12.0;
        let v = detect(&f, &ParameterTable::default());
        assert!(!v.flag);
        // Risk is still reported.
        assert!((v.score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_small_drop_is_not_theft() {
        let v = detect(&stationary(-4.99, 0.0), &ParameterTable::default());
        assert!(!v.flag);
    }

    #[test]
    fn test_refuel_is_not_theft() {
        let v = detect(&stationary(30.0, 0.0), &ParameterTable::default());
        assert!(!v.flag);
    }

    #[test]
    fn test_risk_is_monotone_and_saturates() {
        let table = ParameterTable::default();
        let mut last = 0.0;
        for step in 0..=100 {
            let delta = -(step as f64) * 0.5;
            let v = detect(&stationary(delta, 0.0), &table);
            assert!(v.score >= last, "risk decreased at fuel_delta={delta}");
            last = v.score;
        }
        assert_eq!(last, 1.0);
    }
}
