//! The canonical 8-field feature vector and its validation.

use serde::{Deserialize, Serialize};

use super::{ValidationError, ValidationKind};

/// Number of features the scaler and scorer are trained on.
pub const FEATURE_COUNT: usize = 8;

/// Feature names in model order. Artifacts are trained against this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "speed",
    "distance_delta",
    "fuel_delta",
    "fuel_consumption_rate",
    "idle_duration",
    "rpm",
    "engine_load",
    "co2_intensity",
];

/// Inclusive valid range per feature, indexed like `FEATURE_NAMES`.
pub const FEATURE_RANGES: [(f64, f64); FEATURE_COUNT] = [
    (0.0, 200.0),    // km/h
    (0.0, 200.0),    // km
    (-50.0, 50.0),   // L, negative = consumption
    (0.0, 2.0),      // L/km
    (0.0, 1440.0),   // min
    (0.0, 3000.0),   // rpm
    (0.0, 100.0),    // %
    (0.0, 1000.0),   // g/km
];

/// Feature vector as it arrives from a caller. Any field may be absent.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FeatureInput {
    pub speed: Option<f64>,
    pub distance_delta: Option<f64>,
    pub fuel_delta: Option<f64>,
    pub fuel_consumption_rate: Option<f64>,
    pub idle_duration: Option<f64>,
    pub rpm: Option<f64>,
    pub engine_load: Option<f64>,
    pub co2_intensity: Option<f64>,
}

/// A validated per-record feature vector: all fields present, finite, and in range.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub speed: f64,
    pub distance_delta: f64,
    pub fuel_delta: f64,
    pub fuel_consumption_rate: f64,
    pub idle_duration: f64,
    pub rpm: f64,
    pub engine_load: f64,
    pub co2_intensity: f64,
}

impl FeatureVector {
    /// Values in model order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.speed,
            self.distance_delta,
            self.fuel_delta,
            self.fuel_consumption_rate,
            self.idle_duration,
            self.rpm,
            self.engine_load,
            self.co2_intensity,
        ]
    }

    /// Check every field against its documented range. Values are never clamped.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for ((name, (min, max)), value) in FEATURE_NAMES
            .iter()
            .zip(FEATURE_RANGES.iter())
            .zip(self.to_array())
        {
            if !value.is_finite() {
                return Err(ValidationError::new(*name, ValidationKind::NotFinite));
            }
            if value < *min || value > *max {
                return Err(ValidationError::new(
                    *name,
                    ValidationKind::OutOfRange {
                        value,
                        min: *min,
                        max: *max,
                    },
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<&FeatureInput> for FeatureVector {
    type Error = ValidationError;

    fn try_from(input: &FeatureInput) -> Result<Self, Self::Error> {
        fn require(value: Option<f64>, field: &'static str) -> Result<f64, ValidationError> {
            value.ok_or_else(|| ValidationError::missing(field))
        }

        let vector = FeatureVector {
            speed: require(input.speed, "speed")?,
            distance_delta: require(input.distance_delta, "distance_delta")?,
            fuel_delta: require(input.fuel_delta, "fuel_delta")?,
            fuel_consumption_rate: require(input.fuel_consumption_rate, "fuel_consumption_rate")?,
            idle_duration: require(input.idle_duration, "idle_duration")?,
            rpm: require(input.rpm, "rpm")?,
            engine_load: require(input.engine_load, "engine_load")?,
            co2_intensity: require(input.co2_intensity, "co2_intensity")?,
        };
        vector.validate()?;
        Ok(vector)
    }
}

impl From<FeatureVector> for FeatureInput {
    fn from(v: FeatureVector) -> Self {
        Self {
            speed: Some(v.speed),
            distance_delta: Some(v.distance_delta),
            fuel_delta: Some(v.fuel_delta),
            fuel_consumption_rate: Some(v.fuel_consumption_rate),
            idle_duration: Some(v.idle_duration),
            rpm: Some(v.rpm),
            engine_load: Some(v.engine_load),
            co2_intensity: Some(v.co2_intensity),
        }
    }
}
