//! Statistical emission inefficiency: CO2 intensity beyond two sigma of the
//! reference distribution.
//!
//! The two-sigma cut approximates the 97.5th percentile only if intensities
//! are roughly normal; fleet data is usually right-skewed.

use serde::Serialize;

use super::features::FeatureVector;
use super::PartialVerdict;
use crate::params::ParameterTable;

/// Largest representable CO2 intensity (g/km); the score saturates here.
pub const MAX_CO2_INTENSITY: f64 = 1000.0;

pub const SIGMA_MULTIPLIER: f64 = 2.0;

/// Flag when `co2_intensity > mean + 2 * std`. A zero or unusable std means
/// there is no reference distribution, so nothing is flagged. The score is
/// the intensity relative to the representable maximum, flag or not.
pub fn detect(features: &FeatureVector, table: &ParameterTable) -> PartialVerdict {
    let score = features.co2_intensity / MAX_CO2_INTENSITY;

    if !(table.emission_std.is_finite() && table.emission_std > 0.0) {
        return PartialVerdict::new(false, score);
    }

    let threshold = table.emission_mean + SIGMA_MULTIPLIER * table.emission_std;
    PartialVerdict::new(features.co2_intensity > threshold, score)
}

/// Reference statistics for `co2_intensity`, computed from observed records.
/// Feeds the `co2_intensity_*` entries of the parameter table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionStats {
    #[serde(rename = "co2_intensity_mean")]
    pub mean: f64,
    #[serde(rename = "co2_intensity_std")]
    pub std_dev: f64,
    #[serde(rename = "co2_intensity_min")]
    pub min: f64,
    #[serde(rename = "co2_intensity_max")]
    pub max: f64,
    pub sample_count: usize,
    /// `mean + 2 * std`, the resulting inefficiency cut.
    pub threshold: f64,
}

impl EmissionStats {
    /// Statistics over strictly positive, finite samples. Zero readings come
    /// from stationary records and would drag the reference down.
    pub fn from_samples(samples: &[f64]) -> Self {
        let valid: Vec<f64> = samples
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();

        if valid.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                sample_count: 0,
                threshold: 0.0,
            };
        }

        let count = valid.len();
        let mean = valid.iter().sum::<f64>() / count as f64;
        // Sample variance; a single reading carries no spread.
        let std_dev = if count > 1 {
            let sum_sq: f64 = valid.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            mean,
            std_dev,
            min,
            max,
            sample_count: count,
            threshold: mean + SIGMA_MULTIPLIER * std_dev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_co2(co2_intensity: f64) -> FeatureVector {
        FeatureVector {
            speed: 50.0,
            distance_delta: 1.0,
            co2_intensity,
            ..FeatureVector::default()
        }
    }

    fn table(mean: f64, std: f64) -> ParameterTable {
        ParameterTable {
            emission_mean: mean,
            emission_std: std,
            ..ParameterTable::default()
        }
    }

    #[test]
    fn test_above_two_sigma_flags() {
        let v = detect(&with_co2(701.0), &table(500.0, 100.0));
        assert!(v.flag);
        assert!((v.score - 0.701).abs() < 1e-12);
    }

    #[test]
    fn test_exactly_two_sigma_does_not_flag() {
        let v = detect(&with_co2(700.0), &table(500.0, 100.0));
        assert!(!v.flag);
    }

    #[test]
    fn test_score_reported_without_flag() {
        let v = detect(&with_co2(650.0), &table(500.0, 100.0));
        assert!(!v.flag);
        assert!((v.score - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_zero_std_never_flags() {
        let t = table(0.0, 0.0);
        assert!(!detect(&with_co2(1000.0), &t).flag);
        assert!(!detect(&with_co2(0.0), &t).flag);
    }

    #[test]
    fn test_stats_over_positive_samples() {
        let stats = EmissionStats::from_samples(&[0.0, 100.0, 200.0, 300.0, f64::NAN]);
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.mean, 200.0);
        assert_eq!(stats.std_dev, 100.0);
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 300.0);
        assert_eq!(stats.threshold, 400.0);
    }

    #[test]
    fn test_stats_single_sample_has_no_spread() {
        let stats = EmissionStats::from_samples(&[250.0]);
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_stats_empty() {
        let stats = EmissionStats::from_samples(&[0.0, -1.0]);
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.mean, 0.0);
    }
}
