//! Model-based anomaly detection over the full feature vector.
//!
//! The only detector that sees correlated, multi-feature deviations (moderate
//! speed with abnormal RPM and engine load, say). The scorer's outlier cut was
//! calibrated for a 5% contamination rate, which is this detector's baseline
//! false-positive budget on normal traffic.

use super::features::FeatureVector;
use super::{ComputationError, ModelVerdict, PartialVerdict};
use crate::params::DetectionParameters;

/// Scale, score, and map the scorer's `[-1, 1]` range linearly onto a
/// `[0, 1]` risk, with `-1` (most anomalous) at 1.0 and the outlier cut at 0.5.
pub fn detect(
    features: &FeatureVector,
    params: &DetectionParameters,
) -> Result<ModelVerdict, ComputationError> {
    let scaled = params.scaler().transform(&features.to_array())?;
    let raw_score = params.scorer().score(&scaled)?;
    let flag = params.scorer().is_outlier(&scaled)?;

    Ok(ModelVerdict {
        verdict: PartialVerdict::new(flag, risk_from_score(raw_score)),
        raw_score,
    })
}

pub fn risk_from_score(score: f64) -> f64 {
    ((1.0 - score) / 2.0).clamp(0.0, 1.0)
}
