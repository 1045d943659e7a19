//! Per-feature centering and scaling.

use serde::Deserialize;

use crate::detect::ComputationError;

/// Maps a raw feature vector into the space the scorer was trained in.
pub trait FeatureScaler: Send + Sync {
    fn n_features(&self) -> usize;

    fn transform(&self, raw: &[f64]) -> Result<Vec<f64>, ComputationError>;
}

/// Standard scaler artifact: `(x - center) / scale` per feature.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(center: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { center, scale }
    }

    /// Checks the artifact is internally consistent.
    pub fn check(&self) -> Result<(), String> {
        if self.center.len() != self.scale.len() {
            return Err(format!(
                "center has {} entries but scale has {}",
                self.center.len(),
                self.scale.len()
            ));
        }
        if let Some(i) = self
            .center
            .iter()
            .chain(self.scale.iter())
            .position(|v| !v.is_finite())
        {
            return Err(format!("non-finite coefficient at position {}", i));
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.center.len()
    }

    fn transform(&self, raw: &[f64]) -> Result<Vec<f64>, ComputationError> {
        if raw.len() != self.center.len() {
            return Err(ComputationError::DimensionMismatch {
                component: "scaler",
                expected: self.center.len(),
                actual: raw.len(),
            });
        }

        Ok(raw
            .iter()
            .zip(self.center.iter().zip(self.scale.iter()))
            .map(|(x, (c, s))| {
                // Constant features were fitted with zero spread.
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - c) / s
            })
            .collect())
    }
}
