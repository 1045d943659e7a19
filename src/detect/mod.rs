//! Anomaly detection: per-record detectors, severity resolution, and the
//! daily idle check.

pub mod emission;
pub mod engine;
pub mod features;
pub mod fuel;
pub mod idle;
pub mod model;
pub mod severity;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single input field was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationKind {
    Missing,
    NotFinite,
    OutOfRange { value: f64, min: f64, max: f64 },
    Negative { value: f64 },
    Malformed(String),
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::Missing => write!(f, "is required"),
            ValidationKind::NotFinite => write!(f, "must be a finite number"),
            ValidationKind::OutOfRange { value, min, max } => {
                write!(f, "value {} outside [{}, {}]", value, min, max)
            }
            ValidationKind::Negative { value } => write!(f, "value {} must not be negative", value),
            ValidationKind::Malformed(reason) => write!(f, "malformed: {}", reason),
        }
    }
}

/// Bad input shape or range. Recoverable by the caller.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid field `{field}`: {kind}")]
pub struct ValidationError {
    pub field: &'static str,
    pub kind: ValidationKind,
}

impl ValidationError {
    pub fn new(field: &'static str, kind: ValidationKind) -> Self {
        Self { field, kind }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::new(field, ValidationKind::Missing)
    }
}

/// Missing or corrupt model artifacts. Fatal for the process and never retried.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("model artifact `{artifact}` not found (searched {})", search_path.display())]
    ArtifactMissing {
        artifact: &'static str,
        search_path: PathBuf,
    },

    #[error("model artifact `{artifact}` is invalid (searched {}): {reason}", search_path.display())]
    ArtifactInvalid {
        artifact: &'static str,
        search_path: PathBuf,
        reason: String,
    },
}

impl ConfigurationError {
    /// Name of the artifact that failed to load, safe to show to callers.
    pub fn artifact(&self) -> &'static str {
        match self {
            ConfigurationError::ArtifactMissing { artifact, .. }
            | ConfigurationError::ArtifactInvalid { artifact, .. } => artifact,
        }
    }
}

/// Version skew between the artifact set and the engine's feature layout.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error("{component} expects {expected} features, got {actual}")]
    DimensionMismatch {
        component: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Everything `evaluate` / `evaluate_daily` can fail with.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Computation(#[from] ComputationError),
}

// ---------------------------------------------------------------------------
// Verdict types
// ---------------------------------------------------------------------------

/// Combined severity of a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Per-record failure modes, declared in reporting priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    FuelTheft,
    EmissionInefficiency,
    MlDetected,
}

impl AnomalyType {
    pub const PRIORITY: [AnomalyType; 3] = [
        AnomalyType::FuelTheft,
        AnomalyType::EmissionInefficiency,
        AnomalyType::MlDetected,
    ];
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyType::FuelTheft => write!(f, "fuel_theft"),
            AnomalyType::EmissionInefficiency => write!(f, "emission_inefficiency"),
            AnomalyType::MlDetected => write!(f, "ml_detected"),
        }
    }
}

/// One detector's independent flag plus a risk score normalized to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PartialVerdict {
    pub flag: bool,
    pub score: f64,
}

impl PartialVerdict {
    pub fn new(flag: bool, score: f64) -> Self {
        Self {
            flag,
            score: score.clamp(0.0, 1.0),
        }
    }
}

/// Output of the model detector: the normalized verdict plus the scorer's
/// native score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelVerdict {
    pub verdict: PartialVerdict,
    pub raw_score: f64,
}

/// Merged per-record result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub is_anomaly: bool,
    /// Native score of the model detector (more negative = more anomalous).
    pub anomaly_score: f64,
    pub anomaly_types: Vec<AnomalyType>,
    pub severity: Severity,

    pub fuel_theft_detected: bool,
    pub emission_inefficiency_detected: bool,
    pub ml_anomaly_detected: bool,
    /// Always false here; idle is judged on the daily path.
    pub excessive_idle_detected: bool,

    pub fuel_theft_risk: f64,
    pub emission_score: f64,
    pub ml_risk: f64,
}

/// Result of the daily idle check for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyResult {
    pub device_id: i64,
    pub date: chrono::NaiveDate,
    pub excessive_idle_detected: bool,
    pub total_idle_minutes: f64,
    pub excessive_idle_threshold: f64,
    pub idle_percentage: f64,
    pub is_warning: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(Severity::Medium.to_string(), "MEDIUM");
    }

    #[test]
    fn test_anomaly_type_priority_matches_ordering() {
        let mut sorted = AnomalyType::PRIORITY.to_vec();
        sorted.sort();
        assert_eq!(sorted, AnomalyType::PRIORITY.to_vec());
        assert_eq!(
            serde_json::to_string(&AnomalyType::EmissionInefficiency).unwrap(),
            "\"emission_inefficiency\""
        );
    }

    #[test]
    fn test_partial_verdict_clamps_score() {
        assert_eq!(PartialVerdict::new(true, 1.7).score, 1.0);
        assert_eq!(PartialVerdict::new(false, -0.2).score, 0.0);
    }

    #[test]
    fn test_validation_error_names_field() {
        let err = ValidationError::new(
            "rpm",
            ValidationKind::OutOfRange {
                value: 4000.0,
                min: 0.0,
                max: 3000.0,
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("`rpm`"));
        assert!(msg.contains("4000"));
    }

    #[test]
    fn test_configuration_error_exposes_artifact() {
        let err = ConfigurationError::ArtifactMissing {
            artifact: "scaler.json",
            search_path: PathBuf::from("/opt/models"),
        };
        assert_eq!(err.artifact(), "scaler.json");
        assert!(err.to_string().contains("/opt/models"));
    }
}
