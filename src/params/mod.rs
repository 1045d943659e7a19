//! Detection parameters: the scaler, the scorer, and the threshold table.
//!
//! `ParameterStore` loads all three artifacts once, on first use, and hands
//! out a shared read-only `DetectionParameters` afterwards. Concurrent first
//! callers block on the in-flight load instead of loading again. A failed
//! load is kept as well: it points at a broken deployment, not a transient
//! condition, so every later call reports the same error.

pub mod forest;
pub mod scaler;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use self::forest::{AnomalyScorer, IsolationForest};
use self::scaler::{FeatureScaler, StandardScaler};
use crate::detect::features::FEATURE_COUNT;
use crate::detect::ConfigurationError;

pub const SCALER_ARTIFACT: &str = "scaler.json";
pub const SCORER_ARTIFACT: &str = "isolation_forest.json";
pub const PARAMS_ARTIFACT: &str = "params.json";

// ---------------------------------------------------------------------------
// Parameter table
// ---------------------------------------------------------------------------

/// Statistical and rule thresholds, read from `params.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterTable {
    /// Reference mean of `co2_intensity` (g/km).
    #[serde(rename = "co2_intensity_mean")]
    pub emission_mean: f64,
    /// Reference standard deviation of `co2_intensity`. Zero disables the
    /// emission detector.
    #[serde(rename = "co2_intensity_std")]
    pub emission_std: f64,
    /// Minimum fuel drop (litres, magnitude) for a theft signature.
    pub fuel_theft_drop_threshold: f64,
    /// Maximum speed (km/h) at which a drop still counts as stationary.
    pub fuel_theft_speed_threshold: f64,
    /// Distance (km) the vehicle must stay strictly below.
    pub fuel_theft_distance_threshold: f64,
    pub daily_idle_threshold_minutes: f64,
    pub daily_idle_warning_fraction: f64,
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self {
            emission_mean: 0.0,
            emission_std: 0.0,
            fuel_theft_drop_threshold: 5.0,
            fuel_theft_speed_threshold: 0.0,
            fuel_theft_distance_threshold: 0.1,
            daily_idle_threshold_minutes: 120.0,
            daily_idle_warning_fraction: 0.8,
        }
    }
}

impl ParameterTable {
    fn check(&self) -> Result<(), String> {
        let fields = [
            ("co2_intensity_mean", self.emission_mean),
            ("co2_intensity_std", self.emission_std),
            ("fuel_theft_drop_threshold", self.fuel_theft_drop_threshold),
            ("fuel_theft_speed_threshold", self.fuel_theft_speed_threshold),
            ("fuel_theft_distance_threshold", self.fuel_theft_distance_threshold),
            ("daily_idle_threshold_minutes", self.daily_idle_threshold_minutes),
            ("daily_idle_warning_fraction", self.daily_idle_warning_fraction),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a finite non-negative number", name));
            }
        }
        // Above 1 the warning line would sit past the hard threshold.
        if self.daily_idle_warning_fraction > 1.0 {
            return Err(format!(
                "daily_idle_warning_fraction must be at most 1, got {}",
                self.daily_idle_warning_fraction
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loaded parameter set
// ---------------------------------------------------------------------------

/// Everything the detectors read. Immutable once built.
pub struct DetectionParameters {
    scaler: Box<dyn FeatureScaler>,
    scorer: Box<dyn AnomalyScorer>,
    table: ParameterTable,
}

impl DetectionParameters {
    pub fn new(
        scaler: Box<dyn FeatureScaler>,
        scorer: Box<dyn AnomalyScorer>,
        table: ParameterTable,
    ) -> Self {
        Self {
            scaler,
            scorer,
            table,
        }
    }

    /// Read all three artifacts from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigurationError> {
        let scaler: StandardScaler = read_artifact(dir, SCALER_ARTIFACT)?;
        scaler
            .check()
            .map_err(|reason| invalid(dir, SCALER_ARTIFACT, reason))?;

        let forest: IsolationForest = read_artifact(dir, SCORER_ARTIFACT)?;
        forest
            .check()
            .map_err(|reason| invalid(dir, SCORER_ARTIFACT, reason))?;

        let table: ParameterTable = read_artifact(dir, PARAMS_ARTIFACT)?;
        table
            .check()
            .map_err(|reason| invalid(dir, PARAMS_ARTIFACT, reason))?;

        // Feature layout is fixed at build time; refuse a skewed artifact set.
        if scaler.center.len() != FEATURE_COUNT {
            return Err(invalid(
                dir,
                SCALER_ARTIFACT,
                format!("expected {} features, found {}", FEATURE_COUNT, scaler.center.len()),
            ));
        }
        if forest.n_features != FEATURE_COUNT {
            return Err(invalid(
                dir,
                SCORER_ARTIFACT,
                format!("expected {} features, found {}", FEATURE_COUNT, forest.n_features),
            ));
        }

        info!(
            dir = %dir.display(),
            trees = forest.trees.len(),
            contamination = forest.contamination,
            "loaded detection parameters"
        );

        Ok(Self::new(Box::new(scaler), Box::new(forest), table))
    }

    pub fn scaler(&self) -> &dyn FeatureScaler {
        self.scaler.as_ref()
    }

    pub fn scorer(&self) -> &dyn AnomalyScorer {
        self.scorer.as_ref()
    }

    pub fn table(&self) -> &ParameterTable {
        &self.table
    }
}

impl std::fmt::Debug for DetectionParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionParameters")
            .field("scaler_features", &self.scaler.n_features())
            .field("scorer_features", &self.scorer.n_features())
            .field("table", &self.table)
            .finish()
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(
    dir: &Path,
    artifact: &'static str,
) -> Result<T, ConfigurationError> {
    let path = dir.join(artifact);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigurationError::ArtifactMissing {
                artifact,
                search_path: dir.to_path_buf(),
            }
        } else {
            invalid(dir, artifact, e.to_string())
        }
    })?;
    serde_json::from_str(&content).map_err(|e| invalid(dir, artifact, e.to_string()))
}

fn invalid(dir: &Path, artifact: &'static str, reason: String) -> ConfigurationError {
    ConfigurationError::ArtifactInvalid {
        artifact,
        search_path: dir.to_path_buf(),
        reason,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

type LoadOutcome = Result<Arc<DetectionParameters>, ConfigurationError>;

/// Lazily initialized, process-wide parameter cache.
pub struct ParameterStore {
    dir: PathBuf,
    cell: OnceLock<LoadOutcome>,
}

impl ParameterStore {
    /// A store that loads from `dir` on first `get()`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cell: OnceLock::new(),
        }
    }

    /// A store that is already initialized with `params`.
    pub fn preloaded(params: DetectionParameters) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(Arc::new(params)));
        Self {
            dir: PathBuf::new(),
            cell,
        }
    }

    /// Resolved artifact directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    /// The shared parameters, loading them first if nobody has yet.
    pub fn get(&self) -> Result<Arc<DetectionParameters>, ConfigurationError> {
        self.cell
            .get_or_init(|| {
                let outcome = DetectionParameters::load(&self.dir).map(Arc::new);
                if let Err(e) = &outcome {
                    error!(error = %e, "failed to load detection parameters");
                }
                outcome
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_defaults_match_documented_thresholds() {
        let t = ParameterTable::default();
        assert_eq!(t.fuel_theft_drop_threshold, 5.0);
        assert_eq!(t.fuel_theft_speed_threshold, 0.0);
        assert_eq!(t.fuel_theft_distance_threshold, 0.1);
        assert_eq!(t.daily_idle_threshold_minutes, 120.0);
        assert_eq!(t.daily_idle_warning_fraction, 0.8);
        assert_eq!(t.emission_std, 0.0);
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let t: ParameterTable =
            serde_json::from_str(r#"{"co2_intensity_mean": 300.0, "co2_intensity_std": 50.0}"#)
                .unwrap();
        assert_eq!(t.emission_mean, 300.0);
        assert_eq!(t.emission_std, 50.0);
        assert_eq!(t.daily_idle_threshold_minutes, 120.0);
    }

    #[test]
    fn test_table_rejects_negative_threshold() {
        let t = ParameterTable {
            fuel_theft_drop_threshold: -5.0,
            ..ParameterTable::default()
        };
        assert!(t.check().unwrap_err().contains("fuel_theft_drop_threshold"));
    }

    #[test]
    fn test_table_rejects_warning_fraction_above_one() {
        let t = ParameterTable {
            daily_idle_warning_fraction: 1.5,
            ..ParameterTable::default()
        };
        assert!(t.check().unwrap_err().contains("daily_idle_warning_fraction"));

        let t = ParameterTable {
            daily_idle_warning_fraction: 1.0,
            ..ParameterTable::default()
        };
        assert!(t.check().is_ok());
    }

    #[test]
    fn test_warning_fraction_above_one_is_invalid_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        for name in [SCALER_ARTIFACT, SCORER_ARTIFACT] {
            std::fs::copy(shipped.join(name), dir.path().join(name)).unwrap();
        }
        std::fs::write(
            dir.path().join(PARAMS_ARTIFACT),
            r#"{"co2_intensity_mean": 500.0, "co2_intensity_std": 100.0,
                "daily_idle_warning_fraction": 1.5}"#,
        )
        .unwrap();

        let err = DetectionParameters::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::ArtifactInvalid { artifact: PARAMS_ARTIFACT, .. }
        ));
    }

    #[test]
    fn test_missing_dir_names_artifact_and_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ParameterStore::new(dir.path().join("nope"));
        let err = store.get().unwrap_err();
        match err {
            ConfigurationError::ArtifactMissing {
                artifact,
                search_path,
            } => {
                assert_eq!(artifact, SCALER_ARTIFACT);
                assert_eq!(search_path, dir.path().join("nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_failure_is_not_retried() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ParameterStore::new(dir.path());
        assert!(store.get().is_err());

        // Artifacts appearing later do not rescue an already failed store.
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        for name in [SCALER_ARTIFACT, SCORER_ARTIFACT, PARAMS_ARTIFACT] {
            std::fs::copy(shipped.join(name), dir.path().join(name)).unwrap();
        }
        assert!(store.get().is_err());
        assert!(ParameterStore::new(dir.path()).get().is_ok());
    }

    #[test]
    fn test_corrupt_artifact_is_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(SCALER_ARTIFACT), "{ not json").unwrap();
        let err = DetectionParameters::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::ArtifactInvalid { artifact: SCALER_ARTIFACT, .. }
        ));
    }

    #[test]
    fn test_skewed_scaler_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        for name in [SCORER_ARTIFACT, PARAMS_ARTIFACT] {
            std::fs::copy(shipped.join(name), dir.path().join(name)).unwrap();
        }
        std::fs::write(
            dir.path().join(SCALER_ARTIFACT),
            r#"{"center": [0, 0, 0], "scale": [1, 1, 1]}"#,
        )
        .unwrap();
        let err = DetectionParameters::load(dir.path()).unwrap_err();
        assert_eq!(err.artifact(), SCALER_ARTIFACT);
        assert!(err.to_string().contains("expected 8 features"));
    }

    #[test]
    fn test_shipped_artifacts_load() {
        let store = ParameterStore::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("models"));
        let params = store.get().unwrap();
        assert!(store.is_loaded());
        assert_eq!(params.scaler().n_features(), FEATURE_COUNT);
        assert_eq!(params.scorer().n_features(), FEATURE_COUNT);
        assert!(params.table().emission_std > 0.0);

        // Same shared instance on every call.
        let again = store.get().unwrap();
        assert!(Arc::ptr_eq(&params, &again));
    }
}
