use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::detect::features::{FeatureInput, FeatureVector};
use crate::detect::idle::{DailyAggregate, DailyAggregateInput};
use crate::detect::severity::{self, PartialVerdicts};
use crate::detect::{emission, fuel, idle, model};
use crate::detect::{DailyResult, DetectionResult, EngineError};
use crate::params::ParameterStore;

/// Entry point for both detection paths. Cheap to clone; all clones share
/// one parameter store.
#[derive(Clone)]
pub struct AnomalyEngine {
    store: Arc<ParameterStore>,
}

impl AnomalyEngine {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Evaluate one telemetry record. All-or-nothing: any failure yields no
    /// partial result.
    pub fn evaluate(&self, input: &FeatureInput) -> Result<DetectionResult, EngineError> {
        let features = FeatureVector::try_from(input).map_err(|e| {
            debug!(field = e.field, error = %e, "rejected feature vector");
            e
        })?;
        let params = self.store.get()?;
        let table = params.table();

        let fuel_theft = fuel::detect(&features, table);
        let emission = emission::detect(&features, table);
        let ml = model::detect(&features, &params).map_err(|e| {
            warn!(error = %e, "model detector failed");
            e
        })?;
        debug!(
            fuel_theft = fuel_theft.flag,
            fuel_risk = fuel_theft.score,
            emission = emission.flag,
            emission_score = emission.score,
            ml = ml.verdict.flag,
            ml_score = ml.raw_score,
            "detector verdicts"
        );

        let result = severity::resolve(&PartialVerdicts {
            fuel_theft,
            emission,
            ml,
        });

        if result.is_anomaly {
            info!(
                severity = %result.severity,
                types = ?result.anomaly_types,
                anomaly_score = result.anomaly_score,
                "anomaly detected"
            );
        } else {
            debug!(anomaly_score = result.anomaly_score, "record normal");
        }

        Ok(result)
    }

    /// Evaluate one device-day for excessive idling.
    pub fn evaluate_daily(&self, input: &DailyAggregateInput) -> Result<DailyResult, EngineError> {
        let day = DailyAggregate::try_from(input)?;
        let params = self.store.get()?;
        let result = idle::detect(&day, params.table());

        info!(
            device_id = day.device_id,
            date = %day.date,
            total_idle_minutes = day.total_idle_minutes,
            average_co2_intensity = ?day.average_co2_intensity,
            excessive_idle = result.excessive_idle_detected,
            warning = result.is_warning,
            "daily idle evaluated"
        );

        Ok(result)
    }
}
