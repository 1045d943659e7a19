//! Merges the per-record partial verdicts into one `DetectionResult`.
//!
//! Severity comes from a fixed precedence table, first match wins. Fuel
//! theft dominates every other signal, so a high-risk theft is CRITICAL even
//! when the other detectors would independently make it HIGH.

use super::{AnomalyType, DetectionResult, ModelVerdict, PartialVerdict, Severity};

/// Fuel-theft risk above which a theft flag becomes CRITICAL.
///
/// A drop has to exceed 35 L for the linear risk to clear this, so the
/// typical 5-20 L theft stays below it.
pub const CRITICAL_FUEL_RISK: f64 = 0.7;

/// ML risk above which the model alone makes a record HIGH.
pub const HIGH_ML_RISK: f64 = 0.5;

/// The three per-record verdicts, tagged by detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialVerdicts {
    pub fuel_theft: PartialVerdict,
    pub emission: PartialVerdict,
    pub ml: ModelVerdict,
}

impl PartialVerdicts {
    /// Verdicts in reporting priority order.
    pub fn tagged(&self) -> [(AnomalyType, PartialVerdict); 3] {
        [
            (AnomalyType::FuelTheft, self.fuel_theft),
            (AnomalyType::EmissionInefficiency, self.emission),
            (AnomalyType::MlDetected, self.ml.verdict),
        ]
    }

    pub fn flag_count(&self) -> usize {
        self.tagged().iter().filter(|(_, v)| v.flag).count()
    }
}

type Rule = fn(&PartialVerdicts) -> bool;

/// Precedence table, evaluated top to bottom.
pub const SEVERITY_RULES: [(Severity, Rule); 4] = [
    (Severity::Critical, high_risk_fuel_theft),
    (Severity::High, multiple_flags_or_strong_model),
    (Severity::Medium, single_flag),
    (Severity::Low, always),
];

fn high_risk_fuel_theft(v: &PartialVerdicts) -> bool {
    v.fuel_theft.flag && v.fuel_theft.score > CRITICAL_FUEL_RISK
}

fn multiple_flags_or_strong_model(v: &PartialVerdicts) -> bool {
    v.flag_count() >= 2 || v.ml.verdict.score > HIGH_ML_RISK
}

fn single_flag(v: &PartialVerdicts) -> bool {
    v.flag_count() == 1
}

fn always(_: &PartialVerdicts) -> bool {
    true
}

pub fn resolve_severity(verdicts: &PartialVerdicts) -> Severity {
    SEVERITY_RULES
        .iter()
        .find(|(_, rule)| rule(verdicts))
        .map(|(severity, _)| *severity)
        .unwrap_or(Severity::Low)
}

pub fn resolve(verdicts: &PartialVerdicts) -> DetectionResult {
    let anomaly_types: Vec<AnomalyType> = verdicts
        .tagged()
        .iter()
        .filter(|(_, v)| v.flag)
        .map(|(kind, _)| *kind)
        .collect();

    DetectionResult {
        is_anomaly: !anomaly_types.is_empty(),
        anomaly_score: verdicts.ml.raw_score,
        anomaly_types,
        severity: resolve_severity(verdicts),
        fuel_theft_detected: verdicts.fuel_theft.flag,
        emission_inefficiency_detected: verdicts.emission.flag,
        ml_anomaly_detected: verdicts.ml.verdict.flag,
        excessive_idle_detected: false,
        fuel_theft_risk: verdicts.fuel_theft.score,
        emission_score: verdicts.emission.score,
        ml_risk: verdicts.ml.verdict.score,
    }
}
