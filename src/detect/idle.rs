//! Daily excessive-idle check over a per-device day aggregate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DailyResult, ValidationError, ValidationKind};
use crate::params::ParameterTable;

pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Day-level aggregate as it arrives from a caller.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DailyAggregateInput {
    pub device_id: Option<i64>,
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
    pub total_idle_minutes: Option<f64>,
    pub average_co2_intensity: Option<f64>,
}

/// A validated daily aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub device_id: i64,
    pub date: NaiveDate,
    pub total_idle_minutes: f64,
    pub average_co2_intensity: Option<f64>,
}

impl TryFrom<&DailyAggregateInput> for DailyAggregate {
    type Error = ValidationError;

    fn try_from(input: &DailyAggregateInput) -> Result<Self, Self::Error> {
        let device_id = input
            .device_id
            .ok_or_else(|| ValidationError::missing("device_id"))?;

        let raw_date = input
            .date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ValidationError::missing("date"))?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
            ValidationError::new("date", ValidationKind::Malformed(e.to_string()))
        })?;

        let total_idle_minutes = input
            .total_idle_minutes
            .ok_or_else(|| ValidationError::missing("total_idle_minutes"))?;
        non_negative("total_idle_minutes", total_idle_minutes)?;

        if let Some(co2) = input.average_co2_intensity {
            non_negative("average_co2_intensity", co2)?;
        }

        Ok(Self {
            device_id,
            date,
            total_idle_minutes,
            average_co2_intensity: input.average_co2_intensity,
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, ValidationKind::NotFinite));
    }
    if value < 0.0 {
        return Err(ValidationError::new(field, ValidationKind::Negative { value }));
    }
    Ok(())
}

/// Hard flag strictly above the daily threshold, soft warning from
/// `threshold * warning_fraction` upwards (inclusive). The percentage is
/// clamped to `[0, 100]` for display, since an upstream aggregate may exceed
/// a full day.
pub fn detect(day: &DailyAggregate, table: &ParameterTable) -> DailyResult {
    let threshold = table.daily_idle_threshold_minutes;
    let minutes = day.total_idle_minutes;

    DailyResult {
        device_id: day.device_id,
        date: day.date,
        excessive_idle_detected: minutes > threshold,
        total_idle_minutes: minutes,
        excessive_idle_threshold: threshold,
        idle_percentage: (minutes / MINUTES_PER_DAY * 100.0).clamp(0.0, 100.0),
        is_warning: minutes >= threshold * table.daily_idle_warning_fraction,
    }
}
