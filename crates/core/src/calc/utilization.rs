use serde::{Deserialize, Serialize};

use crate::config::CalculationConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Underwork,
    Overtime,
    Exact,
}

/// Deviation of worked hours from the staffing plan. Every delta is a non-negative magnitude;
/// the direction lives in `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilizationVerdict {
    pub kind: VerdictKind,
    pub planned_hours: f64,
    pub hours_difference: f64,
    pub fte_difference: f64,
    pub cost: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilizationRates {
    pub hours_per_fte: f64,
    pub cost_per_fte: f64,
}

impl From<&CalculationConfig> for UtilizationRates {
    fn from(config: &CalculationConfig) -> Self {
        Self { hours_per_fte: config.hours_per_fte, cost_per_fte: config.cost_per_fte }
    }
}

impl Default for UtilizationRates {
    fn default() -> Self {
        Self::from(&CalculationConfig::default())
    }
}

pub trait UtilizationEngine: Send + Sync {
    fn rates(&self) -> UtilizationRates;
    fn evaluate(&self, planned_fte: f64, actual_hours: f64) -> UtilizationVerdict;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicUtilizationEngine {
    rates: UtilizationRates,
}

impl DeterministicUtilizationEngine {
    pub fn new(rates: UtilizationRates) -> Self {
        Self { rates }
    }
}

impl UtilizationEngine for DeterministicUtilizationEngine {
    fn rates(&self) -> UtilizationRates {
        self.rates
    }

    fn evaluate(&self, planned_fte: f64, actual_hours: f64) -> UtilizationVerdict {
        evaluate_utilization(planned_fte, actual_hours, &self.rates)
    }
}

/// Compares planned staffing with worked hours. Degenerate plans (zero or negative FTE) are
/// evaluated like any other input.
pub fn evaluate_utilization(
    planned_fte: f64,
    actual_hours: f64,
    rates: &UtilizationRates,
) -> UtilizationVerdict {
    let planned_hours = planned_fte * rates.hours_per_fte;
    let difference = planned_hours - actual_hours;

    let kind = if difference > 0.0 {
        VerdictKind::Underwork
    } else if difference < 0.0 {
        VerdictKind::Overtime
    } else {
        return UtilizationVerdict {
            kind: VerdictKind::Exact,
            planned_hours,
            hours_difference: 0.0,
            fte_difference: 0.0,
            cost: 0.0,
        };
    };

    let hours_difference = difference.abs();
    let fte_difference = hours_difference / rates.hours_per_fte;
    UtilizationVerdict {
        kind,
        planned_hours,
        hours_difference,
        fte_difference,
        cost: fte_difference * rates.cost_per_fte,
    }
}
