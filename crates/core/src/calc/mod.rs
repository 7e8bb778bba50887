pub mod utilization;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::period::Period;
use crate::domain::supplier::SupplierIdentity;
use crate::lookup::{LookupError, LookupProvider};

pub use utilization::{
    evaluate_utilization, DeterministicUtilizationEngine, UtilizationEngine, UtilizationRates,
    UtilizationVerdict, VerdictKind,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalculationError {
    #[error("data source unavailable: {0}")]
    DataUnavailable(String),
    #[error("no worked hours recorded for {supplier} in {year}-{month:02}")]
    NoActualData { supplier: String, year: i32, month: u32 },
    #[error("no staffing plan for {supplier} in {year}-{month:02}")]
    NoPlanData { supplier: String, year: i32, month: u32 },
}

impl From<LookupError> for CalculationError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::DataUnavailable(detail) => Self::DataUnavailable(detail),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub supplier: SupplierIdentity,
    pub period: Period,
    pub actual_hours: f64,
    pub actual_fte: f64,
    pub planned_fte: f64,
    pub verdict: UtilizationVerdict,
}

pub fn duration_to_hours(worked: Duration) -> f64 {
    worked.num_seconds() as f64 / 3600.0
}

/// Fetches worked hours and the staffing plan for one supplier-month and evaluates them.
///
/// Worked hours are checked before the plan, so a month with neither reports `NoActualData`.
pub async fn perform_full_calculation<P, E>(
    lookup: &P,
    engine: &E,
    supplier: &SupplierIdentity,
    period: &Period,
) -> Result<UtilizationReport, CalculationError>
where
    P: LookupProvider + ?Sized,
    E: UtilizationEngine + ?Sized,
{
    let year = period.year();
    let month = period.month();

    let worked = lookup.actual_hours(supplier, period).await?.ok_or_else(|| {
        CalculationError::NoActualData { supplier: supplier.to_string(), year, month }
    })?;
    let planned_fte = lookup.planned_fte(supplier, period).await?.ok_or_else(|| {
        CalculationError::NoPlanData { supplier: supplier.to_string(), year, month }
    })?;

    let actual_hours = duration_to_hours(worked);
    let rates = engine.rates();
    let verdict = engine.evaluate(planned_fte, actual_hours);

    info!(
        event_name = "calc.utilization.completed",
        supplier = %supplier,
        year,
        month,
        actual_hours,
        planned_fte,
        verdict = ?verdict.kind,
        "utilization calculated"
    );

    Ok(UtilizationReport {
        supplier: supplier.clone(),
        period: *period,
        actual_hours,
        actual_fte: actual_hours / rates.hours_per_fte,
        planned_fte,
        verdict,
    })
}
