//! Supplier and timesheet lookups consumed by the conversation flow.
//!
//! The flow never talks to storage directly: it goes through [`LookupProvider`], which the `db`
//! crate implements over SQLite and [`InMemoryLookupProvider`] implements for tests and demos.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::period::Period;
use crate::domain::supplier::SupplierIdentity;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("data source unavailable: {0}")]
    DataUnavailable(String),
}

#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Distinct supplier identities in lexicographic order.
    async fn list_suppliers(&self) -> Result<Vec<SupplierIdentity>, LookupError>;

    async fn resolve(&self, token: &str) -> Result<Option<SupplierIdentity>, LookupError>;

    /// Total worked duration for shifts that started inside the period. `None` means no shifts.
    async fn actual_hours(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<Duration>, LookupError>;

    async fn planned_fte(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<f64>, LookupError>;
}

/// Two-tier supplier resolution over an ordered candidate list.
///
/// A purely numeric token is first matched against codes embedded as `(<code>)` in supplier
/// names. When that finds nothing, or the token is not numeric, the token is matched as a
/// case-insensitive substring of the name. The first hit in candidate order wins.
pub fn resolve_supplier<'a>(
    candidates: &'a [SupplierIdentity],
    token: &str,
) -> Option<&'a SupplierIdentity> {
    if is_numeric_token(token) {
        if let Some(found) = candidates.iter().find(|supplier| supplier.embeds_code(token)) {
            return Some(found);
        }
    }

    candidates.iter().find(|supplier| supplier.contains_ignore_case(token))
}

fn is_numeric_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|ch| ch.is_ascii_digit())
}

/// Bounds every call of the wrapped provider. A call that overruns is reported as
/// `DataUnavailable`, so the conversation keeps its state and the user can retry.
pub struct TimeoutLookupProvider<P> {
    inner: P,
    limit: StdDuration,
}

impl<P> TimeoutLookupProvider<P> {
    pub fn new(inner: P, limit: StdDuration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, LookupError>> + Send,
    ) -> Result<T, LookupError> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    event_name = "lookup.call.timed_out",
                    operation,
                    limit_ms = self.limit.as_millis() as u64,
                    "lookup call exceeded its time limit"
                );
                Err(LookupError::DataUnavailable(format!(
                    "{operation} did not answer within {} ms",
                    self.limit.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl<P: LookupProvider> LookupProvider for TimeoutLookupProvider<P> {
    async fn list_suppliers(&self) -> Result<Vec<SupplierIdentity>, LookupError> {
        self.bounded("list_suppliers", self.inner.list_suppliers()).await
    }

    async fn resolve(&self, token: &str) -> Result<Option<SupplierIdentity>, LookupError> {
        self.bounded("resolve", self.inner.resolve(token)).await
    }

    async fn actual_hours(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<Duration>, LookupError> {
        self.bounded("actual_hours", self.inner.actual_hours(supplier, period)).await
    }

    async fn planned_fte(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<f64>, LookupError> {
        self.bounded("planned_fte", self.inner.planned_fte(supplier, period)).await
    }
}

#[derive(Clone, Debug, PartialEq)]
struct WorkedShift {
    supplier: SupplierIdentity,
    entered_on: NaiveDate,
    worked: Duration,
}

#[derive(Clone, Debug, PartialEq)]
struct StaffingPlan {
    supplier: SupplierIdentity,
    month_date: NaiveDate,
    fte: f64,
}

#[derive(Default)]
struct InMemoryLookupState {
    suppliers: BTreeSet<SupplierIdentity>,
    shifts: Vec<WorkedShift>,
    plans: Vec<StaffingPlan>,
}

/// Lookup provider backed by process memory. Availability can be toggled to exercise the
/// `DataUnavailable` paths.
pub struct InMemoryLookupProvider {
    state: RwLock<InMemoryLookupState>,
    available: AtomicBool,
}

impl Default for InMemoryLookupProvider {
    fn default() -> Self {
        Self { state: RwLock::new(InMemoryLookupState::default()), available: AtomicBool::new(true) }
    }
}

impl InMemoryLookupProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supplier(mut self, supplier: impl Into<SupplierIdentity>) -> Self {
        self.state.get_mut().suppliers.insert(supplier.into());
        self
    }

    pub fn with_shift(
        mut self,
        supplier: impl Into<SupplierIdentity>,
        entered_on: NaiveDate,
        worked: Duration,
    ) -> Self {
        self.state.get_mut().shifts.push(WorkedShift { supplier: supplier.into(), entered_on, worked });
        self
    }

    /// Registers a staffing plan; the supplier becomes listable like a `merch_fix` row would.
    pub fn with_plan(
        mut self,
        supplier: impl Into<SupplierIdentity>,
        month_date: NaiveDate,
        fte: f64,
    ) -> Self {
        let supplier = supplier.into();
        let state = self.state.get_mut();
        state.suppliers.insert(supplier.clone());
        state.plans.push(StaffingPlan { supplier, month_date, fte });
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), LookupError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LookupError::DataUnavailable("in-memory data source is offline".to_owned()))
        }
    }
}

#[async_trait]
impl LookupProvider for InMemoryLookupProvider {
    async fn list_suppliers(&self) -> Result<Vec<SupplierIdentity>, LookupError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.suppliers.iter().cloned().collect())
    }

    async fn resolve(&self, token: &str) -> Result<Option<SupplierIdentity>, LookupError> {
        let suppliers = self.list_suppliers().await?;
        Ok(resolve_supplier(&suppliers, token).cloned())
    }

    async fn actual_hours(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<Duration>, LookupError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let matching = state
            .shifts
            .iter()
            .filter(|shift| &shift.supplier == supplier && period.contains(shift.entered_on))
            .map(|shift| shift.worked)
            .collect::<Vec<_>>();

        if matching.is_empty() {
            return Ok(None);
        }
        Ok(Some(matching.into_iter().fold(Duration::zero(), |total, worked| total + worked)))
    }

    async fn planned_fte(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<f64>, LookupError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .plans
            .iter()
            .find(|plan| &plan.supplier == supplier && period.contains(plan.month_date))
            .map(|plan| plan.fte))
    }
}
