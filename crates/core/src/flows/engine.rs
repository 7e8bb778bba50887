use std::sync::Arc;

use tracing::{info, warn};

use crate::calc::{
    perform_full_calculation, CalculationError, DeterministicUtilizationEngine, UtilizationEngine,
    UtilizationRates,
};
use crate::config::CalculationConfig;
use crate::domain::period::{Period, PeriodError};
use crate::domain::supplier::SupplierIdentity;
use crate::errors::{ConversationError, InputError};
use crate::flows::states::{
    ConversationEvent, ConversationReply, ConversationSession, ConversationState,
    PresentationRequest,
};
use crate::lookup::LookupProvider;

/// Work the engine performs for an accepted `(state, event)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ConversationStep {
    FetchSuppliers { restart: bool },
    SelectSupplier { index: usize },
    OpenManualEntry,
    ResolveSupplier { token: String },
    AcceptYear { text: String },
    Calculate { month: u32 },
}

/// Drives one session through supplier, year and month selection and runs the calculation.
///
/// Every step mutates the session only once its lookups have succeeded, so a failed step leaves
/// the session exactly as it was unless the failure itself ends the calculation.
pub struct ConversationEngine {
    lookup: Arc<dyn LookupProvider>,
    utilization: Arc<dyn UtilizationEngine>,
    settings: CalculationConfig,
}

impl ConversationEngine {
    pub fn new(
        lookup: Arc<dyn LookupProvider>,
        utilization: Arc<dyn UtilizationEngine>,
        settings: CalculationConfig,
    ) -> Self {
        Self { lookup, utilization, settings }
    }

    pub fn from_config(lookup: Arc<dyn LookupProvider>, settings: CalculationConfig) -> Self {
        let utilization =
            Arc::new(DeterministicUtilizationEngine::new(UtilizationRates::from(&settings)));
        Self::new(lookup, utilization, settings)
    }

    pub fn settings(&self) -> &CalculationConfig {
        &self.settings
    }

    pub async fn apply(
        &self,
        session: &mut ConversationSession,
        event: ConversationEvent,
    ) -> Result<ConversationReply, ConversationError> {
        let from = session.state;
        let result = match plan_step(from, &event) {
            Ok(step) => self.execute(session, step).await,
            Err(error) => Err(error),
        };

        match &result {
            Ok(_) => info!(
                event_name = "flow.transition_applied",
                from = ?from,
                to = ?session.state,
                event = ?event,
                "conversation transition applied"
            ),
            Err(error) => warn!(
                event_name = "flow.transition_rejected",
                from = ?from,
                to = ?session.state,
                event = ?event,
                error = %error,
                recoverable = error.is_recoverable(),
                "conversation transition rejected"
            ),
        }
        result
    }

    async fn execute(
        &self,
        session: &mut ConversationSession,
        step: ConversationStep,
    ) -> Result<ConversationReply, ConversationError> {
        match step {
            ConversationStep::FetchSuppliers { restart } => {
                self.fetch_suppliers(session, restart).await
            }
            ConversationStep::SelectSupplier { index } => {
                let candidates = &session.context.candidate_suppliers;
                let supplier = candidates.get(index).cloned().ok_or(
                    InputError::SupplierIndexOutOfRange { index, available: candidates.len() },
                )?;
                Ok(self.advance_to_year(session, supplier))
            }
            ConversationStep::OpenManualEntry => {
                session.state = ConversationState::AwaitingSupplierTextInput;
                Ok(ConversationReply::Present(PresentationRequest::SupplierTextEntry))
            }
            ConversationStep::ResolveSupplier { token } => {
                self.resolve_supplier(session, token.trim()).await
            }
            ConversationStep::AcceptYear { text } => self.accept_year(session, text.trim()),
            ConversationStep::Calculate { month } => self.calculate(session, month).await,
        }
    }

    async fn fetch_suppliers(
        &self,
        session: &mut ConversationSession,
        restart: bool,
    ) -> Result<ConversationReply, ConversationError> {
        if restart {
            session.reset();
        }

        let suppliers = self.lookup.list_suppliers().await?;
        if suppliers.is_empty() {
            return Err(ConversationError::NoSuppliers);
        }

        session.reset();
        session.state = ConversationState::AwaitingSupplierChoice;
        session.context.candidate_suppliers = suppliers.clone();
        Ok(ConversationReply::Present(PresentationRequest::SupplierChoices { suppliers }))
    }

    async fn resolve_supplier(
        &self,
        session: &mut ConversationSession,
        token: &str,
    ) -> Result<ConversationReply, ConversationError> {
        if token.is_empty() {
            return Err(InputError::EmptySupplierToken.into());
        }

        if let Some(supplier) = self.lookup.resolve(token).await? {
            return Ok(self.advance_to_year(session, supplier));
        }

        let suppliers = self.lookup.list_suppliers().await?;
        if !suppliers.is_empty() {
            session.state = ConversationState::AwaitingSupplierChoice;
            session.context.candidate_suppliers = suppliers.clone();
        }
        Err(ConversationError::NoMatch { token: token.to_owned(), suppliers })
    }

    fn advance_to_year(
        &self,
        session: &mut ConversationSession,
        supplier: SupplierIdentity,
    ) -> ConversationReply {
        session.context.selected_supplier = Some(supplier.clone());
        session.state = ConversationState::AwaitingYear;
        ConversationReply::Present(PresentationRequest::YearEntry {
            supplier,
            min_year: self.settings.year_range_min,
            max_year: self.settings.year_range_max,
        })
    }

    fn accept_year(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<ConversationReply, ConversationError> {
        let year = text
            .parse::<i32>()
            .map_err(|_| InputError::YearNotNumeric { text: text.to_owned() })?;
        if !self.settings.year_in_range(year) {
            return Err(InputError::YearOutOfRange {
                year,
                min: self.settings.year_range_min,
                max: self.settings.year_range_max,
            }
            .into());
        }

        session.context.selected_year = Some(year);
        session.state = ConversationState::AwaitingMonth;
        Ok(ConversationReply::Present(PresentationRequest::MonthChoices {
            year,
            month_names: self.settings.month_names.clone(),
        }))
    }

    /// An unreachable data source keeps the session at the month step so the same month can be
    /// retried; missing hours or plan end the attempt.
    async fn calculate(
        &self,
        session: &mut ConversationSession,
        month: u32,
    ) -> Result<ConversationReply, ConversationError> {
        let (Some(supplier), Some(year)) =
            (session.context.selected_supplier.clone(), session.context.selected_year)
        else {
            session.reset();
            return Err(ConversationError::IncompleteSession);
        };
        let period = Period::for_month(year, month).map_err(|error| match error {
            PeriodError::InvalidMonth(month) => InputError::MonthOutOfRange(month),
            PeriodError::InvalidYear(year) => InputError::YearOutOfRange {
                year,
                min: self.settings.year_range_min,
                max: self.settings.year_range_max,
            },
        })?;

        session.context.selected_month = Some(month);
        let outcome = perform_full_calculation(
            self.lookup.as_ref(),
            self.utilization.as_ref(),
            &supplier,
            &period,
        )
        .await;
        session.context.selected_month = None;

        match outcome {
            Ok(report) => {
                session.reset();
                Ok(ConversationReply::Report(report))
            }
            Err(CalculationError::DataUnavailable(detail)) => {
                Err(ConversationError::DataUnavailable(detail))
            }
            Err(terminal) => {
                session.reset();
                Err(terminal.into())
            }
        }
    }
}

fn plan_step(
    state: ConversationState,
    event: &ConversationEvent,
) -> Result<ConversationStep, ConversationError> {
    use ConversationEvent::{
        ManualEntryRequested, MonthChosen, RestartRequested, StartRequested, SupplierChosen,
        SupplierTextSubmitted, YearSubmitted,
    };
    use ConversationState::{
        AwaitingMonth, AwaitingSupplierChoice, AwaitingSupplierTextInput, AwaitingYear, Idle,
    };

    let step = match (state, event) {
        (_, RestartRequested) => ConversationStep::FetchSuppliers { restart: true },
        (_, StartRequested) => ConversationStep::FetchSuppliers { restart: false },
        (AwaitingSupplierChoice, SupplierChosen { index }) => {
            ConversationStep::SelectSupplier { index: *index }
        }
        (AwaitingSupplierChoice, ManualEntryRequested) => ConversationStep::OpenManualEntry,
        (AwaitingSupplierTextInput, SupplierTextSubmitted { token }) => {
            ConversationStep::ResolveSupplier { token: token.clone() }
        }
        (AwaitingYear, YearSubmitted { text }) => ConversationStep::AcceptYear { text: text.clone() },
        (AwaitingMonth, MonthChosen { month }) => ConversationStep::Calculate { month: *month },
        (Idle, _) => return Err(ConversationError::Unrecognized),
        _ => return Err(ConversationError::OutOfTurn { state }),
    };
    Ok(step)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};

    use super::{plan_step, ConversationEngine, ConversationStep};
    use crate::calc::VerdictKind;
    use crate::config::CalculationConfig;
    use crate::domain::period::Period;
    use crate::domain::supplier::SupplierIdentity;
    use crate::errors::{ConversationError, InputError};
    use crate::flows::states::{
        ConversationContext, ConversationEvent, ConversationReply, ConversationSession,
        ConversationState, PresentationRequest,
    };
    use crate::lookup::{InMemoryLookupProvider, LookupError, LookupProvider};

    const ALPHA: &str = "Alpha Foods (1064)";
    const BETA: &str = "Beta Logistics (3300)";

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn provider() -> Arc<InMemoryLookupProvider> {
        Arc::new(
            InMemoryLookupProvider::new()
                .with_plan(ALPHA, date(2025, 5, 1), 1.0)
                .with_plan(BETA, date(2025, 5, 1), 2.0)
                .with_shift(ALPHA, date(2025, 5, 6), Duration::hours(150))
                .with_shift(BETA, date(2025, 4, 30), Duration::hours(10)),
        )
    }

    fn engine_with(provider: Arc<InMemoryLookupProvider>) -> ConversationEngine {
        ConversationEngine::from_config(provider, CalculationConfig::default())
    }

    fn awaiting_month(supplier: &str, year: i32) -> ConversationSession {
        ConversationSession {
            state: ConversationState::AwaitingMonth,
            context: ConversationContext {
                candidate_suppliers: vec![SupplierIdentity::new(ALPHA), SupplierIdentity::new(BETA)],
                selected_supplier: Some(SupplierIdentity::new(supplier)),
                selected_year: Some(year),
                selected_month: None,
            },
        }
    }

    #[test]
    fn restart_is_accepted_from_every_state() {
        for state in [
            ConversationState::Idle,
            ConversationState::AwaitingSupplierChoice,
            ConversationState::AwaitingSupplierTextInput,
            ConversationState::AwaitingYear,
            ConversationState::AwaitingMonth,
        ] {
            assert_eq!(
                plan_step(state, &ConversationEvent::RestartRequested),
                Ok(ConversationStep::FetchSuppliers { restart: true })
            );
        }
    }

    #[test]
    fn idle_rejects_step_input_as_unrecognized() {
        let error = plan_step(
            ConversationState::Idle,
            &ConversationEvent::YearSubmitted { text: "2025".to_owned() },
        )
        .expect_err("idle does not take a year");
        assert_eq!(error, ConversationError::Unrecognized);
    }

    #[test]
    fn input_for_another_step_is_out_of_turn() {
        let error = plan_step(
            ConversationState::AwaitingYear,
            &ConversationEvent::MonthChosen { month: 5 },
        )
        .expect_err("month before year");
        assert_eq!(error, ConversationError::OutOfTurn { state: ConversationState::AwaitingYear });
    }

    #[tokio::test]
    async fn start_snapshots_candidates_in_lexicographic_order() {
        let engine = engine_with(provider());
        let mut session = ConversationSession::default();

        let reply =
            engine.apply(&mut session, ConversationEvent::StartRequested).await.expect("start");

        let expected = vec![SupplierIdentity::new(ALPHA), SupplierIdentity::new(BETA)];
        assert_eq!(
            reply,
            ConversationReply::Present(PresentationRequest::SupplierChoices {
                suppliers: expected.clone()
            })
        );
        assert_eq!(session.state, ConversationState::AwaitingSupplierChoice);
        assert_eq!(session.context.candidate_suppliers, expected);
    }

    #[tokio::test]
    async fn start_without_suppliers_stays_idle() {
        let engine = engine_with(Arc::new(InMemoryLookupProvider::new()));
        let mut session = ConversationSession::default();

        let error =
            engine.apply(&mut session, ConversationEvent::StartRequested).await.expect_err("empty");

        assert_eq!(error, ConversationError::NoSuppliers);
        assert_eq!(session, ConversationSession::default());
    }

    #[tokio::test]
    async fn out_of_range_index_does_not_touch_selection() {
        let engine = engine_with(provider());
        let mut session = ConversationSession::default();
        engine.apply(&mut session, ConversationEvent::StartRequested).await.expect("start");
        let before = session.clone();

        let error = engine
            .apply(&mut session, ConversationEvent::SupplierChosen { index: 2 })
            .await
            .expect_err("only two candidates");

        assert_eq!(
            error,
            ConversationError::InvalidInput(InputError::SupplierIndexOutOfRange {
                index: 2,
                available: 2
            })
        );
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn positional_choice_uses_the_presented_snapshot() {
        let source = provider();
        let engine = engine_with(source.clone());
        let mut session = ConversationSession {
            state: ConversationState::AwaitingSupplierChoice,
            context: ConversationContext {
                candidate_suppliers: vec![SupplierIdentity::new(BETA)],
                ..ConversationContext::default()
            },
        };

        engine
            .apply(&mut session, ConversationEvent::SupplierChosen { index: 0 })
            .await
            .expect("first presented candidate");

        assert_eq!(session.context.selected_supplier, Some(SupplierIdentity::new(BETA)));
        assert_eq!(session.state, ConversationState::AwaitingYear);
    }

    #[tokio::test]
    async fn manual_entry_resolves_embedded_code() {
        let engine = engine_with(provider());
        let mut session = ConversationSession::default();
        engine.apply(&mut session, ConversationEvent::StartRequested).await.expect("start");
        engine.apply(&mut session, ConversationEvent::ManualEntryRequested).await.expect("manual");
        assert_eq!(session.state, ConversationState::AwaitingSupplierTextInput);

        let reply = engine
            .apply(&mut session, ConversationEvent::SupplierTextSubmitted { token: " 1064 ".to_owned() })
            .await
            .expect("code match");

        assert_eq!(
            reply,
            ConversationReply::Present(PresentationRequest::YearEntry {
                supplier: SupplierIdentity::new(ALPHA),
                min_year: 2020,
                max_year: 2030,
            })
        );
        assert_eq!(session.state, ConversationState::AwaitingYear);
    }

    #[tokio::test]
    async fn empty_token_reprompts_in_place() {
        let engine = engine_with(provider());
        let mut session = ConversationSession {
            state: ConversationState::AwaitingSupplierTextInput,
            ..ConversationSession::default()
        };

        let error = engine
            .apply(&mut session, ConversationEvent::SupplierTextSubmitted { token: "   ".to_owned() })
            .await
            .expect_err("blank token");

        assert_eq!(error, ConversationError::InvalidInput(InputError::EmptySupplierToken));
        assert_eq!(session.state, ConversationState::AwaitingSupplierTextInput);
    }

    #[tokio::test]
    async fn unmatched_token_represents_the_supplier_list() {
        let engine = engine_with(provider());
        let mut session = ConversationSession {
            state: ConversationState::AwaitingSupplierTextInput,
            ..ConversationSession::default()
        };

        let error = engine
            .apply(&mut session, ConversationEvent::SupplierTextSubmitted { token: "zeta".to_owned() })
            .await
            .expect_err("no match");

        let ConversationError::NoMatch { token, suppliers } = error else {
            panic!("expected NoMatch");
        };
        assert_eq!(token, "zeta");
        assert_eq!(suppliers.len(), 2);
        assert_eq!(session.state, ConversationState::AwaitingSupplierChoice);
        assert_eq!(session.context.candidate_suppliers, suppliers);
    }

    #[tokio::test]
    async fn outage_during_resolution_keeps_the_step() {
        let source = provider();
        let engine = engine_with(source.clone());
        let mut session = ConversationSession {
            state: ConversationState::AwaitingSupplierTextInput,
            ..ConversationSession::default()
        };
        source.set_available(false);

        let error = engine
            .apply(&mut session, ConversationEvent::SupplierTextSubmitted { token: "alpha".to_owned() })
            .await
            .expect_err("offline");

        assert!(matches!(error, ConversationError::DataUnavailable(_)));
        assert_eq!(session.state, ConversationState::AwaitingSupplierTextInput);
    }

    #[tokio::test]
    async fn year_bounds_are_inclusive() {
        let engine = engine_with(provider());
        let awaiting_year = ConversationSession {
            state: ConversationState::AwaitingYear,
            context: ConversationContext {
                selected_supplier: Some(SupplierIdentity::new(ALPHA)),
                ..ConversationContext::default()
            },
        };

        for accepted in ["2020", "2030", " 2025 "] {
            let mut session = awaiting_year.clone();
            engine
                .apply(&mut session, ConversationEvent::YearSubmitted { text: accepted.to_owned() })
                .await
                .expect("year in range");
            assert_eq!(session.state, ConversationState::AwaitingMonth);
        }

        for rejected in ["2019", "2031"] {
            let mut session = awaiting_year.clone();
            let error = engine
                .apply(&mut session, ConversationEvent::YearSubmitted { text: rejected.to_owned() })
                .await
                .expect_err("year out of range");
            assert!(matches!(
                error,
                ConversationError::InvalidInput(InputError::YearOutOfRange { .. })
            ));
            assert_eq!(session, awaiting_year);
        }

        let mut session = awaiting_year.clone();
        let error = engine
            .apply(&mut session, ConversationEvent::YearSubmitted { text: "next year".to_owned() })
            .await
            .expect_err("not numeric");
        assert!(matches!(error, ConversationError::InvalidInput(InputError::YearNotNumeric { .. })));
        assert_eq!(session, awaiting_year);
    }

    #[tokio::test]
    async fn month_selection_produces_report_and_clears_context() {
        let engine = engine_with(provider());
        let mut session = awaiting_month(ALPHA, 2025);

        let reply = engine
            .apply(&mut session, ConversationEvent::MonthChosen { month: 5 })
            .await
            .expect("report");

        let ConversationReply::Report(report) = reply else {
            panic!("expected a report");
        };
        assert_eq!(report.period.start, date(2025, 5, 1));
        assert_eq!(report.period.end, date(2025, 5, 31));
        assert_eq!(report.verdict.kind, VerdictKind::Underwork);
        assert_eq!(session, ConversationSession::default());
    }

    #[tokio::test]
    async fn missing_records_end_the_calculation() {
        let engine = engine_with(provider());
        let mut session = awaiting_month(BETA, 2025);

        let error = engine
            .apply(&mut session, ConversationEvent::MonthChosen { month: 5 })
            .await
            .expect_err("beta worked in april only");

        assert!(matches!(error, ConversationError::NoActualData { .. }));
        assert_eq!(session, ConversationSession::default());
    }

    #[tokio::test]
    async fn outage_during_calculation_allows_retrying_the_month() {
        let source = provider();
        let engine = engine_with(source.clone());
        let mut session = awaiting_month(ALPHA, 2025);
        source.set_available(false);

        let error = engine
            .apply(&mut session, ConversationEvent::MonthChosen { month: 5 })
            .await
            .expect_err("offline");
        assert!(matches!(error, ConversationError::DataUnavailable(_)));
        assert_eq!(session, awaiting_month(ALPHA, 2025));

        source.set_available(true);
        let reply = engine
            .apply(&mut session, ConversationEvent::MonthChosen { month: 5 })
            .await
            .expect("retry succeeds");
        assert!(matches!(reply, ConversationReply::Report(_)));
    }

    #[tokio::test]
    async fn invalid_month_stays_in_place() {
        let engine = engine_with(provider());
        let mut session = awaiting_month(ALPHA, 2025);

        let error = engine
            .apply(&mut session, ConversationEvent::MonthChosen { month: 13 })
            .await
            .expect_err("no 13th month");

        assert_eq!(error, ConversationError::InvalidInput(InputError::MonthOutOfRange(13)));
        assert_eq!(session, awaiting_month(ALPHA, 2025));
    }

    #[tokio::test]
    async fn restart_with_outage_lands_in_idle() {
        let source = provider();
        let engine = engine_with(source.clone());
        let mut session = awaiting_month(ALPHA, 2025);
        source.set_available(false);

        let error = engine
            .apply(&mut session, ConversationEvent::RestartRequested)
            .await
            .expect_err("offline");

        assert!(matches!(error, ConversationError::DataUnavailable(_)));
        assert_eq!(session, ConversationSession::default());
    }

    #[tokio::test]
    async fn restart_mid_flow_clears_selection_and_presents_fresh_list() {
        let engine = engine_with(provider());
        let mut session = awaiting_month(BETA, 2025);
        session.context.candidate_suppliers = vec![SupplierIdentity::new(BETA)];

        let reply =
            engine.apply(&mut session, ConversationEvent::RestartRequested).await.expect("restart");

        let fresh = vec![SupplierIdentity::new(ALPHA), SupplierIdentity::new(BETA)];
        assert_eq!(
            reply,
            ConversationReply::Present(PresentationRequest::SupplierChoices {
                suppliers: fresh.clone()
            })
        );
        assert_eq!(session.state, ConversationState::AwaitingSupplierChoice);
        assert_eq!(session.context.selected_supplier, None);
        assert_eq!(session.context.selected_year, None);
        assert_eq!(session.context.candidate_suppliers, fresh);
    }

    fn awaiting_text() -> ConversationSession {
        ConversationSession {
            state: ConversationState::AwaitingSupplierTextInput,
            ..ConversationSession::default()
        }
    }

    #[tokio::test]
    async fn unmatched_token_with_no_suppliers_left_stays_in_text_entry() {
        let engine = engine_with(Arc::new(InMemoryLookupProvider::new()));
        let mut session = awaiting_text();

        let error = engine
            .apply(&mut session, ConversationEvent::SupplierTextSubmitted { token: "9999".to_owned() })
            .await
            .expect_err("nothing to match");

        assert_eq!(
            error,
            ConversationError::NoMatch { token: "9999".to_owned(), suppliers: Vec::new() }
        );
        assert_eq!(session, awaiting_text());
    }

    /// Resolves nothing and cannot list suppliers.
    struct ListingOutage;

    #[async_trait]
    impl LookupProvider for ListingOutage {
        async fn list_suppliers(&self) -> Result<Vec<SupplierIdentity>, LookupError> {
            Err(LookupError::DataUnavailable("connection reset".to_owned()))
        }

        async fn resolve(&self, _token: &str) -> Result<Option<SupplierIdentity>, LookupError> {
            Ok(None)
        }

        async fn actual_hours(
            &self,
            _supplier: &SupplierIdentity,
            _period: &Period,
        ) -> Result<Option<Duration>, LookupError> {
            Ok(None)
        }

        async fn planned_fte(
            &self,
            _supplier: &SupplierIdentity,
            _period: &Period,
        ) -> Result<Option<f64>, LookupError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn outage_while_relisting_after_no_match_keeps_text_entry() {
        let engine =
            ConversationEngine::from_config(Arc::new(ListingOutage), CalculationConfig::default());
        let mut session = awaiting_text();

        let error = engine
            .apply(&mut session, ConversationEvent::SupplierTextSubmitted { token: "acme".to_owned() })
            .await
            .expect_err("offline");

        assert!(matches!(error, ConversationError::DataUnavailable(_)));
        assert_eq!(session, awaiting_text());
    }
}
