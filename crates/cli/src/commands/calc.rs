use merchhours_core::calc::{
    perform_full_calculation, CalculationError, DeterministicUtilizationEngine, UtilizationRates,
    UtilizationReport, VerdictKind,
};
use merchhours_core::config::CalculationConfig;
use merchhours_core::domain::period::Period;
use merchhours_core::lookup::LookupProvider;
use merchhours_db::SqlLookupProvider;

use crate::commands::{
    build_runtime, load_config, migrated_pool, CommandResult, Failure, EXIT_CALCULATION,
    EXIT_DATABASE,
};

#[derive(Clone, Debug)]
pub struct CalcArgs {
    pub supplier: String,
    pub year: i32,
    pub month: u32,
    pub json: bool,
}

/// One-shot calculation through the same resolution policy and engine the chat flow uses.
pub fn run(args: CalcArgs) -> CommandResult {
    let result = load_config().and_then(|config| {
        let period = validate_inputs(&config.calculation, &args)?;
        let runtime = build_runtime()?;
        let report = runtime.block_on(async {
            let pool = migrated_pool(&config).await?;
            let outcome = calculate(&pool, &config.calculation, &args.supplier, &period).await;
            pool.close().await;
            outcome
        })?;
        Ok((report, config.calculation))
    });

    match result {
        Ok((report, settings)) => {
            let message = render_report(&report, &settings);
            let data = if args.json { serde_json::to_value(&report).ok() } else { None };
            CommandResult::success_with_data("calc", message, data)
        }
        Err(failure) => CommandResult::from_failure("calc", failure),
    }
}

async fn calculate(
    pool: &merchhours_db::DbPool,
    settings: &CalculationConfig,
    token: &str,
    period: &Period,
) -> Result<UtilizationReport, Failure> {
    let lookup = SqlLookupProvider::new(pool.clone());
    let supplier = lookup
        .resolve(token.trim())
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?
        .ok_or_else(|| {
            (
                "supplier_not_found",
                format!("supplier with code or name `{}` was not found", token.trim()),
                EXIT_CALCULATION,
            )
        })?;

    let engine = DeterministicUtilizationEngine::new(UtilizationRates::from(settings));
    perform_full_calculation(&lookup, &engine, &supplier, period).await.map_err(|error| match error {
        CalculationError::DataUnavailable(_) => ("db_connectivity", error.to_string(), EXIT_DATABASE),
        CalculationError::NoActualData { .. } => ("no_actual_data", error.to_string(), EXIT_CALCULATION),
        CalculationError::NoPlanData { .. } => ("no_plan_data", error.to_string(), EXIT_CALCULATION),
    })
}

fn validate_inputs(settings: &CalculationConfig, args: &CalcArgs) -> Result<Period, Failure> {
    if args.supplier.trim().is_empty() {
        return Err(("invalid_input", "supplier must not be empty".to_string(), EXIT_CALCULATION));
    }
    if !settings.year_in_range(args.year) {
        return Err((
            "invalid_input",
            format!(
                "year {} is outside {}..={}",
                args.year, settings.year_range_min, settings.year_range_max
            ),
            EXIT_CALCULATION,
        ));
    }
    Period::for_month(args.year, args.month)
        .map_err(|error| ("invalid_input", error.to_string(), EXIT_CALCULATION))
}

fn render_report(report: &UtilizationReport, settings: &CalculationConfig) -> String {
    let month = report.period.month();
    let month_name = settings.month_name(month).unwrap_or("?");
    let verdict = &report.verdict;

    let mut lines = vec![
        format!("supplier: {}", report.supplier),
        format!("period: {month_name} {} ({} - {})", report.period.year(), report.period.start, report.period.end),
        format!("actual: {:.2} h / {:.2} FTE", report.actual_hours, report.actual_fte),
        format!("planned: {:.2} h / {:.2} FTE", verdict.planned_hours, report.planned_fte),
    ];
    lines.push(match verdict.kind {
        VerdictKind::Underwork => format!(
            "underwork: {:.2} h / {:.2} FTE, cost {:.0} {}",
            verdict.hours_difference, verdict.fte_difference, verdict.cost, settings.currency
        ),
        VerdictKind::Overtime => format!(
            "overtime: {:.2} h / {:.2} FTE, cost {:.0} {}",
            verdict.hours_difference, verdict.fte_difference, verdict.cost, settings.currency
        ),
        VerdictKind::Exact => format!("exact match, additional cost 0 {}", settings.currency),
    });
    lines.join("\n")
}
