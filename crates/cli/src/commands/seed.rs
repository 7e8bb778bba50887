use crate::commands::{
    build_runtime, load_config, migrated_pool, CommandResult, Failure, EXIT_CALCULATION,
    EXIT_MIGRATION,
};
use merchhours_db::{DemoSeedDataset, SeedResult};

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        let runtime = build_runtime()?;
        runtime.block_on(async {
            let pool = migrated_pool(&config).await?;

            let seed_result = DemoSeedDataset::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;
            let verification = DemoSeedDataset::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), EXIT_CALCULATION))?;

            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect::<Vec<_>>();
            let outcome: Result<SeedResult, Failure> = if verification.all_present {
                Ok(seed_result)
            } else {
                let message = verification_failure_message(&failed_checks);
                Err(("seed_verification", message, EXIT_CALCULATION))
            };

            pool.close().await;
            outcome
        })
    });

    match result {
        Ok(seed_result) => CommandResult::success("seed", success_message(&seed_result)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn success_message(seed_result: &SeedResult) -> String {
    let suppliers = seed_result
        .suppliers_seeded
        .iter()
        .map(|supplier| format!("  - {supplier}"))
        .collect::<Vec<_>>();
    format!(
        "demo dataset loaded ({} plan rows, {} shift rows) for suppliers:\n{}",
        seed_result.plan_rows,
        seed_result.shift_rows,
        suppliers.join("\n")
    )
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{success_message, verification_failure_message};
    use merchhours_db::SeedResult;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let message = verification_failure_message(&[
            "Alpha Foods (1064): plan",
            "Gamma Trade (4100): worked time",
        ]);

        assert_eq!(
            message,
            "Seed verification failed for checks: Alpha Foods (1064): plan, Gamma Trade (4100): worked time"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "Some seed data failed to load");
    }

    #[test]
    fn success_message_lists_each_supplier() {
        let message = success_message(&SeedResult {
            suppliers_seeded: vec!["Alpha Foods (1064)", "Beta Logistics (3300)"],
            plan_rows: 4,
            shift_rows: 62,
        });

        assert!(message.starts_with("demo dataset loaded (4 plan rows, 62 shift rows)"));
        assert!(message.contains("  - Beta Logistics (3300)"));
    }
}
