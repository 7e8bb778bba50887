use crate::commands::{build_runtime, load_config, migrated_pool, CommandResult, Failure};
use merchhours_db::migrations;

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        let runtime = build_runtime()?;
        runtime.block_on(async {
            let pool = migrated_pool(&config).await?;
            let applied = migrations::applied_migrations(&pool).await.unwrap_or_default();
            pool.close().await;
            Ok::<usize, Failure>(applied)
        })
    });

    match result {
        Ok(applied) => CommandResult::success(
            "migrate",
            format!(
                "applied pending migrations ({applied}/{} recorded)",
                migrations::known_migrations()
            ),
        ),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
