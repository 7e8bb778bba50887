use crate::commands::{
    build_runtime, load_config, CommandResult, Failure, EXIT_DATABASE, EXIT_MIGRATION,
};
use merchhours_db::{connect_from_config, migrations, ping};

/// Startup preflight: configuration, database reachability and migration state.
pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        let runtime = build_runtime()?;
        runtime.block_on(async {
            let pool = connect_from_config(&config.database)
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
            ping(&pool).await.map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
            let applied = migrations::applied_migrations(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
            pool.close().await;
            Ok::<usize, Failure>(applied)
        })
    });

    match result {
        Ok(applied) => {
            let known = migrations::known_migrations();
            let migration_note = if applied >= known {
                "schema up to date".to_string()
            } else {
                format!("{} pending migration(s); run `merchhours migrate`", known - applied)
            };
            CommandResult::success("start", format!("preflight passed: {migration_note}"))
        }
        Err(failure) => CommandResult::from_failure("start", failure),
    }
}
