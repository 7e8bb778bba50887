use merchhours_core::lookup::LookupProvider;
use merchhours_db::SqlLookupProvider;
use serde_json::json;

use crate::commands::{
    build_runtime, load_config, migrated_pool, CommandResult, Failure, EXIT_DATABASE,
};

/// Lists suppliers in the order and numbering the chat keyboard uses.
pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        let runtime = build_runtime()?;
        runtime.block_on(async {
            let pool = migrated_pool(&config).await?;
            let lookup = SqlLookupProvider::new(pool.clone());
            let suppliers = lookup
                .list_suppliers()
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE));
            pool.close().await;
            Ok::<_, Failure>(suppliers?)
        })
    });

    match result {
        Ok(suppliers) if suppliers.is_empty() => {
            CommandResult::success_with_data("suppliers", "no suppliers found", Some(json!([])))
        }
        Ok(suppliers) => {
            let lines = suppliers
                .iter()
                .enumerate()
                .map(|(index, supplier)| format!("{}. {supplier}", index + 1))
                .collect::<Vec<_>>();
            let names = suppliers.iter().map(|supplier| supplier.as_str()).collect::<Vec<_>>();
            CommandResult::success_with_data(
                "suppliers",
                format!("{} suppliers:\n{}", suppliers.len(), lines.join("\n")),
                Some(json!(names)),
            )
        }
        Err(failure) => CommandResult::from_failure("suppliers", failure),
    }
}
