use std::sync::Arc;
use std::time::Duration;

use merchhours_chat::events::conversation_dispatcher;
use merchhours_chat::polling::{NoopChatTransport, PollingRunner, ReconnectPolicy};
use merchhours_core::config::{AppConfig, ConfigError};
use merchhours_core::flows::{ConversationEngine, ConversationService};
use merchhours_core::lookup::TimeoutLookupProvider;
use merchhours_db::{connect_from_config, migrations, DbPool, SqlLookupProvider};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub conversation: Arc<ConversationService>,
    pub chat_runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg(test)]
pub async fn bootstrap(
    options: merchhours_core::config::LoadOptions,
) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let lookup = Arc::new(TimeoutLookupProvider::new(
        SqlLookupProvider::new(db_pool.clone()),
        Duration::from_secs(config.database.timeout_secs),
    ));
    let engine = ConversationEngine::from_config(lookup, config.calculation.clone());
    let conversation = Arc::new(ConversationService::new(engine));
    let chat_runner = PollingRunner::new(
        Arc::new(NoopChatTransport),
        conversation_dispatcher(conversation.clone()),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, conversation, chat_runner })
}
