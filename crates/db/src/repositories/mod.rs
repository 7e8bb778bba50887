use thiserror::Error;
use tracing::warn;

use merchhours_core::lookup::LookupError;

pub mod lookup;

pub use lookup::SqlLookupProvider;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RepositoryError> for LookupError {
    fn from(error: RepositoryError) -> Self {
        warn!(event_name = "db.lookup.failed", error = %error, "lookup query failed");
        LookupError::DataUnavailable(error.to_string())
    }
}
