use rst_common::with_tracing::tracing_subscriber::{
    self, layer::SubscriberExt, util::SubscriberInitExt,
};

use super::types::CommonError;

/// Installs the global tracing subscriber used by binaries embedding the engine
///
/// `RUST_LOG` takes precedence over the configured filter
pub fn init_tracing(filter: &str) -> Result<(), CommonError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .try_init()
        .map_err(|err| CommonError::LoggingError(err.to_string()))
}
