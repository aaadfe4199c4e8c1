use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::util::env::Env;

pub type TracingResult<T> = core::result::Result<T, TracingErr>;

#[derive(Debug, Error)]
pub enum TracingErr {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("global subscriber already set: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured `LOG_FILTER` when it is set.
pub fn build_subscriber(env: &Env) -> TracingResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&env.log_filter)?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    if env.log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init()?;
    }

    tracing::debug!(filter = env.log_filter, json = env.log_json, "tracing subscriber ready");
    Ok(())
}
