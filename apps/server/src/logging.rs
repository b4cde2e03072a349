//! Logging initialization
//!
//! Sets up `tracing` with an environment-driven filter. `RUST_LOG` wins when
//! set; otherwise the configured level is applied to this crate and the
//! noisier dependencies are kept quiet.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vesta={},tower_http=info,sqlx=warn",
            config.level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
