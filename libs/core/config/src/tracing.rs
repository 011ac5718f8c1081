//! Logging bootstrap shared by every binary in the workspace.

use crate::Environment;
use tracing::debug;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Default filter when `RUST_LOG` is unset.
///
/// Production keeps lifecycle events (worker start/stop, delivery failures)
/// and silences per-query noise. Development shows per-message detail.
pub fn default_filter(environment: &Environment) -> &'static str {
    if environment.is_production() {
        "info,sea_orm=warn,sqlx=warn,lettre=warn"
    } else {
        "debug,sqlx=info,lettre=info,redis=info"
    }
}

/// Install color-eyre for binaries. Safe to call more than once.
///
/// Shows error locations and hides the environment section.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Set up the global subscriber.
///
/// - `APP_ENV=production`: flattened JSON, one object per event
/// - otherwise: pretty output with module targets
///
/// Both include `tracing_error::ErrorLayer` so eyre reports carry span traces.
/// `RUST_LOG` overrides [`default_filter`]. A second call is a no-op, which
/// keeps tests that each initialize logging from failing.
pub fn init_tracing(environment: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(environment)));

    let registry = tracing_subscriber::registry()
        .with(tracing_error::ErrorLayer::default())
        .with(filter);

    let result = if environment.is_production() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
    };

    match result {
        Ok(()) => debug!(environment = ?environment, "Tracing initialized"),
        Err(_) => debug!("Tracing already initialized"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_per_environment() {
        assert!(default_filter(&Environment::Production).starts_with("info"));
        assert!(default_filter(&Environment::Development).starts_with("debug"));
        assert!(EnvFilter::try_new(default_filter(&Environment::Production)).is_ok());
        assert!(EnvFilter::try_new(default_filter(&Environment::Development)).is_ok());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(&Environment::Development);
        init_tracing(&Environment::Production);
    }

    #[test]
    fn test_init_tracing_with_rust_log_override() {
        temp_env::with_var("RUST_LOG", Some("stream_worker=trace"), || {
            init_tracing(&Environment::Production);
        });
    }

    #[test]
    fn test_install_color_eyre_twice() {
        install_color_eyre();
        install_color_eyre();
    }
}
