//! `tracing` subscriber setup.
//!
//! The bridge itself only emits events through the `tracing` macros. A
//! binary or training script calls [`init`] once to see them.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Environment variable holding the filter directive.
///
/// Takes precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "SIMBRIDGE_LOG";

/// Directive used when neither [`LOG_ENV`] nor `RUST_LOG` is set.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install a global fmt subscriber filtered by [`LOG_ENV`], then
/// `RUST_LOG`, then [`DEFAULT_DIRECTIVE`].
///
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<(), TryInitError> {
    init_with_default(DEFAULT_DIRECTIVE)
}

/// Like [`init`] with a caller-chosen fallback directive.
pub fn init_with_default(default: &str) -> Result<(), TryInitError> {
    let filter = filter_from(std::env::var(LOG_ENV).ok(), default);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .try_init()?;
    tracing::debug!(filter_env = LOG_ENV, "tracing initialised");
    Ok(())
}

/// Build the filter from an explicit directive, falling back to
/// `RUST_LOG` and then `default`. An unparsable directive falls back the
/// same way.
fn filter_from(directive: Option<String>, default: &str) -> EnvFilter {
    match directive.map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        Some(Err(err)) => {
            eprintln!("invalid {LOG_ENV} directive ({err}); using {default}");
            EnvFilter::new(default)
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directive_is_used() {
        let f = filter_from(Some("simbridge_engine=trace".into()), "warn");
        assert!(f.to_string().contains("simbridge_engine=trace"));
    }

    #[test]
    fn invalid_directive_falls_back_to_default() {
        let f = filter_from(Some("simbridge=loud".into()), "warn");
        assert!(f.to_string().contains("warn"));
        assert!(!f.to_string().contains("loud"));
    }

    #[test]
    fn second_init_fails() {
        // The first call may race other tests; either way a second
        // install must be refused.
        let _ = init_with_default("off");
        assert!(init_with_default("off").is_err());
    }
}
