use super::config::{LogFormat, LogLevel};
use crate::domain::OutletError;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dependencies that are too chatty below `warn`.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls", "warp"];

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Filter directives for `level`, with the noisy dependencies capped.
///
/// `RUST_LOG`, when set, replaces the whole filter.
pub fn build_filter_string(level: LogLevel) -> String {
    let mut parts = Vec::with_capacity(QUIET_TARGETS.len() + 1);
    parts.push(level.as_str().to_string());
    parts.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    parts.join(",")
}

fn env_filter(level: LogLevel) -> Result<EnvFilter, OutletError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let filter_string = build_filter_string(level);
    EnvFilter::try_new(&filter_string).map_err(|e| {
        OutletError::Logging(format!("Failed to create EnvFilter with '{filter_string}': {e}"))
    })
}

/// Install the global subscriber. Later calls return the first result.
pub fn setup_logging(level: LogLevel, format: LogFormat) -> Result<(), OutletError> {
    INIT.get_or_init(|| install(level, format).map_err(|e| e.to_string()))
        .clone()
        .map_err(OutletError::Logging)
}

fn install(level: LogLevel, format: LogFormat) -> Result<(), OutletError> {
    let filter = env_filter(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .flatten_event(true),
            )
            .try_init(),
    };
    result.map_err(|e| OutletError::Logging(format!("Failed to set global tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_string() {
        let filter = build_filter_string(LogLevel::Debug);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("h2=warn"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_setup_logging_is_idempotent() {
        let first = setup_logging(LogLevel::Info, LogFormat::Text);
        let second = setup_logging(LogLevel::Debug, LogFormat::Json);
        assert_eq!(first.is_ok(), second.is_ok());
    }
}
