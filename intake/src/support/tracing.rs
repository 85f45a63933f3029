//! File tracing for the engine and its driver
//!
//! Events go to a lazily created file in the temp directory. The filter is a
//! default level plus optional per-module directives, both taken from
//! [`IntakeConfig`](crate::IntakeConfig).

use std::path::PathBuf;

use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use super::LazyFileWriter;
use crate::constants::TRACE_LOG_FILE;
use crate::error::{Error, Result};

/// Default level for events not matched by a filter directive
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TracingLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<TracingLevel> for LevelFilter {
    fn from(level: TracingLevel) -> Self {
        match level {
            TracingLevel::Off => Self::OFF,
            TracingLevel::Error => Self::ERROR,
            TracingLevel::Warn => Self::WARN,
            TracingLevel::Info => Self::INFO,
            TracingLevel::Debug => Self::DEBUG,
            TracingLevel::Trace => Self::TRACE,
        }
    }
}

/// Filter with `level` as the default and `directives` layered on top
pub fn build_filter(level: TracingLevel, directives: Option<&str>) -> Result<EnvFilter> {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::from(level).into());
    match directives {
        Some(directives) => builder.parse(directives).map_err(|e| {
            error_stack::Report::new(Error::Configuration(format!(
                "Invalid log filter '{directives}': {e}"
            )))
        }),
        None => Ok(builder.parse_lossy("")),
    }
}

/// Install the file subscriber
///
/// The returned `WorkerGuard` must be kept alive for logging to work. The log
/// file is only created once something is actually written.
pub fn init_file_tracing(level: TracingLevel, directives: Option<&str>) -> Result<WorkerGuard> {
    let filter = build_filter(level, directives)?;
    let (non_blocking, guard) =
        tracing_appender::non_blocking(LazyFileWriter::new(get_trace_log_path()));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    Registry::default()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Configuration(format!("Failed to initialize tracing: {e}")))?;

    tracing::debug!("Tracing to {} at {level}", get_trace_log_path().display());
    Ok(guard)
}

/// Path of the trace log file
pub fn get_trace_log_path() -> PathBuf {
    std::env::temp_dir().join(TRACE_LOG_FILE)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_level_names_are_case_insensitive() {
        assert_eq!(TracingLevel::from_str("ERROR").unwrap(), TracingLevel::Error);
        assert_eq!(TracingLevel::from_str("Debug").unwrap(), TracingLevel::Debug);
        assert!(TracingLevel::from_str("loud").is_err());
        for level in TracingLevel::iter() {
            assert_eq!(TracingLevel::from_str(level.as_ref()).unwrap(), level);
        }
    }

    #[test]
    fn test_filter_combines_level_and_directives() {
        let plain = build_filter(TracingLevel::Info, None).unwrap();
        assert_eq!(plain.max_level_hint(), Some(LevelFilter::INFO));

        let scoped =
            build_filter(TracingLevel::Warn, Some("credit_intake::reconcile=trace")).unwrap();
        assert_eq!(scoped.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_invalid_directives_are_configuration_errors() {
        let error = build_filter(TracingLevel::Warn, Some("credit_intake=loud")).unwrap_err();
        assert!(matches!(error.current_context(), Error::Configuration(_)));
    }

    #[test]
    fn test_trace_log_path_is_in_temp_dir() {
        let path = get_trace_log_path();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with(TRACE_LOG_FILE));
    }
}
