//! Structured logging for the coordinator.
//!
//! [`subscriber`] turns resolved [`LogSettings`] into a tracing subscriber
//! writing to stderr. [`initialise`] installs one process-wide and
//! remembers the settings it was installed with, so embedders calling it
//! from several entry points agree on a single configuration.

use std::io::{self, IsTerminal};

use ant_config::{LogFormat, LogSettings};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Boxed subscriber built from [`LogSettings`].
pub type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

static INSTALLED: OnceCell<LogSettings> = OnceCell::new();

/// Errors encountered while building or installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The log filter expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Builds a stderr subscriber honouring the filter and format in `settings`.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the filter does not parse.
pub fn subscriber(settings: &LogSettings) -> Result<BoxedSubscriber, TelemetryError> {
    let filter = EnvFilter::try_new(settings.filter()).map_err(|error| TelemetryError::Filter {
        filter: settings.filter().to_owned(),
        message: error.to_string(),
    })?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match settings.format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}

/// Installs the global subscriber once and returns the settings in force.
///
/// The first successful call wins. Later calls return the settings it
/// installed without parsing their own. A failed call installs nothing and
/// leaves the next call free to try again.
///
/// # Examples
///
/// ```rust
/// use ant_config::{LogFormat, LogSettings};
/// use ant_runtime::telemetry;
///
/// # fn main() -> Result<(), ant_runtime::telemetry::TelemetryError> {
/// let first = LogSettings::new("ant_runtime=debug", LogFormat::Json);
/// let active = telemetry::initialise(&first)?;
/// assert_eq!(active, &first);
///
/// let later = LogSettings::default();
/// assert_eq!(telemetry::initialise(&later)?, &first);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Subscriber`] when some other subscriber got there first.
pub fn initialise(settings: &LogSettings) -> Result<&'static LogSettings, TelemetryError> {
    INSTALLED.get_or_try_init(|| {
        tracing::subscriber::set_global_default(subscriber(settings)?)?;
        Ok(settings.clone())
    })
}

/// Settings installed by [`initialise`], if it has succeeded.
#[must_use]
pub fn installed() -> Option<&'static LogSettings> {
    INSTALLED.get()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tracing::Level;

    use super::*;

    #[test]
    fn rejects_unparsable_filter() {
        let settings = LogSettings::new("ant_runtime=loudest", LogFormat::Compact);
        let Err(error) = subscriber(&settings) else {
            panic!("filter should not parse");
        };
        assert!(matches!(
            &error,
            TelemetryError::Filter { filter, .. } if filter == "ant_runtime=loudest"
        ));
    }

    #[rstest]
    #[case::compact(LogFormat::Compact)]
    #[case::json(LogFormat::Json)]
    fn filter_decides_enabled_targets(#[case] format: LogFormat) {
        let settings = LogSettings::new("warn,ant_runtime::process=debug", format);
        let built = subscriber(&settings).expect("subscriber builds");
        let (process_debug, other_debug, other_warn) =
            tracing::subscriber::with_default(built, || {
                (
                    tracing::enabled!(target: "ant_runtime::process", Level::DEBUG),
                    tracing::enabled!(target: "ant_runtime::plugin", Level::DEBUG),
                    tracing::enabled!(target: "ant_runtime::plugin", Level::WARN),
                )
            });
        assert!(process_debug);
        assert!(!other_debug);
        assert!(other_warn);
    }
}
