//! Process-wide logging installation.

use ant_config::{LogFormat, LogSettings};
use ant_runtime::telemetry::{self, TelemetryError};

#[test]
fn first_installation_wins() {
    let rejected = LogSettings::new("ant_runtime=loudest", LogFormat::Json);
    assert!(matches!(
        telemetry::initialise(&rejected),
        Err(TelemetryError::Filter { .. })
    ));
    assert!(telemetry::installed().is_none());

    let first = LogSettings::new("ant_runtime=debug", LogFormat::Json);
    let active = telemetry::initialise(&first).expect("first installation succeeds");
    assert_eq!(active, &first);

    let later = LogSettings::new("trace", LogFormat::Compact);
    let reported = telemetry::initialise(&later).expect("later call reports the installed settings");
    assert_eq!(reported, &first);
    assert_eq!(telemetry::installed(), Some(&first));
}
