use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};

const DEFAULT_FILTER: &str = "info,rpm_monitor=debug,rpm_core=debug";

/// Installs the global subscriber, pretty or JSON.
///
/// Records carry the thread name so lines from `rpm_task`, `hall_sim` and
/// the reporter can be told apart. `log` records emitted by `rpm-core` go
/// through the subscriber's log bridge.
pub fn init_tracing(json_output: bool) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_thread_names(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_thread_names(true))
            .try_init()
    }
}
