/// stderr logging via `tracing`.
///
/// Verbosity follows `RUST_LOG` (e.g. `RUST_LOG=router=debug,sink=trace`) and
/// defaults to `info`. Each module logs under a short target (`monitor`,
/// `router`, `sink`, `shutdown`, ...) so filters can single out one component.
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();

    if let Err(e) = result {
        eprintln!("[logging] Subscriber already installed: {e}");
    }
}
