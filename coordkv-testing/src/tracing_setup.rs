use std::sync::Once;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt};

const ENV_DEBUG: &str = "COORDKV_DEBUG";

static REGISTER: Once = Once::new();

/// Install a tracing subscriber that writes through the test harness' captured output.
///
/// `RUST_LOG` can be used to set the log level; the default is `info`, or `debug` when
/// `COORDKV_DEBUG=true`. Safe to call from every test, only the first call has an
/// effect, and it gives way if the process already installed a global subscriber.
pub fn register() {
    REGISTER.call_once(|| {
        let debug_mode = std::env::var(ENV_DEBUG).is_ok_and(|v| v.eq_ignore_ascii_case("true"));
        let _ = init(debug_mode);
    });
}

fn init(debug_mode: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_log_level = if debug_mode { "debug" } else { "info" };

    let filter = EnvFilter::builder()
        .with_default_directive(default_log_level.parse().unwrap_or(Level::INFO.into()))
        .from_env_lossy(); // Read RUST_LOG environment variable

    let layer = fmt::layer()
        .with_test_writer()
        .with_target(true)
        .boxed();

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
}
