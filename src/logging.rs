use tracing_subscriber::EnvFilter;

#[cfg(feature = "verbose_log")]
const DEFAULT_DIRECTIVES: &str = "debug";
#[cfg(not(feature = "verbose_log"))]
const DEFAULT_DIRECTIVES: &str = "info,tower_http=info";

/// Installs the global `fmt` subscriber. `RUST_LOG` takes precedence over
/// the build default. Calling it twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
