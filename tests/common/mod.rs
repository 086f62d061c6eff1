use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs a trace-level subscriber writing to the test output. Safe to call
/// from every test; only the first call does anything.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_thread_names(true)
            .with_ansi(false)
            .try_init();
    });
}
