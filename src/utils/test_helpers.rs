//! Shared setup for unit and integration tests.

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Routes `tracing` output through the test harness writer.
///
/// Safe to call from every test; only the first call installs the subscriber.
/// `RUST_LOG` selects the level, e.g. `RUST_LOG=filesift=debug`.
pub fn setup_test_logging() {
    // In the lib's own unit tests, `#[traced_test]` must own the global
    // dispatcher; it panics if one was installed first.
    if cfg!(test) {
        return;
    }
    LOGGING.call_once(|| {
        // Another subscriber may already be installed by tracing-test.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Whether the tests run with an effective UID of 0.
///
/// Root ignores file permissions, so tests that depend on an unreadable
/// entry skip themselves when this is true.
#[cfg(any(test, doctest))]
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
