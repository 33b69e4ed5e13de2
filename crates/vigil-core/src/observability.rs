//! Logging setup.
//!
//! The library only emits `tracing` events; binaries call [`init_logging`]
//! once at startup. `RUST_LOG` wins over the default directive.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a global fmt subscriber writing to stderr.
///
/// Safe to call more than once; only the first call installs anything, and an
/// already-installed global subscriber is left in place.
pub fn init_logging(default_directive: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter),
        );

        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}

#[cfg(test)]
pub(crate) mod capture {
    //! Thread-local log capture for asserting on emitted events.

    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::subscriber::DefaultGuard;

    #[derive(Clone, Default)]
    pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Lines at the given level (`"WARN"`, `"ERROR"`, ...).
        pub(crate) fn lines_at(&self, level: &str) -> Vec<String> {
            self.contents()
                .lines()
                .filter(|line| line.contains(level))
                .map(str::to_owned)
                .collect()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Capture everything logged on the current thread while the guard lives.
    ///
    /// Works with `#[tokio::test]` because the current-thread runtime polls
    /// spawned tasks (including watchdog timers) on the test thread.
    pub(crate) fn capture_logs() -> (LogBuffer, DefaultGuard) {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer({
                let buffer = buffer.clone();
                move || buffer.clone()
            })
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (buffer, guard)
    }
}
