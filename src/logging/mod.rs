/// Logging capability handed to every component
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Prefix for all messages emitted on behalf of the bulk report flow
pub const LOG_PREFIX: &str = "TNS bulk submit: ";

/// Sink for user-visible progress and failure messages.
///
/// Components take an `Arc<dyn Logger>` at construction instead of writing to
/// a process-wide logger, so tests can capture what a call reported.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards messages to `tracing` under the `tns` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "tns", "{}{}", LOG_PREFIX, message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!(target: "tns", "{}{}", LOG_PREFIX, message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "tns", "{}{}", LOG_PREFIX, message);
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over info.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
pub use memory::{MemoryLogger, Severity};

#[cfg(test)]
mod memory {
    use super::Logger;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Severity {
        Info,
        Warning,
        Error,
    }

    /// Collects messages in memory for assertions
    #[derive(Debug, Default)]
    pub struct MemoryLogger {
        entries: Mutex<Vec<(Severity, String)>>,
    }

    impl MemoryLogger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entries(&self) -> Vec<(Severity, String)> {
            self.entries.lock().unwrap().clone()
        }

        pub fn messages(&self, severity: Severity) -> Vec<String> {
            self.entries()
                .into_iter()
                .filter(|(s, _)| *s == severity)
                .map(|(_, m)| m)
                .collect()
        }

        pub fn contains(&self, severity: Severity, needle: &str) -> bool {
            self.messages(severity).iter().any(|m| m.contains(needle))
        }

        fn push(&self, severity: Severity, message: &str) {
            self.entries
                .lock()
                .unwrap()
                .push((severity, message.to_string()));
        }
    }

    impl Logger for MemoryLogger {
        fn info(&self, message: &str) {
            self.push(Severity::Info, message);
        }

        fn warning(&self, message: &str) {
            self.push(Severity::Warning, message);
        }

        fn error(&self, message: &str) {
            self.push(Severity::Error, message);
        }
    }
}
