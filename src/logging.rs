// Logging setup for the `bl` binary. Logs go to stderr so command output
// on stdout stays machine readable.

use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LEVEL: &str = "warn";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl LoggingConfig {
    pub fn new(level: Option<&str>, json: bool) -> Self {
        LoggingConfig {
            level: level.unwrap_or(DEFAULT_LEVEL).to_string(),
            json,
        }
    }

    /// Install the global subscriber. Later calls are ignored.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
        let _ = if self.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig::new(None, false)
    }
}
