//! Tracing subscriber setup
use tracing_subscriber::{fmt, EnvFilter};

/// Env var consulted for the log filter (same syntax as `RUST_LOG`)
pub const LOG_ENV: &str = "CFLOW_LOG";

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_tracing("info", false);
        assert!(!init_tracing("debug", true));
    }
}
