//! Logging setup

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level for a base level raised by `-v` flags
pub fn level_for_verbosity(base: &str, verbose: u8) -> &str {
    match verbose {
        0 => base,
        1 => "debug",
        _ => "trace",
    }
}

/// Setup logging with the specified level; `RUST_LOG` takes precedence
pub fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init()
        .ok();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity("warn", 0), "warn");
        assert_eq!(level_for_verbosity("warn", 1), "debug");
        assert_eq!(level_for_verbosity("info", 3), "trace");
    }

    #[test]
    fn test_setup_logging_twice_is_harmless() {
        assert!(setup_logging("info").is_ok());
        assert!(setup_logging("debug").is_ok());
    }
}
