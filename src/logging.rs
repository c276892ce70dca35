//! Console logging setup and the fatal-error sink

use std::fmt::Display;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Log level used for a given `-v` count
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a timestamped stderr logger
///
/// `RUST_LOG` overrides the level picked from `verbosity`. Colour is used
/// only when stderr is a terminal. Calling this twice is harmless.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

/// Log `err` as an error; exit the process with `exit_code` unless it is 0
pub fn error(err: &dyn Display, exit_code: i32) {
    tracing::error!("{err}");
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(1), "info");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn test_non_fatal_error_returns() {
        init(0);
        init(0);
        error(&"something went wrong", 0);
    }
}
