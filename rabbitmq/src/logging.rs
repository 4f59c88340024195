//! Tracing setup for the provider process

use tracing::Level;

pub const LOG_LEVEL_ENV: &str = "TF_LOG";

/// Maps a `TF_LOG` value onto a tracing level, defaulting to INFO
pub fn level_from_env_value(value: Option<&str>) -> Level {
    match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
        Some("TRACE") => Level::TRACE,
        Some("DEBUG") => Level::DEBUG,
        Some("WARN") => Level::WARN,
        Some("ERROR") => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Installs a stderr fmt subscriber. Stdout belongs to the plugin handshake.
/// Calling this more than once is harmless.
pub fn init_tracing() {
    let level = level_from_env_value(std::env::var(LOG_LEVEL_ENV).ok().as_deref());

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(level_from_env_value(Some("debug")), Level::DEBUG);
        assert_eq!(level_from_env_value(Some("TRACE")), Level::TRACE);
        assert_eq!(level_from_env_value(Some(" warn ")), Level::WARN);
        assert_eq!(level_from_env_value(Some("Error")), Level::ERROR);
    }

    #[test]
    fn unknown_or_missing_level_defaults_to_info() {
        assert_eq!(level_from_env_value(None), Level::INFO);
        assert_eq!(level_from_env_value(Some("verbose")), Level::INFO);
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
