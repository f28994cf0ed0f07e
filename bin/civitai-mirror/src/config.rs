//! Logging configuration, loaded from environment variables at startup.

/// Runtime configuration that is not part of the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// `tracing` filter string, e.g. `"info"` or `"debug,reqwest=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("MIRROR_LOG", "info"),
            log_json: std::env::var("MIRROR_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
