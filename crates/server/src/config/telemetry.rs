use serde::Deserialize;

/// Log output settings.
///
/// ```toml
/// [telemetry]
/// filter = "info,remedy_engine=debug"
/// ansi = false
/// ```
///
/// `RUST_LOG`, when set, takes precedence over `filter`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            ansi: default_ansi(),
        }
    }
}

fn default_filter() -> String {
    "info".to_owned()
}

fn default_ansi() -> bool {
    true
}
