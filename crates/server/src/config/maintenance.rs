use serde::Deserialize;

/// Periodic sweep of expired dedup entries, settled approvals, and finished
/// requests.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Seconds between sweeps. `0` disables the sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// How long settled approvals and terminal requests stay queryable.
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
            retention_seconds: default_retention(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_retention() -> u64 {
    86_400
}
