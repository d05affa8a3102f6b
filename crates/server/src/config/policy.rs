use std::path::PathBuf;

use serde::Deserialize;

/// Location of the remediation policy document (TOML or YAML).
///
/// Without a path the server starts with an empty catalog.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySource {
    #[serde(default)]
    pub path: Option<PathBuf>,
}
