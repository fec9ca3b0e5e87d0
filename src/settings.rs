use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::DEFAULT_MAX_RETRIES;

pub const DEFAULT_HISTORY_PATH: &str = "docs/dev/bench/data.js";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Path of the persisted history artifact. A `.js` extension selects the
    /// front end's `window.BENCHMARK_DATA` wrapping; anything else is plain JSON.
    pub history_path: PathBuf,

    /// Repository url stamped onto a history created on first ingestion.
    pub repo_url: String,

    /// Group label used when the ingest command does not name one.
    #[serde(default)]
    pub default_tool: Option<String>,

    /// Bound on load-merge-save retries under concurrent modification.
    #[serde(default = "Settings::default_max_retries")]
    pub max_retries: usize,
}

impl Settings {
    fn default_max_retries() -> usize {
        DEFAULT_MAX_RETRIES
    }
}

/// Assemble settings from defaults, an optional configuration file and
/// environment variables. All keys are flat, so each variable is the
/// `BENCHTRAIL` prefix plus the field name: e.g. `BENCHTRAIL_REPO_URL`
/// sets `Settings.repo_url`.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings, SettingsError> {
    let mut builder = config::Config::builder()
        .set_default("history_path", DEFAULT_HISTORY_PATH)?
        .set_default("repo_url", "")?
        .set_default("max_retries", DEFAULT_MAX_RETRIES as i64)?;

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
    }

    let settings = builder
        .add_source(config::Environment::with_prefix("benchtrail"))
        .build()?
        .try_deserialize()?;
    Ok(settings)
}
