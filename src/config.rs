//! Settings loaded from `observatory.toml`.
//!
//! Missing keys fall back to defaults. The `POCS` and `PANDIR` environment
//! variables take precedence over the file for the resource and image roots.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::diagram::IMAGE_ROOT_ENV;
use crate::error::AppError;
use crate::state_machine::table::{DEFAULT_ROOT, ROOT_ENV};

pub const CONFIG_FILE: &str = "observatory.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObservatoryConfig {
    /// Root holding `resources/state_table/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Table run when none is given on the command line.
    #[serde(default = "default_state_table")]
    pub state_table: String,

    /// Where to append transition events; none disables the log.
    #[serde(default)]
    pub event_log: Option<PathBuf>,

    /// Root for state diagrams; none disables them.
    #[serde(default)]
    pub image_dir: Option<PathBuf>,

    /// Default tracing filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Knobs for the built-in simulated observatory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    /// Targets observed before the night ends.
    #[serde(default = "default_targets")]
    pub targets: u32,

    /// Answer of the simulated weather station.
    #[serde(default = "default_safe")]
    pub safe: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_state_table() -> String {
    "simple_state_table".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_targets() -> u32 {
    3
}

fn default_safe() -> bool {
    true
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            safe: default_safe(),
        }
    }
}

impl Default for ObservatoryConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            state_table: default_state_table(),
            event_log: None,
            image_dir: None,
            log_level: default_log_level(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl ObservatoryConfig {
    /// Load from `path`, or `observatory.toml` in the working directory.
    /// Uses defaults if the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ObservatoryConfig>(&contents)?
        } else if explicit {
            return Err(AppError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        } else {
            Self::default()
        };

        if let Ok(root) = std::env::var(ROOT_ENV)
            && !root.is_empty()
        {
            config.root = PathBuf::from(root);
        }
        if let Ok(dir) = std::env::var(IMAGE_ROOT_ENV)
            && !dir.is_empty()
        {
            config.image_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}
