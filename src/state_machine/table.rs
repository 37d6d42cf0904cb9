//! Loading of declarative state tables.
//!
//! A table is a YAML document with the required keys `states` and
//! `transitions`, plus optional `name`, `initial` and `ready`:
//!
//! ```yaml
//! name: simple_state_table
//! initial: sleeping
//! states: [sleeping, ready, parking]
//! transitions:
//!   - { trigger: get_ready, source: sleeping, dest: ready }
//!   - { trigger: park, source: ready, dest: parking, conditions: [dome_closed] }
//! ```
//!
//! Parsing only checks that the required keys are present.
//! [`StateTable::validate`] does the structural checks and builds the
//! [`TransitionTable`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::transition::TransitionTable;
use crate::error::ConfigError;

/// Environment variable naming the root of the resource tree.
pub const ROOT_ENV: &str = "POCS";
/// Root used when [`ROOT_ENV`] is unset.
pub const DEFAULT_ROOT: &str = "/var/panoptes/POCS";
/// Desired state the run loop starts out requesting.
pub const DEFAULT_READY: &str = "ready";

/// Either a single condition name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Conditions {
    One(String),
    Many(Vec<String>),
}

impl Default for Conditions {
    fn default() -> Self {
        Conditions::Many(Vec::new())
    }
}

impl Conditions {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Conditions::One(name) => vec![name],
            Conditions::Many(names) => names,
        }
    }
}

/// One transition as written in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransition {
    pub trigger: String,
    pub source: String,
    pub dest: String,
    #[serde(default)]
    pub conditions: Conditions,
}

impl RawTransition {
    pub fn new(trigger: &str, source: &str, dest: &str) -> Self {
        Self {
            trigger: trigger.to_string(),
            source: source.to_string(),
            dest: dest.to_string(),
            conditions: Conditions::default(),
        }
    }

    pub fn with_conditions(mut self, conditions: &[&str]) -> Self {
        self.conditions = Conditions::Many(conditions.iter().map(|c| c.to_string()).collect());
        self
    }
}

/// A table as parsed, before the required keys are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStateTable {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub states: Option<Vec<String>>,
    #[serde(default)]
    pub transitions: Option<Vec<RawTransition>>,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub ready: Option<String>,
}

/// A loaded table with all required keys present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTable {
    pub name: String,
    pub states: Vec<String>,
    pub transitions: Vec<RawTransition>,
    pub initial: String,
    pub ready: String,
}

impl TryFrom<RawStateTable> for StateTable {
    type Error = ConfigError;

    fn try_from(raw: RawStateTable) -> Result<Self, Self::Error> {
        let states = raw.states.ok_or(ConfigError::MissingKey("states"))?;
        let transitions = raw.transitions.ok_or(ConfigError::MissingKey("transitions"))?;
        let initial = match raw.initial {
            Some(initial) => initial,
            None => states.first().cloned().ok_or(ConfigError::NoStates)?,
        };

        Ok(Self {
            name: raw.name.unwrap_or_else(|| "default".to_string()),
            states,
            transitions,
            initial,
            ready: raw.ready.unwrap_or_else(|| DEFAULT_READY.to_string()),
        })
    }
}

impl StateTable {
    /// Parse a table from YAML (or JSON) text.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: RawStateTable = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        Self::try_from(raw)
    }

    /// Structural checks that need no behaviors or condition implementations:
    /// states are unique, `initial` is declared, and every transition endpoint
    /// is a declared state.
    pub fn validate(&self) -> Result<TransitionTable, ConfigError> {
        if self.states.is_empty() {
            return Err(ConfigError::NoStates);
        }
        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(state.as_str()) {
                return Err(ConfigError::DuplicateState(state.clone()));
            }
        }
        if !seen.contains(self.initial.as_str()) {
            return Err(ConfigError::UnknownInitial(self.initial.clone()));
        }
        TransitionTable::build(self.transitions.clone(), &self.states)
    }

    /// Every condition named by a transition, `check_safety` first, without repeats.
    pub fn condition_names(&self) -> Result<Vec<String>, ConfigError> {
        let mut names: Vec<String> = Vec::new();
        for spec in self.validate()?.iter() {
            for condition in spec.conditions() {
                if !names.contains(condition) {
                    names.push(condition.clone());
                }
            }
        }
        Ok(names)
    }
}

/// Where a table comes from.
#[derive(Debug, Clone)]
pub enum TableSource {
    /// A name resolved under `<root>/resources/state_table/`.
    Name(String),
    /// An explicit file.
    Path(PathBuf),
    /// An already-parsed table.
    Inline(RawStateTable),
}

impl From<&str> for TableSource {
    fn from(name: &str) -> Self {
        TableSource::Name(name.to_string())
    }
}

impl From<RawStateTable> for TableSource {
    fn from(raw: RawStateTable) -> Self {
        TableSource::Inline(raw)
    }
}

/// Root of the resource tree, from the environment or the default.
pub fn default_root() -> PathBuf {
    std::env::var(ROOT_ENV)
        .ok()
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
}

/// File a named table resolves to.
pub fn table_path(root: &Path, name: &str) -> PathBuf {
    root.join("resources")
        .join("state_table")
        .join(format!("{name}.yaml"))
}

/// Load a state table. Any failure is fatal to construction.
pub fn load(source: impl Into<TableSource>, root: &Path) -> Result<StateTable, ConfigError> {
    match source.into() {
        TableSource::Name(name) => {
            info!(table = %name, "Loading state table");
            load_file(&table_path(root, &name))
        }
        TableSource::Path(path) => load_file(&path),
        TableSource::Inline(raw) => StateTable::try_from(raw),
    }
}

fn load_file(path: &Path) -> Result<StateTable, ConfigError> {
    debug!(path = %path.display(), "Reading state table file");
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    StateTable::from_yaml(&text, &path.display().to_string())
}
