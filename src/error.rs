use std::path::PathBuf;

use thiserror::Error;

/// A malformed or unreadable state table. Fatal to machine construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Problem loading state table file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Problem parsing state table {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("State table is missing the required `{0}` key")]
    MissingKey(&'static str),

    #[error("State table declares no states")]
    NoStates,

    #[error("State `{0}` is declared more than once")]
    DuplicateState(String),

    #[error("Transition `{trigger}` references undeclared state `{state}`")]
    UndeclaredState { trigger: String, state: String },

    #[error("Initial state `{0}` is not a declared state")]
    UnknownInitial(String),

    #[error("Transition `{trigger}` requires unregistered condition `{condition}`")]
    UnknownCondition { trigger: String, condition: String },
}

/// An error raised while executing a trigger. The run loop converts these into a stop.
#[derive(Debug, Error)]
pub enum TransitionFault {
    #[error("Can't trigger `{trigger}` from state `{state}`")]
    NoTransition { trigger: String, state: String },

    #[error("Condition `{condition}` failed to evaluate: {source}")]
    Condition {
        condition: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Behavior for state `{state}` failed: {source}")]
    Behavior {
        state: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Trigger `{trigger}` panicked: {message}")]
    Panicked { trigger: String, message: String },
}

/// Top-level error for the command line application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    StateTable(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Run loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::UndeclaredState {
            trigger: "slew".into(),
            state: "nowhere".into(),
        };
        assert_eq!(
            err.to_string(),
            "Transition `slew` references undeclared state `nowhere`"
        );
        assert_eq!(
            ConfigError::MissingKey("states").to_string(),
            "State table is missing the required `states` key"
        );
    }

    #[test]
    fn fault_display() {
        let fault = TransitionFault::NoTransition {
            trigger: "park".into(),
            state: "sleeping".into(),
        };
        assert_eq!(fault.to_string(), "Can't trigger `park` from state `sleeping`");
    }
}
