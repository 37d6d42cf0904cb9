use std::collections::HashSet;

use tracing::{debug, warn};

use super::table::RawTransition;
use crate::error::ConfigError;

/// Condition evaluated first on every transition.
pub const SAFETY_CHECK: &str = "check_safety";
/// Trigger name returned when no transition matches a (source, dest) pair.
pub const PARKING: &str = "parking";
/// Trigger invoked when the looked-up trigger is not defined on the machine.
pub const PARK: &str = "park";

/// A guarded edge between two declared states.
///
/// The condition list always starts with [`SAFETY_CHECK`] and is owned by this
/// transition alone; no two transitions share a backing list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionSpec {
    trigger: String,
    source: String,
    dest: String,
    conditions: Vec<String>,
}

impl TransitionSpec {
    pub fn new(raw: RawTransition) -> Self {
        let declared = raw.conditions.into_vec();
        let mut conditions = Vec::with_capacity(declared.len() + 1);
        conditions.push(SAFETY_CHECK.to_string());
        conditions.extend(declared.into_iter().filter(|c| c != SAFETY_CHECK));

        Self {
            trigger: raw.trigger,
            source: raw.source,
            dest: raw.dest,
            conditions,
        }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }
}

/// Result of resolving a (source, dest) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Trigger(&'a str),
    NoMatch,
}

impl<'a> Lookup<'a> {
    /// The trigger to fire, with [`PARKING`] standing in for no match.
    pub fn trigger_name(self) -> &'a str {
        match self {
            Lookup::Trigger(name) => name,
            Lookup::NoMatch => PARKING,
        }
    }
}

/// A (source, dest) pair declared by more than one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub source: String,
    pub dest: String,
    /// Trigger that wins the lookup.
    pub winner: String,
    /// Triggers shadowed by the winner, in declaration order.
    pub shadowed: Vec<String>,
}

/// Transitions in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    transitions: Vec<TransitionSpec>,
}

impl TransitionTable {
    /// Builds the table, rejecting transitions whose endpoints are not in `states`.
    pub fn build(raw: Vec<RawTransition>, states: &[String]) -> Result<Self, ConfigError> {
        let declared: HashSet<&str> = states.iter().map(String::as_str).collect();
        let mut transitions = Vec::with_capacity(raw.len());

        for transition in raw {
            for endpoint in [&transition.source, &transition.dest] {
                if !declared.contains(endpoint.as_str()) {
                    return Err(ConfigError::UndeclaredState {
                        trigger: transition.trigger.clone(),
                        state: endpoint.clone(),
                    });
                }
            }
            let spec = TransitionSpec::new(transition);
            debug!(trigger = spec.trigger(), conditions = ?spec.conditions(), "Loaded transition");
            transitions.push(spec);
        }

        let table = Self { transitions };
        for dup in table.duplicates() {
            warn!(
                source = %dup.source,
                dest = %dup.dest,
                winner = %dup.winner,
                shadowed = ?dup.shadowed,
                "Duplicate transitions for the same source and destination; first declared wins"
            );
        }
        Ok(table)
    }

    /// First-declared transition from `source` to `dest`.
    pub fn lookup(&self, source: &str, dest: &str) -> Lookup<'_> {
        debug!(source, dest, "Looking up trigger");
        self.transitions
            .iter()
            .find(|t| t.source == source && t.dest == dest)
            .map_or(Lookup::NoMatch, |t| Lookup::Trigger(&t.trigger))
    }

    pub fn duplicates(&self) -> Vec<Duplicate> {
        let mut found: Vec<Duplicate> = Vec::new();
        for t in &self.transitions {
            match found
                .iter_mut()
                .find(|d| d.source == t.source && d.dest == t.dest)
            {
                Some(dup) => dup.shadowed.push(t.trigger.clone()),
                None => found.push(Duplicate {
                    source: t.source.clone(),
                    dest: t.dest.clone(),
                    winner: t.trigger.clone(),
                    shadowed: Vec::new(),
                }),
            }
        }
        found.retain(|d| !d.shadowed.is_empty());
        found
    }

    pub fn has_trigger(&self, trigger: &str) -> bool {
        self.transitions.iter().any(|t| t.trigger == trigger)
    }

    /// Transitions `trigger` may fire from `source`, in declaration order.
    pub(crate) fn candidates<'a>(
        &'a self,
        trigger: &'a str,
        source: &'a str,
    ) -> impl Iterator<Item = &'a TransitionSpec> + 'a {
        self.transitions
            .iter()
            .filter(move |t| t.trigger == trigger && t.source == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransitionSpec> {
        self.transitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn every_transition_starts_with_safety_check() {
        let table = TransitionTable::build(
            vec![
                RawTransition::new("a", "ready", "parking"),
                RawTransition::new("b", "parking", "ready").with_conditions(&["dome_closed", "is_dark"]),
            ],
            &states(&["ready", "parking"]),
        )
        .unwrap();

        for spec in table.iter() {
            assert_eq!(spec.conditions()[0], SAFETY_CHECK);
        }
        let b = table.iter().nth(1).unwrap();
        assert_eq!(b.conditions(), ["check_safety", "dome_closed", "is_dark"]);
    }

    #[test]
    fn condition_lists_are_never_shared() {
        let raw = RawTransition::new("a", "ready", "parking");
        let mut first = TransitionSpec::new(raw.clone());
        let second = TransitionSpec::new(raw.clone());
        assert_ne!(first.conditions().as_ptr(), second.conditions().as_ptr());

        first.conditions.push("extra".into());
        assert_eq!(second.conditions(), [SAFETY_CHECK]);
        assert!(raw.conditions.into_vec().is_empty());
    }

    #[test]
    fn explicit_safety_check_is_not_repeated() {
        let spec = TransitionSpec::new(
            RawTransition::new("a", "x", "y").with_conditions(&["check_safety", "is_dark"]),
        );
        assert_eq!(spec.conditions(), ["check_safety", "is_dark"]);
    }

    #[test]
    fn undeclared_endpoint_is_config_error() {
        let err = TransitionTable::build(
            vec![RawTransition::new("slew", "ready", "slewing")],
            &states(&["ready"]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UndeclaredState { state, .. } if state == "slewing"));
    }

    #[test]
    fn duplicate_pair_resolves_to_first_declared() {
        let table = TransitionTable::build(
            vec![
                RawTransition::new("first", "a", "b"),
                RawTransition::new("second", "a", "b"),
            ],
            &states(&["a", "b"]),
        )
        .unwrap();

        for _ in 0..3 {
            assert_eq!(table.lookup("a", "b"), Lookup::Trigger("first"));
        }
        assert_eq!(
            table.duplicates(),
            vec![Duplicate {
                source: "a".into(),
                dest: "b".into(),
                winner: "first".into(),
                shadowed: vec!["second".into()],
            }]
        );
    }

    #[test]
    fn unmatched_pair_is_parking() {
        let table = TransitionTable::build(
            vec![RawTransition::new("park", "ready", "parking")],
            &states(&["ready", "parking"]),
        )
        .unwrap();

        assert_eq!(table.lookup("parking", "ready"), Lookup::NoMatch);
        assert_eq!(table.lookup("ready", "nowhere").trigger_name(), PARKING);
        assert_eq!(table.lookup("ready", "parking").trigger_name(), "park");
        assert!(table.duplicates().is_empty());
    }

    #[test]
    fn candidates_filter_by_trigger_and_source() {
        let table = TransitionTable::build(
            vec![
                RawTransition::new("park", "ready", "parking"),
                RawTransition::new("park", "slewing", "parking"),
                RawTransition::new("slew", "ready", "slewing"),
            ],
            &states(&["ready", "slewing", "parking"]),
        )
        .unwrap();

        let found: Vec<_> = table.candidates("park", "slewing").map(|t| t.dest()).collect();
        assert_eq!(found, vec!["parking"]);
        assert!(table.has_trigger("slew"));
        assert!(!table.has_trigger("parking"));
    }
}
