//! A simulated observatory for exercising state tables without hardware.
//!
//! Each state's behavior logs what the real device would do and picks the
//! next desired state, walking a night of observing:
//! `ready → scheduling → slewing → tracking → observing → analyzing → scheduling …`
//! until the target list is exhausted, then `parking → parked → housekeeping → sleeping`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::info;

use crate::config::SimulatorConfig;
use crate::state_machine::{BehaviorRegistry, ConditionRegistry, EventData, StateTable};

/// The state table the simulator is written against.
pub const SIMPLE_STATE_TABLE: &str = include_str!("../resources/state_table/simple_state_table.yaml");

pub fn simple_state_table() -> Result<StateTable, crate::error::ConfigError> {
    StateTable::from_yaml(SIMPLE_STATE_TABLE, "simple_state_table.yaml")
}

#[derive(Debug)]
pub struct Observatory {
    targets: u32,
    observed: AtomicU32,
    safe: AtomicBool,
}

impl Observatory {
    pub fn new(config: &SimulatorConfig) -> Arc<Self> {
        Arc::new(Self {
            targets: config.targets,
            observed: AtomicU32::new(0),
            safe: AtomicBool::new(config.safe),
        })
    }

    pub fn observed(&self) -> u32 {
        self.observed.load(Ordering::SeqCst)
    }

    /// Flip the simulated weather station.
    pub fn set_safe(&self, safe: bool) {
        self.safe.store(safe, Ordering::SeqCst);
    }

    /// `check_safety` reads the weather station; `is_dark` is always true at night.
    pub fn conditions(self: &Arc<Self>) -> ConditionRegistry {
        let unit = Arc::clone(self);
        let mut conditions = ConditionRegistry::with_safety(move |event| {
            let safe = unit.safe.load(Ordering::SeqCst);
            if !safe {
                info!(trigger = event.event, "Weather unsafe");
            }
            Ok(safe)
        });
        conditions.register("is_dark", |_| Ok(true));
        conditions
    }

    /// Behaviors for every state of the simple table, registered under `namespace`.
    pub fn behaviors(self: &Arc<Self>, namespace: &str) -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();

        registry.register_fn(namespace, "ready", |event| {
            info!("Unit is ready, checking for targets");
            goto(event, "scheduling");
            Ok(())
        });

        let unit = Arc::clone(self);
        registry.register_fn(namespace, "scheduling", move |event| {
            let observed = unit.observed();
            if observed < unit.targets {
                info!(next = observed + 1, of = unit.targets, "Target selected");
                goto(event, "slewing");
            } else {
                info!("No more targets, parking");
                goto(event, "parking");
            }
            Ok(())
        });

        registry.register_fn(namespace, "slewing", |event| {
            info!("Slewing to target");
            goto(event, "tracking");
            Ok(())
        });

        registry.register_fn(namespace, "tracking", |event| {
            info!("Adjusting tracking");
            goto(event, "observing");
            Ok(())
        });

        let unit = Arc::clone(self);
        registry.register_fn(namespace, "observing", move |event| {
            let count = unit.observed.fetch_add(1, Ordering::SeqCst) + 1;
            info!(count, "Exposure complete");
            goto(event, "analyzing");
            Ok(())
        });

        registry.register_fn(namespace, "analyzing", |event| {
            info!("Analyzing exposure");
            goto(event, "scheduling");
            Ok(())
        });

        registry.register_fn(namespace, "parking", |event| {
            info!("Closing dome and parking mount");
            goto(event, "parked");
            Ok(())
        });

        registry.register_fn(namespace, "parked", |event| {
            goto(event, "housekeeping");
            Ok(())
        });

        registry.register_fn(namespace, "housekeeping", |event| {
            info!("Cleaning up after the night");
            goto(event, "sleeping");
            Ok(())
        });

        registry.register_fn(namespace, "sleeping", |event| {
            info!("Night finished, stopping");
            event.control.stop();
            Ok(())
        });

        registry
    }
}

fn goto(event: &EventData<'_>, state: &str) {
    event.control.set_next_state(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{SAFETY_CHECK, StateMachine};

    fn machine(unit: &Arc<Observatory>) -> StateMachine {
        let table = simple_state_table().unwrap();
        let behaviors = unit.behaviors(&table.name);
        StateMachine::new(table, &behaviors, unit.conditions()).unwrap()
    }

    #[test]
    fn embedded_table_is_valid() {
        let table = simple_state_table().unwrap();
        assert_eq!(table.name, "simple_state_table");
        assert_eq!(table.initial, "sleeping");
        let unit = Observatory::new(&SimulatorConfig::default());
        let machine = machine(&unit);
        assert!(machine.states().iter().all(|s| s.has_behavior()));
        assert!(machine.transitions().duplicates().is_empty());
    }

    #[test]
    fn night_observes_every_target_and_sleeps() {
        let unit = Observatory::new(&SimulatorConfig {
            targets: 2,
            safe: true,
        });
        let mut machine = machine(&unit);

        machine.run();

        assert_eq!(unit.observed(), 2);
        assert_eq!(machine.state(), "sleeping");
        assert!(!machine.is_running());
    }

    #[test]
    fn unsafe_weather_never_leaves_sleeping() {
        let unit = Observatory::new(&SimulatorConfig {
            targets: 2,
            safe: false,
        });
        let mut machine = machine(&unit);

        machine.run();

        assert_eq!(unit.observed(), 0);
        assert_eq!(machine.state(), "sleeping");
        assert!(!machine.is_running());
    }

    #[test]
    fn weather_can_turn_mid_night() {
        let unit = Observatory::new(&SimulatorConfig::default());
        let conditions = unit.conditions();
        let check = conditions.get(SAFETY_CHECK).unwrap();
        let control = crate::state_machine::MachineControl::default();
        let event = EventData {
            event: "get_ready",
            source: "sleeping",
            dest: "ready",
            control: &control,
        };

        assert!(check(&event).unwrap());
        unit.set_safe(false);
        assert!(!check(&event).unwrap());
    }

    #[test]
    fn safety_check_is_registered() {
        let unit = Observatory::new(&SimulatorConfig::default());
        assert!(unit.conditions().contains(SAFETY_CHECK));
    }
}
