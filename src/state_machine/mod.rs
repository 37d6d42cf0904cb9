mod behavior;
mod conditions;
mod event;
mod hooks;
mod machine;
pub mod table;
mod transition;

pub use behavior::{BehaviorRegistry, FnBehavior, StateBehavior, StateSpec};
pub use conditions::{ConditionFn, ConditionRegistry};
pub use event::{EventData, MachineControl};
pub use hooks::{
    DiagramRenderer, EventRecord, EventSink, NullSink, Phase, StatusReporter, TransitionObserver,
};
pub use machine::{StateMachine, TransitionOutcome};
pub use table::{RawStateTable, RawTransition, StateTable, TableSource};
pub use transition::{Duplicate, Lookup, PARK, PARKING, SAFETY_CHECK, TransitionSpec, TransitionTable};
