//! Declarative state machine engine for sequencing a robotic observatory.
//!
//! A [`StateTable`](state_machine::StateTable) names the states and the
//! transitions between them. [`StateMachine`](state_machine::StateMachine)
//! binds each state to the behavior registered for it, prepends the mandatory
//! `check_safety` condition to every transition, and runs a loop that resolves
//! the next trigger from the current and desired states. Anything that goes
//! wrong inside a transition stops the loop and leaves the machine inspectable.
//!
//! ```no_run
//! use observatory_fsm::state_machine::{
//!     BehaviorRegistry, ConditionRegistry, StateMachine, StateTable,
//! };
//!
//! let table = StateTable::from_yaml(
//!     "states: [ready, parking]\n\
//!      transitions: [{trigger: park, source: ready, dest: parking}]\n",
//!     "inline",
//! )?;
//! let mut behaviors = BehaviorRegistry::new();
//! behaviors.register_fn("default", "parking", |event| {
//!     event.control.stop();
//!     Ok(())
//! });
//! let mut machine = StateMachine::new(table, &behaviors, ConditionRegistry::with_safety(|_| Ok(true)))?;
//! machine.run();
//! assert_eq!(machine.state(), "parking");
//! # Ok::<(), observatory_fsm::error::ConfigError>(())
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod diagram;
pub mod error;
pub mod logging;
pub mod simulator;
pub mod sink;
pub mod state_machine;
pub mod ui;
