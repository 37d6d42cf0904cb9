//! The run loop.
//!
//! Each iteration resolves a trigger from the current and desired states and
//! executes it: before hooks, conditions (safety first), exit behavior, enter
//! dispatch, after hooks, and only then the commit of the new current state.
//! A fault leaves the current state untouched and stops the loop.
//!
//! There is no timeout around a trigger: a behavior that never returns hangs the
//! loop, and `stop()` is only observed between iterations.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{Span, debug, info, info_span, warn};
use uuid::Uuid;

use super::behavior::{BehaviorRegistry, StateSpec};
use super::conditions::ConditionRegistry;
use super::event::{EventData, MachineControl};
use super::hooks::{
    DiagramRenderer, EventRecord, EventSink, NullSink, Phase, StatusReporter, TransitionObserver,
};
use super::table::StateTable;
use super::transition::{Lookup, PARK, PARKING, TransitionSpec, TransitionTable};
use crate::error::{ConfigError, TransitionFault};

/// What a trigger did when it did not fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The machine moved to `dest`.
    Completed { dest: String },
    /// Every candidate transition had a failing condition; the state is unchanged.
    Blocked { condition: String },
}

pub struct StateMachine {
    name: String,
    states: Vec<StateSpec>,
    transitions: TransitionTable,
    conditions: ConditionRegistry,
    initial: String,
    ready: String,
    current: String,
    control: MachineControl,
    observers: Vec<Arc<dyn TransitionObserver>>,
    sink: Arc<dyn EventSink>,
    diagram: Option<Arc<dyn DiagramRenderer>>,
    status: Option<Arc<dyn StatusReporter>>,
    span: Span,
    run_id: Uuid,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("current", &self.current)
            .field("running", &self.control.is_running())
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

impl StateMachine {
    /// Build a machine from a loaded table.
    ///
    /// Fails if a state is declared twice, `initial` is not declared, a transition
    /// names an undeclared state, or any condition (including the safety check)
    /// has no registered implementation.
    pub fn new(
        table: StateTable,
        behaviors: &BehaviorRegistry,
        conditions: ConditionRegistry,
    ) -> Result<Self, ConfigError> {
        let transitions = table.validate()?;
        for spec in transitions.iter() {
            if let Some(missing) = spec.conditions().iter().find(|c| !conditions.contains(c)) {
                return Err(ConfigError::UnknownCondition {
                    trigger: spec.trigger().to_string(),
                    condition: missing.clone(),
                });
            }
        }

        let states: Vec<StateSpec> = table
            .states
            .iter()
            .map(|state| StateSpec::resolve(&table.name, state, behaviors))
            .collect();

        debug!(table = %table.name, states = states.len(), "State machine created");
        let span = info_span!("state_machine", table = %table.name);

        Ok(Self {
            current: table.initial.clone(),
            name: table.name,
            states,
            transitions,
            conditions,
            initial: table.initial,
            ready: table.ready,
            control: MachineControl::default(),
            observers: Vec::new(),
            sink: Arc::new(NullSink),
            diagram: None,
            status: None,
            span,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_diagram(mut self, diagram: Arc<dyn DiagramRenderer>) -> Self {
        self.diagram = Some(diagram);
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = Some(status);
        self
    }

    /// Log under `span` instead of the machine's own `state_machine` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &str {
        &self.current
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn states(&self) -> &[StateSpec] {
        &self.states
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// A handle for stopping the loop or steering it from elsewhere.
    pub fn control(&self) -> MachineControl {
        self.control.clone()
    }

    pub fn next_state(&self) -> Option<String> {
        self.control.next_state()
    }

    pub fn set_next_state(&self, state: impl Into<String>) {
        self.control.set_next_state(state);
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Put a stopped machine back in its initial state with a fresh run id.
    pub fn reset(&mut self) {
        self.control.stop();
        self.current = self.initial.clone();
        self.run_id = Uuid::new_v4();
    }

    /// Trigger that moves the machine toward the desired next state.
    pub fn lookup_trigger(&self) -> Lookup<'_> {
        let desired = self.control.next_state().unwrap_or_default();
        self.transitions.lookup(&self.current, &desired)
    }

    /// Drive the machine until stopped. Faults are logged and end the loop; they
    /// never reach the caller.
    pub fn run(&mut self) {
        let span = self.span.clone();
        let _enter = span.enter();

        self.control.start();
        self.control.set_next_state(self.ready.clone());
        info!(run_id = %self.run_id, state = %self.current, "State machine running");

        while self.control.is_running() {
            let desired = self.control.next_state().unwrap_or_default();
            let looked_up = self.transitions.lookup(&self.current, &desired).trigger_name();
            let trigger = if self.transitions.has_trigger(looked_up) {
                looked_up.to_string()
            } else {
                warn!(source = %self.current, dest = %desired, "No valid state given, parking");
                PARK.to_string()
            };

            info!(trigger = %trigger, "Calling trigger");
            match self.invoke(&trigger) {
                Ok(TransitionOutcome::Completed { .. }) => {}
                Ok(TransitionOutcome::Blocked { condition }) if desired == PARKING => {
                    warn!(%trigger, %condition, "Transition to parking blocked, stopping");
                    self.control.stop();
                }
                Ok(TransitionOutcome::Blocked { condition }) => {
                    warn!(%trigger, %condition, "Transition blocked, heading for parking");
                    self.control.set_next_state(PARKING);
                }
                Err(fault) => {
                    warn!(error = %fault, "Problem calling next state");
                    self.control.stop();
                }
            }
        }

        info!(state = %self.current, "State machine stopped");
    }

    /// Fire `trigger` from the current state. On success with
    /// [`TransitionOutcome::Completed`] the current state is the destination;
    /// otherwise it is unchanged.
    pub fn trigger(&mut self, trigger: &str) -> Result<TransitionOutcome, TransitionFault> {
        let outcome = self.execute(trigger)?;
        if let TransitionOutcome::Completed { dest } = &outcome {
            self.current = dest.clone();
        }
        Ok(outcome)
    }

    fn invoke(&mut self, trigger: &str) -> Result<TransitionOutcome, TransitionFault> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.trigger(trigger))) {
            Ok(result) => result,
            Err(payload) => Err(TransitionFault::Panicked {
                trigger: trigger.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    fn execute(&self, trigger: &str) -> Result<TransitionOutcome, TransitionFault> {
        let source = self.current.as_str();
        let mut candidates = self.transitions.candidates(trigger, source).peekable();
        if candidates.peek().is_none() {
            return Err(TransitionFault::NoTransition {
                trigger: trigger.to_string(),
                state: source.to_string(),
            });
        }

        let mut blocked = String::new();
        let mut announced = false;
        for spec in candidates {
            let event = EventData {
                event: trigger,
                source,
                dest: spec.dest(),
                control: &self.control,
            };
            if !announced {
                self.before_state(&event);
                announced = true;
            }

            if let Some(failed) = self.check_conditions(spec, &event)? {
                debug!(trigger, condition = %failed, "Condition not met");
                blocked = failed;
                continue;
            }

            self.exit_state(source, &event)?;
            self.enter_state(spec.dest(), &event)?;
            self.after_state(&event);
            return Ok(TransitionOutcome::Completed {
                dest: spec.dest().to_string(),
            });
        }

        Ok(TransitionOutcome::Blocked { condition: blocked })
    }

    /// Name of the first failing condition, if any.
    fn check_conditions(
        &self,
        spec: &TransitionSpec,
        event: &EventData<'_>,
    ) -> Result<Option<String>, TransitionFault> {
        for name in spec.conditions() {
            let check = self.conditions.get(name).ok_or_else(|| TransitionFault::Condition {
                condition: name.clone(),
                source: anyhow::anyhow!("condition is not registered"),
            })?;
            let passed = check(event).map_err(|source| TransitionFault::Condition {
                condition: name.clone(),
                source,
            })?;
            if !passed {
                return Ok(Some(name.clone()));
            }
        }
        Ok(None)
    }

    fn spec(&self, state: &str) -> Option<&StateSpec> {
        self.states.iter().find(|s| s.name() == state)
    }

    fn exit_state(&self, state: &str, event: &EventData<'_>) -> Result<(), TransitionFault> {
        if let Some(behavior) = self.spec(state).and_then(StateSpec::behavior) {
            behavior.on_exit(event).map_err(|source| TransitionFault::Behavior {
                state: state.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Diagram, then status, then the state's own behavior. Only the last can fault.
    fn enter_state(&self, state: &str, event: &EventData<'_>) -> Result<(), TransitionFault> {
        if let Some(diagram) = &self.diagram {
            best_effort("Can't generate state graph", || {
                diagram.render(&self.transitions, event.event, state)
            });
        }
        if let Some(status) = &self.status {
            best_effort("Status refresh failed", || status.status(state));
        }
        if let Some(behavior) = self.spec(state).and_then(StateSpec::behavior) {
            debug!(state, "Calling on_enter");
            behavior.on_enter(event).map_err(|source| TransitionFault::Behavior {
                state: state.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    fn before_state(&self, event: &EventData<'_>) {
        debug!("Before calling {} from {} state", event.event, event.source);
        self.notify(Phase::Before, event);
    }

    fn after_state(&self, event: &EventData<'_>) {
        debug!("After calling {}. Now in {} state", event.event, event.dest);
        self.notify(Phase::After, event);
    }

    fn notify(&self, phase: Phase, event: &EventData<'_>) {
        let record = EventRecord::new(self.run_id, phase, event);
        best_effort("Failed to record state event", || self.sink.record(&record));
        for observer in &self.observers {
            best_effort("Transition observer failed", || match phase {
                Phase::Before => observer.before_state(event),
                Phase::After => observer.after_state(event),
            });
        }
    }
}

/// Runs an observability hook; errors and panics are logged, never propagated.
fn best_effort(what: &str, hook: impl FnOnce() -> anyhow::Result<()>) {
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "{what}"),
        Err(payload) => warn!(panic = %panic_message(payload.as_ref()), "{what}"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
