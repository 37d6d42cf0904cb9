use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Shared run-loop flags. Clones refer to the same machine, so a supervisor
/// thread or a state behavior can request a stop or a new destination.
#[derive(Debug, Clone, Default)]
pub struct MachineControl {
    inner: Arc<ControlInner>,
}

#[derive(Debug, Default)]
struct ControlInner {
    running: AtomicBool,
    next_state: Mutex<Option<String>>,
}

impl MachineControl {
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stops the loop on its next iteration. An in-flight transition completes first.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn start(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
    }

    pub fn next_state(&self) -> Option<String> {
        self.inner.next_state.lock().clone()
    }

    /// Request a destination. Advisory: the loop parks if no transition reaches it.
    pub fn set_next_state(&self, state: impl Into<String>) {
        *self.inner.next_state.lock() = Some(state.into());
    }
}

/// What callbacks see of the transition being executed.
#[derive(Debug, Clone, Copy)]
pub struct EventData<'a> {
    /// Trigger name.
    pub event: &'a str,
    pub source: &'a str,
    pub dest: &'a str,
    pub control: &'a MachineControl,
}
