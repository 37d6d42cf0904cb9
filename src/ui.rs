//! Terminal status display for a running machine.
//!
//! Uses `indicatif` for the spinner and `console` for colour. The
//! [`StatusDisplay`] is plugged into the machine as its status reporter.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{StatusReporter, StateMachine};

/// Spinner showing the state the machine just entered.
pub struct StatusDisplay {
    pb: ProgressBar,
    green: Style,
    red: Style,
    cyan: Style,
}

impl StatusDisplay {
    pub fn start(table: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Loading {table}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            cyan: Style::new().cyan(),
        }
    }

    /// Clears the spinner and prints where the machine ended up.
    pub fn finish(&self, machine: &StateMachine) {
        self.pb.finish_and_clear();
        let state = machine.state();
        if machine.is_running() {
            println!("  {} Machine still running in {state}", self.red.apply_to("✗"));
        } else {
            println!(
                "  {} Machine stopped in {}",
                self.green.apply_to("✓"),
                self.cyan.apply_to(state)
            );
        }
    }
}

impl StatusReporter for StatusDisplay {
    fn status(&self, state: &str) -> anyhow::Result<()> {
        self.pb.println(format!("  {} {state}", self.cyan.apply_to("→")));
        self.pb.set_message(state.to_uppercase());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_updates_message() {
        let display = StatusDisplay::start("simple_state_table");
        display.status("parking").unwrap();
        assert_eq!(display.pb.message(), "PARKING");
        display.pb.finish_and_clear();
    }
}
