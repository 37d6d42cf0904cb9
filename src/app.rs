//! Wiring between the command line, configuration and the engine.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::TableArgs;
use crate::config::ObservatoryConfig;
use crate::diagram::DotDiagram;
use crate::error::AppError;
use crate::simulator::{Observatory, simple_state_table};
use crate::sink::JsonLinesSink;
use crate::state_machine::{
    ConditionRegistry, StateMachine, StateSpec, StateTable, TableSource, table,
};
use crate::ui::StatusDisplay;

/// Resolve the table named on the command line, falling back to the configured one.
pub fn load_table(args: &TableArgs, config: &ObservatoryConfig) -> Result<StateTable, AppError> {
    let source = match (&args.table, &args.file) {
        (_, Some(path)) => TableSource::Path(path.clone()),
        (Some(name), None) => TableSource::Name(name.clone()),
        (None, None) => TableSource::Name(config.state_table.clone()),
    };
    Ok(table::load(source, &config.root)?)
}

/// Build a machine over the simulated observatory with the configured collaborators.
pub fn build_machine(
    table: StateTable,
    unit: &Arc<Observatory>,
    config: &ObservatoryConfig,
) -> Result<StateMachine, AppError> {
    let behaviors = unit.behaviors(&table.name);
    let mut machine = StateMachine::new(table, &behaviors, unit.conditions())?;

    if let Some(path) = &config.event_log {
        match JsonLinesSink::open(path) {
            Ok(sink) => machine = machine.with_event_sink(Arc::new(sink)),
            Err(e) => warn!(error = %e, "Event log unavailable, continuing without it"),
        }
    }
    if let Some(dir) = &config.image_dir {
        machine = machine.with_diagram(Arc::new(DotDiagram::new(dir)));
    }
    Ok(machine)
}

/// Run `machine` to completion on a blocking thread. Ctrl-C requests a stop.
pub async fn run_machine(machine: StateMachine) -> Result<StateMachine, AppError> {
    let display = Arc::new(StatusDisplay::start(machine.name()));
    let mut machine = machine.with_status(display.clone());

    let control = machine.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current transition");
            control.stop();
        }
    });

    let machine = tokio::task::spawn_blocking(move || {
        machine.run();
        machine
    })
    .await?;
    interrupt.abort();

    display.finish(&machine);
    Ok(machine)
}

pub async fn run(
    args: &TableArgs,
    config: &ObservatoryConfig,
    unsafe_weather: bool,
) -> Result<(), AppError> {
    let table = load_table(args, config)?;
    let unit = Observatory::new(&config.simulator);
    if unsafe_weather {
        unit.set_safe(false);
    }
    let machine = build_machine(table, &unit, config)?;
    let machine = run_machine(machine).await?;
    info!(observed = unit.observed(), state = machine.state(), "Run finished");
    Ok(())
}

pub async fn demo(config: &ObservatoryConfig) -> Result<(), AppError> {
    let unit = Observatory::new(&config.simulator);
    let machine = build_machine(simple_state_table()?, &unit, config)?;
    let machine = run_machine(machine).await?;
    println!(
        "  Observed {} target(s), final state {}",
        unit.observed(),
        machine.state()
    );
    Ok(())
}

/// Conditions named by `table` that `conditions` has no implementation for.
pub fn unbound_conditions(
    table: &StateTable,
    conditions: &ConditionRegistry,
) -> Result<Vec<String>, AppError> {
    Ok(table
        .condition_names()?
        .into_iter()
        .filter(|name| !conditions.contains(name))
        .collect())
}

/// Check a table's structure. Behaviors and conditions are reported against the
/// simulator but do not make the table invalid.
pub fn validate(args: &TableArgs, config: &ObservatoryConfig) -> Result<(), AppError> {
    let table = load_table(args, config)?;
    let transitions = table.validate()?;
    let unit = Observatory::new(&config.simulator);
    let behaviors = unit.behaviors(&table.name);
    let unbound = unbound_conditions(&table, &unit.conditions())?;

    println!("Table {} is valid", table.name);
    println!("  initial: {}", table.initial);
    for state in &table.states {
        let marker = if StateSpec::resolve(&table.name, state, &behaviors).has_behavior() {
            ""
        } else {
            " (no simulated behavior)"
        };
        println!("  state {state}{marker}");
    }
    for t in transitions.iter() {
        println!(
            "  {}: {} -> {} [{}]",
            t.trigger(),
            t.source(),
            t.dest(),
            t.conditions().join(", ")
        );
    }
    for dup in transitions.duplicates() {
        println!(
            "  warning: {} -> {} declared by {} and {}; {} wins",
            dup.source,
            dup.dest,
            dup.winner,
            dup.shadowed.join(", "),
            dup.winner
        );
    }
    if !unbound.is_empty() {
        println!("  note: not simulated, `run` needs them bound: {}", unbound.join(", "));
    }
    Ok(())
}

pub fn lookup(
    args: &TableArgs,
    config: &ObservatoryConfig,
    source: &str,
    dest: &str,
) -> Result<String, AppError> {
    let transitions = load_table(args, config)?.validate()?;
    Ok(transitions.lookup(source, dest).trigger_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::simulator::SIMPLE_STATE_TABLE;
    use crate::state_machine::table::table_path;

    fn config_with_table(root: &std::path::Path) -> ObservatoryConfig {
        let path = table_path(root, "simple_state_table");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, SIMPLE_STATE_TABLE).unwrap();
        ObservatoryConfig {
            root: root.to_path_buf(),
            ..Default::default()
        }
    }

    fn no_args() -> TableArgs {
        TableArgs {
            table: None,
            file: None,
        }
    }

    #[test]
    fn lookup_resolves_named_trigger_and_parking() {
        let root = tempfile::tempdir().unwrap();
        let config = config_with_table(root.path());

        assert_eq!(
            lookup(&no_args(), &config, "ready", "scheduling").unwrap(),
            "schedule"
        );
        assert_eq!(
            lookup(&no_args(), &config, "ready", "observing").unwrap(),
            "parking"
        );
    }

    #[test]
    fn table_with_unsimulated_conditions_still_validates() {
        let root = tempfile::tempdir().unwrap();
        let config = ObservatoryConfig {
            root: root.path().to_path_buf(),
            ..Default::default()
        };
        let path = root.path().join("night.yaml");
        std::fs::write(
            &path,
            r#"
name: night
states: [ready, parking]
transitions:
  - { trigger: park, source: ready, dest: parking, conditions: [dome_closed] }
"#,
        )
        .unwrap();
        let args = TableArgs {
            table: None,
            file: Some(path),
        };

        validate(&args, &config).unwrap();
        assert_eq!(lookup(&args, &config, "ready", "parking").unwrap(), "park");

        let unit = Observatory::new(&config.simulator);
        let table = load_table(&args, &config).unwrap();
        assert_eq!(
            unbound_conditions(&table, &unit.conditions()).unwrap(),
            vec!["dome_closed"]
        );
        assert!(matches!(
            build_machine(table, &unit, &config),
            Err(AppError::StateTable(ConfigError::UnknownCondition { .. }))
        ));
    }

    #[test]
    fn malformed_table_fails_validation() {
        let root = tempfile::tempdir().unwrap();
        let config = ObservatoryConfig {
            root: root.path().to_path_buf(),
            ..Default::default()
        };
        let path = root.path().join("broken.yaml");
        std::fs::write(
            &path,
            "states: [ready]\ntransitions:\n  - { trigger: go, source: ready, dest: nowhere }\n",
        )
        .unwrap();
        let args = TableArgs {
            table: None,
            file: Some(path),
        };

        assert!(matches!(
            validate(&args, &config),
            Err(AppError::StateTable(ConfigError::UndeclaredState { .. }))
        ));
    }

    #[test]
    fn missing_table_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let config = ObservatoryConfig {
            root: root.path().to_path_buf(),
            ..Default::default()
        };
        let args = TableArgs {
            table: Some("missing".into()),
            file: None,
        };
        assert!(matches!(
            load_table(&args, &config),
            Err(AppError::StateTable(_))
        ));
    }

    #[tokio::test]
    async fn run_machine_writes_event_log_and_diagrams() {
        let root = tempfile::tempdir().unwrap();
        let mut config = config_with_table(root.path());
        config.event_log = Some(root.path().join("state.jsonl"));
        config.image_dir = Some(root.path().join("pandir"));
        config.simulator.targets = 1;

        let unit = Observatory::new(&config.simulator);
        let machine = build_machine(load_table(&no_args(), &config).unwrap(), &unit, &config).unwrap();
        let machine = run_machine(machine).await.unwrap();

        assert_eq!(machine.state(), "sleeping");
        assert_eq!(unit.observed(), 1);
        let log = std::fs::read_to_string(root.path().join("state.jsonl")).unwrap();
        assert!(log.lines().count() >= 2);
        assert!(root.path().join("pandir/images/state.dot").exists());
    }
}
