use clap::Parser;
use observatory_fsm::app;
use observatory_fsm::cli::{Cli, Command};
use observatory_fsm::config::ObservatoryConfig;
use observatory_fsm::logging::init_log;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match ObservatoryConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    if let Some(targets) = cli.targets {
        config.simulator.targets = targets;
    }
    init_log(&config.log_level, cli.verbose);

    let result = match cli.command {
        Command::Run {
            table,
            unsafe_weather,
        } => app::run(&table, &config, unsafe_weather).await,
        Command::Validate { table } => app::validate(&table, &config),
        Command::Lookup {
            table,
            source,
            dest,
        } => app::lookup(&table, &config, &source, &dest).map(|trigger| println!("{trigger}")),
        Command::Demo => app::demo(&config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
