//! `hier` command line entry point

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use hier_cli::logging::{init_logging, LogConfig, LogFormat};
use hier_cli::{browse, report, BrowseOptions};
use hier_core::{run_simulator, RefreshPolicy, SimulatorConfig};
use hier_model::Level;
use std::path::PathBuf;
use std::process::ExitCode;

fn level_arg(level: Level) -> Arg {
    let name = level.key();
    Arg::new(name)
        .long(name)
        .value_name("CODE")
        .help(format!("{} code to select", level.label()))
}

fn cli() -> Command {
    Command::new("hier")
        .version(hier_core::VERSION)
        .about("Project / Client / Site / Plant hierarchy browser")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .default_value("pretty")
                .value_parser(value_parser!(LogFormat))
                .global(true)
                .help("Log output format: pretty or json"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("browse")
                .about("Load a dataset, cascade the selections and print the path")
                .arg(
                    Arg::new("data")
                        .long("data")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Dataset JSON file"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .args(Level::ALL.map(level_arg))
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .action(ArgAction::SetTrue)
                        .help("Print the expanded hierarchy tree"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the randomized cascade simulator")
                .arg(
                    Arg::new("operations")
                        .long("ops")
                        .default_value("1000")
                        .value_parser(value_parser!(u64))
                        .help("Number of operations to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Operations issued concurrently"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.05")
                        .value_parser(value_parser!(f64))
                        .help("Probability a level fails during a batch"),
                )
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .action(ArgAction::SetTrue)
                        .help("Refresh back to the first items instead of keeping selections"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Summarize a dataset file")
                .arg(
                    Arg::new("data")
                        .long("data")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Dataset JSON file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn browse_options(args: &ArgMatches) -> BrowseOptions {
    BrowseOptions {
        data: args.get_one::<PathBuf>("data").cloned().unwrap_or_default(),
        config: args.get_one::<PathBuf>("config").cloned(),
        codes: Level::ALL
            .into_iter()
            .filter_map(|level| {
                args.get_one::<String>(level.key())
                    .map(|code| (level, code.clone()))
            })
            .collect(),
        tree: args.get_flag("tree"),
    }
}

fn simulator_config(args: &ArgMatches) -> SimulatorConfig {
    let defaults = SimulatorConfig::default();
    SimulatorConfig {
        seed: args.get_one::<u64>("seed").copied().unwrap_or(defaults.seed),
        total_operations: args
            .get_one::<u64>("operations")
            .copied()
            .unwrap_or(defaults.total_operations),
        batch_size: args.get_one::<usize>("batch").copied().unwrap_or(defaults.batch_size),
        failure_rate: args
            .get_one::<f64>("failure-rate")
            .copied()
            .unwrap_or(defaults.failure_rate),
        refresh_policy: if args.get_flag("reset") {
            RefreshPolicy::ResetToFirst
        } else {
            RefreshPolicy::PreserveIfPresent
        },
        stop_on_first_violation: args.get_flag("stop-on-violation"),
        ..defaults
    }
}

async fn run(matches: ArgMatches) -> anyhow::Result<ExitCode> {
    match matches.subcommand() {
        Some(("browse", args)) => {
            print!("{}", browse(&browse_options(args)).await?);
            Ok(ExitCode::SUCCESS)
        }
        Some(("simulate", args)) => {
            let config = simulator_config(args);
            println!("Running cascade simulator...");
            println!("Operations: {}", config.total_operations);
            println!("Seed: {}", config.seed);
            println!();

            let report = run_simulator(config).await;
            print!("{}", report.generate_text());
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(("report", args)) => {
            let data = args.get_one::<PathBuf>("data").cloned().unwrap_or_default();
            let report = report(&data)?;
            if args.get_flag("json") {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.generate_text());
            }
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or_default();
    let log = LogConfig::from_verbosity(matches.get_count("verbose")).with_format(format);
    if let Err(e) = init_logging(&log) {
        eprintln!("warning: logging disabled: {e}");
    }

    match run(matches).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn browse_collects_codes_per_level() {
        let matches = cli().get_matches_from([
            "hier", "browse", "--data", "d.json", "--client", "C11", "--project", "P1",
        ]);
        let (_, args) = matches.subcommand().unwrap();
        let options = browse_options(args);

        assert_eq!(options.data, PathBuf::from("d.json"));
        assert_eq!(
            options.codes,
            vec![
                (Level::Project, "P1".to_string()),
                (Level::Client, "C11".to_string())
            ]
        );
        assert!(!options.tree);
    }

    #[test]
    fn simulate_flags_map_onto_the_config() {
        let matches = cli().get_matches_from(["hier", "simulate", "--ops", "50", "--reset", "-vv"]);
        let (_, args) = matches.subcommand().unwrap();
        let config = simulator_config(args);

        assert_eq!(config.total_operations, 50);
        assert_eq!(config.refresh_policy, RefreshPolicy::ResetToFirst);
        assert_eq!(matches.get_count("verbose"), 2);
    }
}
