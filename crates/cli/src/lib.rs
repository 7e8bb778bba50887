pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::calc::CalcArgs;

#[derive(Debug, Parser)]
#[command(
    name = "merchhours",
    about = "Merchhours operator CLI",
    long_about = "Operate merchhours readiness, migrations, demo data, config inspection and one-shot calculations.",
    after_help = "Examples:\n  merchhours doctor --json\n  merchhours suppliers\n  merchhours calc --supplier 1064 --year 2025 --month 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the idempotent May 2025 demo dataset and verify it")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token readiness, DB connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List suppliers with the numbering used by the chat keyboard")]
    Suppliers,
    #[command(about = "Calculate utilization for one supplier and month")]
    Calc {
        #[arg(long, help = "Supplier code (for example 1064) or part of its name")]
        supplier: String,
        #[arg(long)]
        year: i32,
        #[arg(long, help = "Month number 1-12")]
        month: u32,
        #[arg(long, help = "Attach the full report as JSON data")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Suppliers => commands::suppliers::run(),
        Command::Calc { supplier, year, month, json } => {
            commands::calc::run(CalcArgs { supplier, year, month, json })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn calc_arguments_are_parsed() {
        let cli = Cli::try_parse_from([
            "merchhours", "calc", "--supplier", "Alpha", "--year", "2025", "--month", "5", "--json",
        ])
        .expect("parse");

        match cli.command {
            Command::Calc { supplier, year, month, json } => {
                assert_eq!((supplier.as_str(), year, month, json), ("Alpha", 2025, 5, true));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn calc_requires_a_supplier() {
        assert!(Cli::try_parse_from(["merchhours", "calc", "--year", "2025", "--month", "5"]).is_err());
    }
}
