pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "hourbot",
    about = "Hourbot operator CLI",
    long_about = "Prepare the hours database, check runtime readiness and export collected hours.",
    after_help = "Examples:\n  hourbot migrate\n  hourbot doctor --json\n  hourbot report"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, bot token presence and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print every registered user with their latest weekly hours as JSON")]
    Report,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Report => commands::report::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
