use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use scsplit::runtime::{self, Commands, Config};

pub const DEFAULT_LOG_PATH: &str = "scsplit.log";

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// trace, debug, info, warn or error
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: runtime::LogLevel,

    /// terminal, file, both or discard
    #[arg(long = "log-mode", global = true, default_value = "terminal")]
    log_mode: runtime::LogMode,

    #[arg(long = "log-path", global = true, value_parser, default_value = DEFAULT_LOG_PATH)]
    log_path: PathBuf,
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();

    if let Err(e) = Config::init(Config {
        log_level: cli.log_level,
        log_mode: cli.log_mode,
        log_path: cli.log_path.clone(),
    }) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = cli.command.try_execute() {
        log::error!("{:?} failed: {:#}", cli.command, e);
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
