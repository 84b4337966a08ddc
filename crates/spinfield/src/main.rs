mod cli;
mod config;
mod run;

use std::process::ExitCode;

use anyhow::Result;
use cli::Command;

fn main() -> Result<ExitCode> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check(check)) => {
            if run::check(check.run)? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        None => {
            run::run(cli.run)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
