//! `deid` command-line tool.

use anyhow::Result;
use clap::Parser;
use deid_cli::logging::init_logging;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command};
use crate::commands::{run_check, run_transform, run_types};
use crate::summary::print_run;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    if let Err(error) = init_logging(&cli.log_config()) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = dispatch(cli.command).unwrap_or_else(|error| {
        eprintln!("error: {error:#}");
        1
    });
    std::process::exit(exit_code);
}

/// Run a subcommand and pick its exit code: 1 for validation issues or any
/// unit of work that did not end `Ready`.
fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Types => run_types().map(|()| 0),
        Command::Check(args) => run_check(&args).map(|issues| i32::from(issues > 0)),
        Command::Run(args) => {
            let report = run_transform(&args)?;
            print_run(&report);
            Ok(i32::from(!report.all_ready()))
        }
    }
}
