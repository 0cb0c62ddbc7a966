mod agents;
mod cli;
mod error;
mod formats;
mod logging;
mod output;
mod utils;
mod versioning;
mod workflow;

use agents::update::CancelToken;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use output::Console;
use std::process;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let console = if cli.is_machine() {
        Console::machine()
    } else {
        Console::human()
    };

    let cancel = CancelToken::new();
    cancel.install_handler();

    if let Err(e) = workflow::run(&cli, &console, &cancel) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(e.exit_code());
    }
}
