mod app;
mod commands;
mod shutdown;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::app::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match init_logging(cli.global.verbose).and_then(|()| run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so `--json` output stays clean
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("heapsift={level}").parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let opts = &cli.global;
    match &cli.command {
        Command::Sift { output } => commands::sift::run(output.as_deref(), opts),
        Command::Read { address } => commands::read::run(*address, opts),
        Command::Bigint { address } => commands::bigint::run(*address, opts),
        Command::Pattern { pattern, limit } => commands::pattern::run(pattern, *limit, opts),
        Command::Types { name, limit } => commands::types::run(name, *limit, opts),
        Command::Regions { heap } => commands::regions::run(*heap, opts),
        Command::Hexdump {
            address,
            size,
            no_ascii,
        } => commands::hexdump::run(*address, *size, !*no_ascii, opts),
        Command::Chain { base, offsets } => commands::chain::run(*base, offsets, opts),
    }
}

/// Print the error, naming the failing stage when it comes from the core library
fn report(error: &anyhow::Error) {
    let stage = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<heapsift_core::Error>())
        .map(|core| core.stage());

    match stage {
        Some(stage) => eprintln!("{} {} stage failed: {:#}", "error:".red().bold(), stage, error),
        None => eprintln!("{} {:#}", "error:".red().bold(), error),
    }
}
