pub mod backend;
pub mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::backend::settings::Settings;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the columns detected in the first line of a CSV file
    Headers(cli::HeadersArgs),
    /// Map columns onto participant fields and save the import
    Map(cli::MapArgs),
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::load();

    let result = match &args.command {
        Command::Headers(headers_args) => cli::headers(headers_args, &mut settings),
        Command::Map(map_args) => cli::map(map_args, &mut settings),
    };
    settings.save();
    let ok = result?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
