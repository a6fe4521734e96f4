//! Provider Mirror CLI - Command-line interface
//!
//! This binary builds and checks offline provider mirrors using the
//! `provider_mirror` library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use console::style;

use error::CliError;

#[derive(Parser)]
#[command(name = "provider-mirror")]
#[command(version, about = "Build offline provider mirrors in the network-mirror layout")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download providers into a mirror directory
    Mirror(commands::mirror::MirrorArgs),

    /// Check an existing mirror for missing or corrupted files
    Verify(commands::verify::VerifyArgs),
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Mirror(args) => commands::mirror::run(args),
        Commands::Verify(args) => commands::verify::run(args),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
