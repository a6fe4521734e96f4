//! Verify command - audit an existing mirror.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use provider_mirror::logging::{init_logging, LoggingConfig};
use provider_mirror::store::MirrorStore;

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Mirror directory to check
    pub output_dir: PathBuf,
}

pub fn run(args: VerifyArgs) -> Result<(), CliError> {
    let _logging = init_logging(&LoggingConfig {
        verbose: args.verbose,
        ..Default::default()
    })
    .map_err(|e| CliError::Logging(e.to_string()))?;

    let issues = audit(&args.output_dir)?;

    if issues.is_empty() {
        println!(
            "{} Mirror at {} is consistent",
            style("✓").green(),
            args.output_dir.display()
        );
        return Ok(());
    }

    println!(
        "{} Mirror at {} has problems:",
        style("✗").red(),
        args.output_dir.display()
    );
    for issue in &issues {
        println!("  {}", issue);
    }
    Err(CliError::AuditFailed {
        issues: issues.len(),
    })
}

fn audit(dir: &Path) -> Result<Vec<String>, CliError> {
    if !dir.is_dir() {
        return Err(CliError::Config(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let issues = MirrorStore::new(dir)
        .audit()
        .map_err(|e| CliError::Audit(e.to_string()))?;
    Ok(issues.iter().map(ToString::to_string).collect())
}
