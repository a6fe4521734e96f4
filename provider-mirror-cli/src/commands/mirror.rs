//! Mirror command - download providers into a mirror directory.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use provider_mirror::config::{load_requirements, ConfigFile};
use provider_mirror::fetch::RetryPolicy;
use provider_mirror::logging::{init_logging, LoggingConfig};
use provider_mirror::provider::{Platform, ProviderRequirement};
use provider_mirror::{MirrorConfig, MirrorPolicy, MirrorReport, Reconciler};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::progress::MirrorProgress;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct MirrorArgs {
    /// Target platform as OS_ARCH, e.g. linux_amd64 (repeatable)
    #[arg(long = "platform", value_name = "OS_ARCH", required = true)]
    pub platforms: Vec<Platform>,

    /// Keep valid archives already in the mirror instead of re-downloading
    #[arg(long)]
    pub keep: bool,

    /// Provider to mirror as [HOST/]NAMESPACE/TYPE[=CONSTRAINT] (repeatable)
    #[arg(long = "provider", value_name = "PROVIDER")]
    pub providers: Vec<ProviderRequirement>,

    /// INI file with a [providers] section listing requirements
    #[arg(long, value_name = "FILE")]
    pub requirements: Option<PathBuf>,

    /// Maximum concurrent archive downloads
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries after a failed download attempt
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Mirror directory to write
    pub output_dir: PathBuf,
}

pub fn run(args: MirrorArgs) -> Result<(), CliError> {
    let file_config = ConfigFile::load().map_err(|e| CliError::Config(e.to_string()))?;

    let _logging = init_logging(&LoggingConfig {
        verbose: args.verbose,
        directory: file_config.logging.directory.clone(),
        ..Default::default()
    })
    .map_err(|e| CliError::Logging(e.to_string()))?;

    let requirements = collect_requirements(&args)?;
    let config = build_config(&args, &file_config);

    println!(
        "Mirroring {} provider(s) for {} platform(s) into {} ({} mode)",
        requirements.len(),
        config.platforms.len(),
        config.output_dir.display(),
        config.policy
    );
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Interrupted, cancelling downloads...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let progress = (!args.no_progress).then(MirrorProgress::new);
    let mut reconciler = Reconciler::from_config(config).map_err(CliError::Mirror)?;
    if let Some(progress) = &progress {
        reconciler = reconciler.with_progress(progress.callback());
    }

    let report = runtime
        .block_on(reconciler.run(&requirements, &cancel))
        .map_err(CliError::Mirror)?;

    if let Some(progress) = &progress {
        progress.finish();
    }

    info!(
        written = report.archives_written(),
        kept = report.archives_skipped(),
        bytes = report.bytes_written(),
        "Mirror run finished"
    );
    print_summary(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            failed: report.failed_providers().count(),
            cancelled: report.cancelled,
        })
    }
}

/// Providers from `--provider` flags followed by those from `--requirements`.
fn collect_requirements(args: &MirrorArgs) -> Result<Vec<ProviderRequirement>, CliError> {
    let mut requirements = args.providers.clone();
    if let Some(path) = &args.requirements {
        requirements.extend(load_requirements(path).map_err(CliError::Requirements)?);
    }

    if requirements.is_empty() {
        return Err(CliError::Config(
            "No providers given; use --provider or --requirements".to_string(),
        ));
    }
    Ok(requirements)
}

/// Build the run configuration.
///
/// CLI flags take precedence, then the config file, then built-in defaults.
fn build_config(args: &MirrorArgs, file_config: &ConfigFile) -> MirrorConfig {
    let mut config = file_config
        .apply(MirrorConfig::new(&args.output_dir))
        .with_policy(MirrorPolicy::from_keep_flag(args.keep))
        .with_platforms(args.platforms.iter().cloned());

    if let Some(parallel) = args.parallel {
        config = config.with_parallel_downloads(parallel);
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(retries) = args.retries {
        config = config.with_retry_policy(RetryPolicy::exponential(retries.saturating_add(1)));
    }
    config
}

fn print_summary(report: &MirrorReport) {
    println!();
    let header = if report.is_success() {
        style("Mirror complete").green().bold()
    } else if report.cancelled {
        style("Mirror cancelled").yellow().bold()
    } else {
        style("Mirror incomplete").red().bold()
    };
    println!("{}", header);
    print!("{}", report);
    println!("  {} written", format_size(report.bytes_written()));
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
