//! Terminal progress display for mirror runs.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use provider_mirror::reconcile::{MirrorEvent, MirrorProgressCallback};

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} archives {msg}";

/// Progress bar counting settled archives.
///
/// The total grows as providers resolve, since the archive count is not known
/// up front.
pub struct MirrorProgress {
    bar: ProgressBar,
}

impl MirrorProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Callback feeding reconciler events into the bar.
    pub fn callback(&self) -> MirrorProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |event: &MirrorEvent| match event {
            MirrorEvent::RunStarted { .. } => {}
            MirrorEvent::ProviderResolved {
                address,
                version,
                packages,
                omitted,
            } => {
                bar.inc_length(*packages as u64);
                bar.set_message(format!("{} v{}", address, version));
                for platform in omitted {
                    bar.println(format!(
                        "  {} {} v{} has no build for {}",
                        style("!").yellow(),
                        address,
                        version,
                        platform
                    ));
                }
            }
            MirrorEvent::ArtifactSettled { .. } => bar.inc(1),
            MirrorEvent::ProviderFinished { address, success } => {
                let mark = if *success {
                    style("✓").green()
                } else {
                    style("✗").red()
                };
                bar.println(format!("  {} {}", mark, address));
            }
        })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
