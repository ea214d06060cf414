mod artifact;
mod config;
mod error;
mod mode;
mod paths;
mod wait;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::artifact::{ComposeOutcome, compose_scripts, copy_binary};
use crate::config::ComposerConfig;
use crate::mode::BuildMode;
use crate::wait::wait_for_target;

#[derive(Debug, Parser)]
#[command(
    name = "lcevc-dist",
    about = "Copy the LCEVC DPI module into dist/ and prepend its loader to the bundled decoder"
)]
struct Cli {
    /// Build mode; `production` composes the minified bundle, anything else the plain one
    #[arg(default_value = "")]
    mode: String,

    /// JSON file overriding the default paths and wait settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the composed script here instead of over the bundle
    #[arg(long)]
    output: Option<PathBuf>,

    /// Delay between checks for the bundle
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Give up waiting for the bundle after this many seconds
    #[arg(long, conflicts_with = "no_timeout")]
    timeout_secs: Option<u64>,

    /// Wait for the bundle until interrupted
    #[arg(long)]
    no_timeout: bool,

    /// Polls the bundle must stay unchanged before it is read
    #[arg(long)]
    settle_polls: Option<u32>,

    /// File the bundler writes once the bundle is complete
    #[arg(long)]
    sentinel: Option<PathBuf>,

    /// Directory for completion markers
    #[arg(long)]
    marker_dir: Option<PathBuf>,

    /// Compose even if the bundle was already composed
    #[arg(long)]
    force: bool,
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<ComposerConfig> {
        let mut config = match &self.config {
            Some(path) => ComposerConfig::load(path)?,
            None => ComposerConfig::default(),
        };

        if let Some(output) = &self.output {
            config.output = Some(output.clone());
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
        if let Some(timeout) = self.timeout_secs {
            config.wait_timeout_secs = Some(timeout);
        }
        if self.no_timeout {
            config.wait_timeout_secs = None;
        }
        if let Some(settle) = self.settle_polls {
            config.settle_polls = settle;
        }
        if let Some(sentinel) = &self.sentinel {
            config.sentinel = Some(sentinel.clone());
        }
        if let Some(marker_dir) = &self.marker_dir {
            config.marker_dir = marker_dir.clone();
        }

        config.validate().context("Invalid command line options")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Concatenation script running.");

    // Parse CLI
    let args = Cli::parse();
    let config = args.resolve_config()?;
    let mode = BuildMode::from_selector(&args.mode);

    // Ctrl-C aborts the wait for the bundler.
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        log::info!("Ctrl-C received, no longer waiting for the bundle");
    };

    match run_composer(&config, mode, args.force, interrupted).await? {
        ComposeOutcome::Composed { bytes } => log::info!("Composed bundle ({bytes} bytes)"),
        ComposeOutcome::AlreadyComposed => log::info!("Bundle left unchanged"),
    }
    Ok(())
}

pub async fn run_composer<F>(
    config: &ComposerConfig,
    mode: BuildMode,
    force: bool,
    cancel: F,
) -> anyhow::Result<ComposeOutcome>
where
    F: std::future::Future<Output = ()>,
{
    copy_binary(&config.binary_source, &config.binary_destination)
        .context("Failed to copy the DPI module into dist")?;

    let target = config.target_for(mode);
    log::debug!("Build mode {mode:?}, bundle {}", target.display());

    let report = wait_for_target(target, &config.wait_settings(), cancel)
        .await
        .context("Bundle never became ready")?;
    if report.waits > 0 {
        log::info!("Bundle ready after {} checks", report.waits);
    }

    let output = config.output.as_deref().unwrap_or(target);
    let outcome = compose_scripts(
        &config.prefix_script,
        target,
        output,
        &config.marker_dir,
        force,
    )
        .with_context(|| format!("Failed to compose {}", output.display()))?;

    Ok(outcome)
}
