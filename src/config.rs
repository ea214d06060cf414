use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::ComposeError;
use crate::paths::{parent_dir, same_location};
use crate::wait::WaitSettings;

/// File locations and wait behaviour for one composer run.
///
/// The defaults are the layout of the decoder build tree; a JSON file may
/// override any subset of the fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComposerConfig {
    pub binary_source: PathBuf,
    pub binary_destination: PathBuf,
    pub prefix_script: PathBuf,
    pub target_production: PathBuf,
    pub target_development: PathBuf,
    /// Write the composed script here instead of over the target.
    pub output: Option<PathBuf>,
    pub poll_interval_ms: u64,
    /// `None` waits forever.
    pub wait_timeout_secs: Option<u64>,
    pub settle_polls: u32,
    pub sentinel: Option<PathBuf>,
    /// Where completion markers are kept; must stay out of the shipped folder.
    pub marker_dir: PathBuf,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            binary_source: PathBuf::from("liblcevc/liblcevc_dpi.wasm"),
            binary_destination: PathBuf::from("dist/liblcevc_dpi.wasm"),
            prefix_script: PathBuf::from("liblcevc/liblcevc_dpi.js"),
            target_production: PathBuf::from("dist/lcevc_dec.min.js"),
            target_development: PathBuf::from("dist/lcevc_dec.js"),
            output: None,
            poll_interval_ms: 1000,
            wait_timeout_secs: Some(600),
            settle_polls: 0,
            sentinel: None,
            marker_dir: PathBuf::from("liblcevc/.lcevc-dist"),
        }
    }
}

impl ComposerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ComposerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ComposeError> {
        if self.poll_interval_ms == 0 {
            return Err(ComposeError::Config(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.wait_timeout_secs == Some(0) {
            return Err(ComposeError::Config(
                "wait_timeout_secs must be greater than 0 (use null to wait forever)".into(),
            ));
        }
        let targets = [&self.target_production, &self.target_development];
        if let Some(target) = targets
            .iter()
            .find(|target| same_location(&self.prefix_script, target))
        {
            return Err(ComposeError::Config(format!(
                "prefix_script {} is the same file as target {}",
                self.prefix_script.display(),
                target.display()
            )));
        }
        if let Some(output) = &self.output {
            for (name, input) in [
                ("prefix_script", &self.prefix_script),
                ("binary_source", &self.binary_source),
            ] {
                if same_location(output, input) {
                    return Err(ComposeError::Config(format!(
                        "output {} would overwrite {name} {}",
                        output.display(),
                        input.display()
                    )));
                }
            }
        }
        let outputs = targets.into_iter().chain(self.output.as_ref());
        for output in outputs {
            if same_location(&self.marker_dir, parent_dir(output)) {
                return Err(ComposeError::Config(format!(
                    "marker_dir {} must not be the directory of {}",
                    self.marker_dir.display(),
                    output.display()
                )));
            }
        }
        Ok(())
    }

    pub fn wait_settings(&self) -> WaitSettings {
        WaitSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.wait_timeout_secs.map(Duration::from_secs),
            settle_polls: self.settle_polls,
            sentinel: self.sentinel.clone(),
        }
    }
}
