use std::path::Path;

use crate::config::ComposerConfig;

/// Which flavour of the bundled decoder script the build produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Production,
    Development,
}

impl BuildMode {
    /// Only the exact string `production` selects the minified bundle.
    pub fn from_selector(selector: &str) -> Self {
        if selector == "production" {
            Self::Production
        } else {
            Self::Development
        }
    }
}

impl ComposerConfig {
    pub fn target_for(&self, mode: BuildMode) -> &Path {
        match mode {
            BuildMode::Production => &self.target_production,
            BuildMode::Development => &self.target_development,
        }
    }
}
