//! Player configuration.

use std::path::{Path, PathBuf};

use ms_ir::RenderParam;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings applied to every module handed to `play`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// -1 loops forever, 0 plays once, `n` adds `n` passes
    pub repeat_count: i32,
    /// Percent, 0 (mono) to 200
    pub stereo_separation: i32,
    /// Filter length in taps; 0 leaves the engine default, 1 is nearest
    pub interpolation_filter: i32,
    /// Output gain in millibel
    pub master_gain: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            repeat_count: -1,
            stereo_separation: 100,
            interpolation_filter: 0,
            master_gain: 0,
        }
    }
}

impl PlayerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render parameters to apply to a freshly created module.
    pub fn render_params(&self) -> [RenderParam; 3] {
        [
            RenderParam::StereoSeparation(self.stereo_separation),
            RenderParam::InterpolationFilter(self.interpolation_filter),
            RenderParam::MasterGain(self.master_gain),
        ]
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
