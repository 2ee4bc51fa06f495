use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_VIEWER_BASE: &str = "/pdf-viewer/custom-viewer.html";
pub const DEFAULT_PAGE_TURN_SOUND: &str = "/audio/page-turn.mp3";
pub const DEFAULT_VOLUME: f32 = 0.5;
pub const DEFAULT_AUDIO_CACHE_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Whether a load timeout is surfaced to the user.
///
/// The session always records the failure; this only controls the
/// announcement, so repeated retries against a slow surface stay quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutReporting {
    Always,
    #[default]
    FirstAttempt,
}

impl TimeoutReporting {
    pub fn announces(self, attempt: u32) -> bool {
        match self {
            TimeoutReporting::Always => true,
            TimeoutReporting::FirstAttempt => attempt == 0,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "load_timeout_ms")]
    pub load_timeout: Duration,
    pub timeout_reporting: TimeoutReporting,
    pub viewer_base: String,
    pub page_turn_sound: String,
    pub volume: f32,
    pub audio_enabled: bool,
    pub audio_cache_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            timeout_reporting: TimeoutReporting::default(),
            viewer_base: DEFAULT_VIEWER_BASE.to_string(),
            page_turn_sound: DEFAULT_PAGE_TURN_SOUND.to_string(),
            volume: DEFAULT_VOLUME,
            audio_enabled: true,
            audio_cache_capacity: DEFAULT_AUDIO_CACHE_CAPACITY,
        }
    }
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BridgeConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn normalized(mut self) -> Self {
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_VOLUME
        };
        if self.load_timeout.is_zero() {
            self.load_timeout = DEFAULT_LOAD_TIMEOUT;
        }
        self.audio_cache_capacity = self.audio_cache_capacity.max(1);
        self
    }
}
