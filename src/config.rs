//! Application settings, read from `<config_dir>/padmapper/config.toml`.

use crate::mapping::types::{AxisSlot, ButtonId, ShiftSlot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "padmapper";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllerSettings {
    /// Interval between two published input snapshots
    pub poll_interval_ms: u64,
    /// Stick deadzone as a fraction (0.0-1.0), applied by the input source
    pub stick_deadzone: f32,
    /// Pin a gamepad by gilrs index instead of taking the first one
    pub gamepad_index: Option<usize>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 8,
            stick_deadzone: 0.0,
            gamepad_index: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub channel_capacity: usize,
    /// Start with the desktop layout active
    pub desktop_mode: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            desktop_mode: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub controller: ControllerSettings,
    pub engine: EngineSettings,
    /// Shift layer names and their bits
    pub shift_layers: BTreeMap<String, ShiftSlot>,
    /// Button that must be held for an axis slot to count as touched
    pub touch_buttons: HashMap<AxisSlot, ButtonId>,
}

impl Default for Settings {
    fn default() -> Self {
        let shift_layers = [
            ("A", ShiftSlot::A),
            ("B", ShiftSlot::B),
            ("C", ShiftSlot::C),
            ("D", ShiftSlot::D),
        ]
        .into_iter()
        .map(|(name, slot)| (name.to_string(), slot))
        .collect();

        let touch_buttons = HashMap::from([
            (AxisSlot::LeftPad, ButtonId::LeftPadTouch),
            (AxisSlot::RightPad, ButtonId::RightPadTouch),
        ]);

        Self {
            controller: ControllerSettings::default(),
            engine: EngineSettings::default(),
            shift_layers,
            touch_buttons,
        }
    }
}

impl Settings {
    /// Default location of the settings file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push(CONFIG_DIR);
            path.push(CONFIG_FILE);
            path
        })
    }

    /// Loads the settings from the default location. A missing file or
    /// config directory yields the defaults.
    pub async fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).await,
            None => {
                warn!("Could not determine config directory, using default settings");
                Ok(Self::default())
            }
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !exists {
            warn!(
                "Settings file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let settings = Self::from_toml(&content)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        debug!("Parsed settings: {:?}", settings);
        Ok(settings)
    }
}
