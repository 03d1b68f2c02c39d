//! Plugin settings.
//!
//! The settings file is optional. It currently carries the capture toggle
//! key:
//!
//! ```json
//! { "dinput": { "disable key": 210 } }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::input::DEFAULT_TOGGLE_KEY;

/// Location of the settings file, relative to the game directory.
pub const SETTINGS_PATH: &str = r"Data\SKSE\Plugins\sse-gui\settings.json";

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// DirectInput settings.
    pub dinput: DinputSettings,
}

/// The `dinput` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DinputSettings {
    /// Scan code of the capture toggle key. Kept wide so that out of range
    /// values can be reported instead of failing the whole file.
    #[serde(rename = "disable key")]
    pub disable_key: i64,
}

impl Default for DinputSettings {
    fn default() -> Self {
        Self { disable_key: DEFAULT_TOGGLE_KEY as i64 }
    }
}

impl Settings {
    /// Parse settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Read settings from `path`, falling back to the defaults when the file
    /// is missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            },
            Err(crate::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                warn!("Unable to open {} for reading, using defaults", path.display());
                Self::default()
            },
            Err(e) => {
                error!("Loading settings failed: {e}");
                Self::default()
            },
        }
    }

    /// The toggle key as passed to
    /// [`Ssegui::control_key`](crate::Ssegui::control_key), which ignores
    /// values outside `0..=255`.
    pub fn toggle_key(&self) -> i32 {
        i32::try_from(self.dinput.disable_key).unwrap_or(-1)
    }
}

/// Default settings path.
pub fn default_path() -> PathBuf {
    PathBuf::from(SETTINGS_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_disable_key() {
        let settings = Settings::from_json(r#"{ "dinput": { "disable key": 59 } }"#).unwrap();
        assert_eq!(settings.dinput.disable_key, 59);
        assert_eq!(settings.toggle_key(), 59);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
        assert_eq!(
            Settings::from_json(r#"{ "dinput": {} }"#).unwrap().toggle_key(),
            DEFAULT_TOGGLE_KEY as i32
        );
        assert_eq!(
            Settings::from_json(r#"{ "other": true }"#).unwrap().dinput.disable_key,
            DEFAULT_TOGGLE_KEY as i64
        );
    }

    #[test]
    fn huge_keys_map_to_an_ignored_value() {
        let settings =
            Settings::from_json(r#"{ "dinput": { "disable key": 9999999999 } }"#).unwrap();
        assert_eq!(settings.toggle_key(), -1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Settings::from_json("{ dinput").is_err());
        assert!(Settings::from_json(r#"{ "dinput": { "disable key": "F1" } }"#).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load_or_default(Path::new("does/not/exist/settings.json"));
        assert_eq!(settings, Settings::default());
    }
}
