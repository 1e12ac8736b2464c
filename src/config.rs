use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_SAVE_DELAY;

pub const APP_DIR: &str = "launcher-accounts";
const CONFIG_FILE: &str = "config.toml";

/// User settings, stored as config.toml. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding accounts.json.
    pub data_dir: Option<PathBuf>,
    /// Debounce delay for deferred saves.
    pub save_delay_ms: Option<u64>,
}

impl Settings {
    /// Reads `<config dir>/launcher-accounts/config.toml`, or defaults if absent.
    pub fn load() -> Result<Self> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Self::load_from(&dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .context("Could not determine data directory")?
                .join(APP_DIR)),
        }
    }

    pub fn save_delay(&self) -> Duration {
        self.save_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SAVE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.save_delay(), DEFAULT_SAVE_DELAY);
    }

    #[test]
    fn reads_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_dir = \"/tmp/accounts\"\nsave_delay_ms = 50\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.data_dir().unwrap(), PathBuf::from("/tmp/accounts"));
        assert_eq!(settings.save_delay(), Duration::from_millis(50));
    }

    #[test]
    fn rejects_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "save_delay_ms = \"soon\"").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
