use anyhow::{anyhow, Context, Result};
use log::{info, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Runtime configuration: command line over config file over defaults

const CONFIG_DIR_NAME: &str = "social-tui";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub application_id: Option<u64>,
    pub log_file: PathBuf,
    pub log_level: String,
    pub tick_interval_ms: u64,
    pub history_page_size: usize,
    pub request_timeout_secs: u64,
    pub roster_width: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            application_id: None,
            log_file: PathBuf::from("social-tui.log"),
            log_level: "debug".to_string(),
            tick_interval_ms: 16,
            history_page_size: 50,
            request_timeout_secs: 30,
            roster_width: 28,
        }
    }
}

/// Values given on the command line. `None` leaves the file or default value in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub application_id: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Config {
    /// Read a config file. Keys it leaves out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .with_context(|| format!("Could not open config file {}", path.display()))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Build the effective configuration. An explicit file must exist; the default one is optional.
    pub fn resolve(explicit: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Config::from_file(path)?,
            None => match Config::default_path() {
                Some(path) if path.exists() => Config::from_file(&path)?,
                _ => Config::default(),
            },
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(id) = overrides.application_id {
            self.application_id = Some(id);
        }
        if let Some(path) = overrides.log_file {
            self.log_file = path;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
    }

    pub fn require_application_id(&self) -> Result<u64> {
        self.application_id.ok_or_else(|| {
            anyhow!("No application id: pass --application-id or set DISCORD_APPLICATION_ID")
        })
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("Unknown log level '{}'", self.log_level))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"application_id": 1234, "history_page_size": 20}}"#).expect("write");

        let config = Config::from_file(file.path()).expect("config");
        assert_eq!(config.application_id, Some(1234));
        assert_eq!(config.history_page_size, 20);
        assert_eq!(config.tick_interval_ms, 16);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_command_line_wins() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"application_id": 1, "log_level": "info"}}"#).expect("write");

        let config = Config::resolve(
            Some(file.path()),
            Overrides {
                application_id: Some(2),
                log_file: None,
                log_level: Some("warn".to_string()),
            },
        )
        .expect("config");

        assert_eq!(config.require_application_id().expect("id"), 2);
        assert_eq!(config.level_filter().expect("level"), LevelFilter::Warn);
        assert_eq!(config.log_file, PathBuf::from("social-tui.log"));
    }

    #[test]
    fn test_missing_explicit_file_and_id_are_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(Config::resolve(Some(&dir.path().join("nope.json")), Overrides::default()).is_err());
        assert!(Config::default().require_application_id().is_err());
        let bad = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(bad.level_filter().is_err());
    }
}
