//! Layered configuration for the Tally binaries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tally_sync::SyncSettings;

/// Prefix of environment overrides, e.g. `TALLY__SYNC__WINDOW_DAYS=14`.
pub const ENV_PREFIX: &str = "TALLY";
const ENV_SEPARATOR: &str = "__";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TallyConfig {
    pub ledger: LedgerConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

impl TallyConfig {
    /// Render the effective configuration in the same format it is read from.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ledger.ldg"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub buffer_days: u32,
    pub window_days: u32,
    pub recent_days: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let defaults = SyncSettings::default();
        Self {
            buffer_days: defaults.buffer_days,
            window_days: defaults.window_days,
            recent_days: defaults.recent_days,
        }
    }
}

impl SyncConfig {
    pub fn settings(&self) -> Result<SyncSettings> {
        ensure!(
            self.window_days >= 1,
            "sync.window_days must be at least 1, got {}",
            self.window_days
        );
        Ok(SyncSettings {
            buffer_days: self.buffer_days,
            window_days: self.window_days,
            recent_days: self.recent_days,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `tally_sync=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Builder for the configuration layers, lowest precedence first:
/// built-in defaults, `<dir>/default.toml`, `<dir>/<env>.toml`, an explicit file, then
/// `TALLY__` environment variables.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    dir: PathBuf,
    env: Option<String>,
    file: Option<PathBuf>,
    vars: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("config"),
            env: None,
            file: None,
            vars: None,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Explicit file; unlike the directory layers it must exist.
    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Read overrides from `vars` instead of the process environment.
    pub fn vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }

    pub fn load(self) -> Result<TallyConfig> {
        let mut builder = Config::builder()
            .add_source(File::from(self.dir.join("default.toml")).required(false));
        if let Some(env) = &self.env {
            builder = builder
                .add_source(File::from(self.dir.join(format!("{env}.toml"))).required(false));
        }
        if let Some(file) = &self.file {
            builder = builder.add_source(File::from(file.as_path()).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(self.vars),
            )
            .build()
            .context("failed to read configuration")?;
        settings
            .try_deserialize()
            .context("invalid configuration")
    }
}

/// Load with the default layers, optionally for a named environment and an explicit file.
pub fn load_config(env: Option<&str>, file: Option<&Path>) -> Result<TallyConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(env) = env {
        loader = loader.env(env);
    }
    if let Some(file) = file {
        loader = loader.file(file);
    }
    loader.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn no_vars() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn defaults_without_sources() -> Result<()> {
        let dir = tempdir()?;
        let config = ConfigLoader::new().dir(dir.path()).vars(no_vars()).load()?;
        assert_eq!(config, TallyConfig::default());
        assert_eq!(config.sync.settings()?, SyncSettings::default());
        Ok(())
    }

    #[test]
    fn later_layers_override_earlier_ones() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("default.toml"),
            "[sync]\nwindow_days = 10\nbuffer_days = 5\n\n[log]\nformat = \"json\"\n",
        )?;
        fs::write(dir.path().join("test.toml"), "[sync]\nwindow_days = 7\n")?;
        let explicit = dir.path().join("local.toml");
        fs::write(&explicit, "[ledger]\npath = \"books/main.ldg\"\n")?;

        let vars = HashMap::from([("TALLY__SYNC__BUFFER_DAYS".to_string(), "1".to_string())]);
        let config = ConfigLoader::new()
            .dir(dir.path())
            .env("test")
            .file(&explicit)
            .vars(vars)
            .load()?;

        assert_eq!(config.sync.window_days, 7);
        assert_eq!(config.sync.buffer_days, 1);
        assert_eq!(config.sync.recent_days, 30);
        assert_eq!(config.ledger.path, PathBuf::from("books/main.ldg"));
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
        Ok(())
    }

    #[test]
    fn explicit_file_must_exist() -> Result<()> {
        let dir = tempdir()?;
        let result = ConfigLoader::new()
            .dir(dir.path())
            .file(dir.path().join("missing.toml"))
            .vars(no_vars())
            .load();
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn zero_window_is_rejected() {
        let sync = SyncConfig {
            window_days: 0,
            ..SyncConfig::default()
        };
        assert!(sync.settings().is_err());
    }

    #[test]
    fn renders_back_to_toml() -> Result<()> {
        let rendered = TallyConfig::default().to_toml()?;
        assert!(rendered.contains("window_days = 30"));
        let parsed: TallyConfig = toml::from_str(&rendered)?;
        assert_eq!(parsed, TallyConfig::default());
        Ok(())
    }
}
