//! Configuration loader for metronome
//!
//! Builds `Settings` from layered sources with proper precedence.

use std::path::{Path, PathBuf};

use config::{Config, Environment as EnvSource, File, FileFormat};

use crate::config::environment::Environment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for the configuration directory
const CONFIG_DIR_ENV: &str = "METRONOME_CONFIG_DIR";

/// Default configuration directory
const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "METRONOME";

/// Separator for nested configuration keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Layered configuration loader.
///
/// Sources in order of priority (lowest first):
/// 1. `default.toml`
/// 2. `{environment}.toml`
/// 3. `local.toml`
/// 4. `METRONOME__*` environment variables
///
/// All files are optional; serde defaults cover a bare environment.
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    config_file: Option<PathBuf>,
    environment: Environment,
}

impl ConfigLoader {
    pub fn new() -> Self {
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));

        Self {
            config_dir,
            config_file: None,
            environment: Environment::from_env(),
        }
    }

    /// Load from one explicit file instead of the layered directory.
    pub fn with_config_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        Ok(Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(path.to_path_buf()),
            environment: Environment::from_env(),
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Build and deserialize the final `Settings`.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();

        if let Some(file) = &self.config_file {
            builder = builder.add_source(
                File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        } else {
            let layers = [
                "default".to_string(),
                self.environment.as_str().to_string(),
                "local".to_string(),
            ];
            for layer in layers {
                let path = self.config_dir.join(format!("{}.toml", layer));
                builder = builder.add_source(
                    File::from(path)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        builder = builder.add_source(
            EnvSource::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_without_any_files() {
        let loader = ConfigLoader {
            config_dir: PathBuf::from("/nonexistent/config/dir"),
            config_file: None,
            environment: Environment::Test,
        };
        let settings = loader.load().expect("defaults should load");
        assert_eq!(settings.dispatcher.poll_interval_secs, 5);
        assert_eq!(settings.worker.pool_size, 10);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = ConfigLoader::with_config_file(Path::new("/nonexistent/metronome.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
