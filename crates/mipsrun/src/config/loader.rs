//! Configuration file loading for mipsrun
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError};

/// Prefix for environment overrides, e.g. `MIPSRUN_TIMEOUT_SECS`
const ENV_PREFIX: &str = "MIPSRUN";

impl Config {
    /// Load configuration from a file, then apply `MIPSRUN_*` environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(path.as_ref(), environment())
    }

    fn load(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .add_source(env)
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        self.timeout()?;
        if self.max_output_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_output_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_program_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_program_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent must be greater than zero".to_string(),
            ));
        }
        if let Some(ref path) = self.simulator_path
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "simulator_path is empty".to_string(),
            ));
        }

        validate_file_name("program_file", &self.program_file)?;
        validate_file_name("config_file", &self.config_file)?;
        if self.program_file == self.config_file {
            return Err(ConfigError::Invalid(format!(
                "program_file and config_file are both '{}'",
                self.program_file
            )));
        }

        self.defaults.resolve()?;

        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Workspace file names must be plain names: no separators, no traversal
fn validate_file_name(key: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ConfigError::Invalid(format!(
            "{key} must be a plain file name, got '{name}'"
        )));
    }
    Ok(())
}
