use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::simulation::{
    BranchPredictionConfig, DisplayConfig, ExecutionMode, MAX_MEMORY_WORDS, MemoryWindow,
    PipelineConfig, PredictorKind, PredictorParam, PredictorScheme, SimulationConfig,
    SimulationOptions, ValidationError,
};

mod loader;
pub mod simulation;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../mipsrun.example.toml");

/// Simulator executable used when none is configured
pub const DEFAULT_SIMULATOR: &str = "mips_simulator";

/// Wall-clock bound on a single simulator run
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid simulation defaults: {0}")]
    InvalidDefaults(#[from] ValidationError),
}

/// Command-line contract spoken by the simulator executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatorContract {
    /// Program path followed by boolean flags
    #[default]
    Legacy,
    /// Program and config file paths, JSON on stdout
    Structured,
}

impl SimulatorContract {
    pub fn name(&self) -> &'static str {
        match self {
            SimulatorContract::Legacy => "legacy",
            SimulatorContract::Structured => "structured",
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Config for mipsrun
///
/// Immutable once loaded; shared read-only by every request.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the simulator binary (uses PATH if not specified).
    #[serde(default)]
    pub simulator_path: Option<PathBuf>,

    /// Extra arguments appended to every invocation
    #[serde(default)]
    pub simulator_args: Vec<String>,

    #[serde(default)]
    pub contract: SimulatorContract,

    /// Wall-clock limit per run in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Capture limit per output stream in bytes
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    #[serde(default = "default_max_program_bytes")]
    pub max_program_bytes: usize,

    /// Number of simulations allowed to run at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Parent directory for per-request workspaces (system temp dir if unset)
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    #[serde(default = "default_program_file")]
    pub program_file: String,

    #[serde(default = "default_config_file")]
    pub config_file: String,

    #[serde(default)]
    pub server: ServerConfig,

    /// Default simulation options.
    /// Requests override these field by field.
    #[serde(default)]
    pub defaults: SimulationOptions,
}

impl Config {
    /// Create a new config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with built-in values only
    pub fn empty() -> Self {
        Self {
            simulator_path: None,
            simulator_args: Vec::new(),
            contract: SimulatorContract::default(),
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            max_program_bytes: default_max_program_bytes(),
            max_concurrent: default_max_concurrent(),
            workspace_root: None,
            program_file: default_program_file(),
            config_file: default_config_file(),
            server: ServerConfig::default(),
            defaults: SimulationOptions::default(),
        }
    }

    /// Get the path to the simulator binary
    pub fn simulator_binary(&self) -> PathBuf {
        self.simulator_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SIMULATOR))
    }

    /// Get the wall-clock bound for one run
    ///
    /// Fails unless `timeout_secs` is positive and fits in a [`Duration`].
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f64(self.timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(ConfigError::Invalid(format!(
                "timeout_secs must be a positive number of seconds, got {}",
                self.timeout_secs
            ))),
        }
    }

    /// Get the directory under which workspaces are created
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Resolve the default options into a canonical configuration
    pub fn default_simulation(&self) -> Result<SimulationConfig, ValidationError> {
        self.defaults.resolve()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_bind() -> String {
    "0.0.0.0:5500".to_string()
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_max_program_bytes() -> usize {
    256 * 1024
}

fn default_max_concurrent() -> usize {
    16
}

fn default_program_file() -> String {
    "program.asm".to_string()
}

fn default_config_file() -> String {
    "config.json".to_string()
}
