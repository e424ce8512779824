//! Command builder for the simulator executable
//!
//! Builds the argument vector for either simulator contract.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{
    Config, ExecutionMode, PredictorScheme, SimulationConfig, SimulatorContract, ValidationError,
};

/// Builder for simulator command-line arguments
#[derive(Debug)]
pub struct SimulatorCommand {
    /// Path to the simulator binary
    simulator: PathBuf,
    contract: SimulatorContract,
    /// Staged program file
    program: PathBuf,
    /// Staged configuration document
    config_file: PathBuf,
    simulation: SimulationConfig,
    /// Appended verbatim after the contract arguments
    extra_args: Vec<String>,
}

impl SimulatorCommand {
    /// Create a new simulator command builder
    pub fn new(simulator: impl Into<PathBuf>, contract: SimulatorContract) -> Self {
        Self {
            simulator: simulator.into(),
            contract,
            program: PathBuf::new(),
            config_file: PathBuf::new(),
            simulation: SimulationConfig::default(),
            extra_args: Vec::new(),
        }
    }

    /// Create a builder from the service configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.simulator_binary(), config.contract).extra_args(config.simulator_args.clone())
    }

    /// Set the staged program file
    pub fn program(mut self, path: impl Into<PathBuf>) -> Self {
        self.program = path.into();
        self
    }

    /// Set the staged configuration file
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    /// Set the resolved simulation configuration
    pub fn simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    /// Append extra arguments
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the command-line arguments, binary first
    ///
    /// Consumes self to avoid cloning the argument vectors.
    pub fn build(self) -> Vec<String> {
        let mut args = vec![self.simulator.to_string_lossy().into_owned()];

        match self.contract {
            SimulatorContract::Legacy => {
                args.push(self.program.to_string_lossy().into_owned());

                if self.simulation.mode == ExecutionMode::Step {
                    args.push("--step".to_string());
                }
                if self.simulation.pipeline.enabled {
                    args.push("--pipeline".to_string());
                }
                if self.simulation.branch_prediction.enabled {
                    args.push("--branch-pred".to_string());
                    // Unsupported schemes are rejected by check_contract before staging
                    if let Some(name) = legacy_pred_type(&self.simulation.branch_prediction.predictor) {
                        args.push("--pred-type".to_string());
                        args.push(name.to_string());
                    }
                }
            }
            SimulatorContract::Structured => {
                args.push("--program".to_string());
                args.push(self.program.to_string_lossy().into_owned());
                args.push("--config".to_string());
                args.push(self.config_file.to_string_lossy().into_owned());
                args.push("--format".to_string());
                args.push("json".to_string());
            }
        }

        args.extend(self.extra_args);
        args
    }

    /// Build a complete invocation for the process manager
    pub fn invocation(
        self,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> ProcessInvocation {
        let mut args = self.build();
        let program = args.remove(0);
        ProcessInvocation {
            program,
            args,
            working_dir: working_dir.into(),
            timeout,
            max_output_bytes,
        }
    }

    /// Get the simulator binary path
    pub fn simulator_path(&self) -> &Path {
        &self.simulator
    }

    pub fn contract(&self) -> SimulatorContract {
        self.contract
    }
}

/// Everything needed to run the simulator once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Wall-clock deadline measured from spawn
    pub timeout: Duration,
    /// Capture limit per output stream
    pub max_output_bytes: usize,
}

/// Check that a contract can express the requested configuration
///
/// The legacy executable only knows three predictors. The check only applies
/// when branch prediction is enabled, since the scheme is not passed otherwise.
pub fn check_contract(
    contract: SimulatorContract,
    simulation: &SimulationConfig,
) -> Result<(), ValidationError> {
    match contract {
        SimulatorContract::Structured => Ok(()),
        SimulatorContract::Legacy => {
            let prediction = &simulation.branch_prediction;
            if prediction.enabled && legacy_pred_type(&prediction.predictor).is_none() {
                return Err(ValidationError::UnsupportedByContract {
                    scheme: prediction.predictor.kind().name(),
                    contract: contract.name(),
                });
            }
            Ok(())
        }
    }
}

/// `--pred-type` value understood by the legacy executable
fn legacy_pred_type(scheme: &PredictorScheme) -> Option<&'static str> {
    match scheme {
        PredictorScheme::StaticNotTaken => Some("static"),
        PredictorScheme::OneBit { .. } => Some("1bit"),
        PredictorScheme::TwoBit { .. } => Some("2bit"),
        _ => None,
    }
}
