//! Simulation orchestration
//!
//! Drives one request through validation, workspace staging, the simulator
//! process and result translation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub use crate::runner::request::SimulationRequest;

mod request;

use crate::{
    config::{Config, ConfigError, SimulationConfig, ValidationError},
    translate::translate,
    types::{ErrorKind, SimulationResult},
    workspace::{
        SimulatorCommand, StagingLayout, Workspace, WorkspaceManager, check_contract, invoke,
        resolve_simulator, stage,
    },
};

/// High-level entry point for running simulations
///
/// Holds only immutable configuration and the workspace limiter, so one
/// instance can be shared by every request.
#[derive(Debug)]
pub struct Simulator {
    config: Config,
    layout: StagingLayout,
    timeout: Duration,
    workspaces: WorkspaceManager,
}

impl Simulator {
    /// Create a new simulator with the given configuration
    ///
    /// Fails if the timeout is out of range or the configured defaults do not
    /// resolve to a valid simulation config. A missing simulator executable is not an error here; each
    /// request then fails with an internal error.
    pub fn new(mut config: Config) -> Result<Self, ConfigError> {
        let timeout = config.timeout()?;
        config.default_simulation()?;

        // Relative paths would otherwise resolve against each workspace
        let binary = config.simulator_binary();
        match resolve_simulator(&binary) {
            Some(resolved) => {
                debug!(path = %resolved.display(), "resolved simulator");
                config.simulator_path = Some(resolved);
            }
            None => warn!(path = %binary.display(), "simulator executable not found"),
        }

        let root = absolute(config.workspace_root())?;
        let workspaces = WorkspaceManager::new(root, config.max_concurrent);

        Ok(Self {
            layout: StagingLayout::from_config(&config),
            timeout,
            config,
            workspaces,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the workspace manager
    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run one simulation request
    ///
    /// Never fails: every problem is reported as a [`SimulationResult::Failure`].
    pub async fn simulate(&self, request: SimulationRequest) -> SimulationResult {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let span = info_span!("simulate", %request_id);

        let result = self.orchestrate(request_id, request).instrument(span.clone()).await;

        span.in_scope(|| match result.failure_info() {
            None => info!(elapsed = ?started.elapsed(), "simulation succeeded"),
            Some(failure) => info!(
                kind = %failure.kind,
                error = %failure.message,
                elapsed = ?started.elapsed(),
                "simulation failed"
            ),
        });
        result
    }

    async fn orchestrate(&self, request_id: Uuid, request: SimulationRequest) -> SimulationResult {
        let simulation = match self.validate(&request) {
            Ok(simulation) => simulation,
            Err(e) => return SimulationResult::failure(ErrorKind::Validation, e.to_string()),
        };

        let workspace = match self.workspaces.acquire(request_id).await {
            Ok(workspace) => workspace,
            Err(e) => return SimulationResult::failure(ErrorKind::Staging, e.to_string()),
        };

        let result = self.run_in(&workspace, &request.program, simulation).await;

        // Cleanup problems are logged by release and never change the result
        let _ = workspace.release().await;
        result
    }

    /// Check the request before any workspace exists
    fn validate(&self, request: &SimulationRequest) -> Result<SimulationConfig, ValidationError> {
        if request.program.trim().is_empty() {
            return Err(ValidationError::EmptyProgram);
        }
        let size = request.program.len();
        if size > self.config.max_program_bytes {
            return Err(ValidationError::ProgramTooLarge {
                size,
                limit: self.config.max_program_bytes,
            });
        }

        let simulation = SimulationConfig::build(&request.options, &self.config.defaults)?;
        check_contract(self.config.contract, &simulation)?;
        Ok(simulation)
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        program: &str,
        simulation: SimulationConfig,
    ) -> SimulationResult {
        let staged = match stage(workspace, &self.layout, program, &simulation).await {
            Ok(staged) => staged,
            Err(e) => return SimulationResult::failure(ErrorKind::Staging, e.to_string()),
        };

        let invocation = SimulatorCommand::from_config(&self.config)
            .program(staged.program)
            .config_file(staged.config)
            .simulation(simulation)
            .invocation(
                workspace.path(),
                self.timeout,
                self.config.max_output_bytes,
            );

        translate(invoke(&invocation).await)
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf, ConfigError> {
    std::path::absolute(&path).map_err(|e| {
        ConfigError::Invalid(format!(
            "cannot resolve workspace_root '{}': {e}",
            path.display()
        ))
    })
}
