//! Writes the simulator's inputs into a workspace

use std::path::PathBuf;

use tracing::instrument;

use crate::config::{Config, SimulationConfig};
use crate::workspace::{Workspace, WorkspaceError};

/// File names used inside every workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    pub program_file: String,
    pub config_file: String,
}

impl StagingLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            program_file: config.program_file.clone(),
            config_file: config.config_file.clone(),
        }
    }
}

impl Default for StagingLayout {
    fn default() -> Self {
        Self::from_config(&Config::empty())
    }
}

/// Absolute paths of the staged inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFiles {
    pub program: PathBuf,
    pub config: PathBuf,
}

/// Stage the program text and the canonical configuration into a workspace
///
/// The program is written verbatim with a trailing newline appended when
/// missing. The configuration is written as pretty-printed JSON.
#[instrument(skip_all, fields(request_id = %workspace.request_id()))]
pub async fn stage(
    workspace: &Workspace,
    layout: &StagingLayout,
    program: &str,
    config: &SimulationConfig,
) -> Result<StagedFiles, WorkspaceError> {
    let mut source = program.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }
    let program = workspace
        .write_file(&layout.program_file, source.as_bytes())
        .await?;

    let document = serde_json::to_vec_pretty(config)?;
    let config = workspace.write_file(&layout.config_file, &document).await?;

    Ok(StagedFiles { program, config })
}
