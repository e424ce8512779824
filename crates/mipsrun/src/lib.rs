//! A library for orchestrating external MIPS simulator runs.
//!
//! mipsrun turns a simulation request into an isolated, time-bounded run of an
//! external MIPS simulator executable and turns that run's output back into a
//! typed result. It is the engine behind the `mipsrun` HTTP service.
//!
//! # Features
//!
//! - **Per-request workspaces** — Every run gets its own directory, removed when the run ends.
//! - **Bounded runs** — A wall-clock deadline kills and reaps a runaway simulator.
//! - **Two request schemas** — Flat options or a nested `config` object, one canonical config.
//! - **Two simulator contracts** — Legacy flag-based executables and structured JSON ones.
//! - **Output detection** — Free-text and JSON results are told apart from the output itself.
//! - **TOML configuration** — Service settings and simulation defaults, with env overrides.

pub use catalog::{Catalog, CatalogError, ExampleProgram};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, SimulationConfig, SimulationOptions};
pub use runner::{SimulationRequest, Simulator};
pub use types::{
    ErrorKind, OutputFormat, RawOutcome, SimulationFailure, SimulationOutput, SimulationResult,
};
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};

pub mod catalog;
pub mod config;
pub mod runner;
pub mod translate;
pub mod types;
pub mod workspace;
