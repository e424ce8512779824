//! Result translation
//!
//! Turns a [`RawOutcome`] into a [`SimulationResult`]. The simulator may speak
//! either output contract, so the format is detected from the output itself:
//! a JSON object is read by the [`structured`] adapter, anything else by the
//! [`text`] adapter.

use thiserror::Error;
use tracing::debug;

use crate::types::{ErrorKind, OutputFormat, RawOutcome, SimulationOutput, SimulationResult};

pub use crate::translate::structured::parse_structured;
pub use crate::translate::text::parse_text;

pub mod structured;
pub mod text;

/// Longest piece of simulator output quoted in a parse failure, in characters
pub const SNIPPET_CHARS: usize = 200;

/// Message reported for an expired deadline
pub const TIMEOUT_MESSAGE: &str = "Simulation timed out";

/// Error raised by an output adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputParseError {
    #[error("simulator produced no output")]
    Empty,

    #[error("no simulator state found in output")]
    NoState,

    #[error("line {line_number}: {message} (line: {line:?})")]
    Line {
        /// 1-indexed
        line_number: usize,
        line: String,
        message: String,
    },

    #[error("invalid result document: {0}")]
    Document(String),
}

/// Detect which output contract the simulator answered with
pub fn detect_format(stdout: &str) -> OutputFormat {
    if stdout.trim_start().starts_with('{') {
        OutputFormat::Structured
    } else {
        OutputFormat::Text
    }
}

/// Parse successful simulator output with the matching adapter
pub fn parse_output(stdout: &str) -> Result<SimulationOutput, OutputParseError> {
    match detect_format(stdout) {
        OutputFormat::Structured => parse_structured(stdout),
        OutputFormat::Text => parse_text(stdout),
    }
}

/// Convert a raw process outcome into the service result
pub fn translate(outcome: RawOutcome) -> SimulationResult {
    match outcome {
        RawOutcome::SpawnFailed { reason } => SimulationResult::failure(ErrorKind::Internal, reason),
        RawOutcome::TimedOut { .. } => SimulationResult::failure(ErrorKind::Timeout, TIMEOUT_MESSAGE),
        RawOutcome::Completed {
            truncated: true, ..
        } => SimulationResult::failure(
            ErrorKind::Process,
            "simulator output exceeded the capture limit",
        ),
        RawOutcome::Completed {
            exit_code: Some(0),
            stdout,
            ..
        } => {
            let stdout = String::from_utf8_lossy(&stdout);
            match parse_output(&stdout) {
                Ok(output) => {
                    debug!(format = ?output.format, registers = output.registers.len(), "parsed simulator output");
                    SimulationResult::Success(output)
                }
                Err(e) => SimulationResult::failure(
                    ErrorKind::Parse,
                    format!("{e}: {}", snippet(&stdout)),
                ),
            }
        }
        RawOutcome::Completed {
            exit_code, stderr, ..
        } => SimulationResult::failure(ErrorKind::Process, process_message(exit_code, &stderr)),
    }
}

/// Failure message for a simulator that exited unsuccessfully
fn process_message(exit_code: Option<i32>, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match exit_code {
        Some(code) => format!("simulator exited with code {code}"),
        None => "simulator terminated by a signal".to_string(),
    }
}

/// Leading part of the output, for error messages
fn snippet(output: &str) -> String {
    output.trim().chars().take(SNIPPET_CHARS).collect()
}
