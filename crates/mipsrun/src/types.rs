use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// MIPS register names indexed by register number
pub const REGISTER_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", "$t8", "$t9",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

/// Look up a register number by ABI name (`$t0`) or numeric name (`$8`)
///
/// The leading `$` is optional.
pub fn register_index(name: &str) -> Option<usize> {
    let bare = name.trim().trim_start_matches('$');
    if let Ok(n) = bare.parse::<usize>() {
        return (n < REGISTER_NAMES.len()).then_some(n);
    }
    REGISTER_NAMES
        .iter()
        .position(|candidate| candidate.trim_start_matches('$') == bare)
}

/// Category of a failed simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing request fields; no process was spawned
    Validation,

    /// Workspace or file I/O failed before the simulator was invoked
    Staging,

    /// The simulator could not be spawned
    Internal,

    /// The simulator exceeded the wall-clock bound
    Timeout,

    /// The simulator exited unsuccessfully
    Process,

    /// The simulator succeeded but its output could not be understood
    Parse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Staging => "staging",
            ErrorKind::Internal => "internal",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Process => "process",
            ErrorKind::Parse => "parse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed simulation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for SimulationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Outcome of one simulation request
///
/// Serializes to `{"success": true, "output": ...}` or
/// `{"success": false, "error": ..., "kind": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationResult {
    Success(SimulationOutput),
    Failure(SimulationFailure),
}

impl SimulationResult {
    /// Build a failure result
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        SimulationResult::Failure(SimulationFailure {
            kind,
            message: message.into(),
        })
    }

    /// Check if the simulation produced a payload
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SimulationResult::Success(_))
    }

    /// Get the payload, if any
    pub fn output(&self) -> Option<&SimulationOutput> {
        match self {
            SimulationResult::Success(output) => Some(output),
            SimulationResult::Failure(_) => None,
        }
    }

    /// Get the failure, if any
    pub fn failure_info(&self) -> Option<&SimulationFailure> {
        match self {
            SimulationResult::Success(_) => None,
            SimulationResult::Failure(failure) => Some(failure),
        }
    }

    /// Get the error kind, if the simulation failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure_info().map(|f| f.kind)
    }
}

#[derive(Serialize)]
struct ResultWire<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a SimulationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

impl Serialize for SimulationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            SimulationResult::Success(output) => ResultWire {
                success: true,
                output: Some(output),
                error: None,
                kind: None,
            },
            SimulationResult::Failure(failure) => ResultWire {
                success: false,
                output: None,
                error: Some(&failure.message),
                kind: Some(failure.kind),
            },
        };
        wire.serialize(serializer)
    }
}

/// Which output contract the simulator answered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Line-oriented diagnostic text
    Text,
    /// JSON result document
    Structured,
}

/// Parsed simulator output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub format: OutputFormat,

    /// Final program counter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pc: Option<u32>,

    /// Whether the simulator reached a halt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<bool>,

    /// Clock cycles simulated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u64>,

    /// Instructions retired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<u64>,

    pub registers: Vec<RegisterValue>,

    pub memory: Vec<MemoryWord>,

    pub pipeline: Vec<PipelineStage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_prediction: Option<BranchStats>,

    /// Output written by the simulated program itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console: Option<String>,

    /// Full simulator text (text contract only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl SimulationOutput {
    /// Create an empty payload for the given format
    pub fn empty(format: OutputFormat) -> Self {
        Self {
            format,
            pc: None,
            halted: None,
            cycles: None,
            instructions: None,
            registers: Vec::new(),
            memory: Vec::new(),
            pipeline: Vec::new(),
            branch_prediction: None,
            console: None,
            raw: None,
        }
    }

    /// Look up a register value by name (`$t2`) or number (`$10`)
    pub fn register(&self, name: &str) -> Option<u32> {
        let index = register_index(name)?;
        self.registers
            .iter()
            .find(|r| r.index == index)
            .map(|r| r.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterValue {
    pub index: usize,
    pub name: &'static str,
    pub value: u32,
}

impl RegisterValue {
    /// Create a register entry. Returns `None` for an index outside 0..32.
    pub fn new(index: usize, value: u32) -> Option<Self> {
        REGISTER_NAMES
            .get(index)
            .map(|&name| Self { index, name, value })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryWord {
    pub address: u32,
    pub value: u32,
}

/// Contents of one pipeline stage; `None` is a bubble
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStage {
    pub stage: String,
    pub instruction: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BranchStats {
    pub total: u64,
    pub correct: u64,
    pub incorrect: u64,
}

impl BranchStats {
    /// Prediction accuracy as a percentage, `None` when no branches ran
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64 * 100.0)
    }
}

/// Raw outcome of a simulator process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// The process exited on its own. `exit_code` is `None` when it was
    /// terminated by a signal.
    Completed {
        exit_code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        /// Set when either stream exceeded the capture limit
        truncated: bool,
    },

    /// The process outlived its deadline and was killed
    TimedOut { elapsed: Duration },

    /// The process could not be started
    SpawnFailed { reason: String },
}
