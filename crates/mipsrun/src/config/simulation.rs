//! Simulation options and the canonical simulator configuration
//!
//! Clients send options in one of two shapes: the flat form used by the
//! original web form (`pipeline: true`, `predictor: "2bit"`, ...) or a nested
//! `config` object. Both are normalized into [`SimulationOptions`], layered
//! over the service defaults, and resolved into a fully-populated
//! [`SimulationConfig`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default size in bits for every predictor table parameter
pub const DEFAULT_PREDICTOR_BITS: u32 = 10;

/// Largest accepted predictor table parameter
pub const MAX_PREDICTOR_BITS: u32 = 20;

/// Largest memory window, in words
pub const MAX_MEMORY_WORDS: u32 = 4096;

const DEFAULT_MEMORY_WORDS: u32 = 16;

/// Errors raised while validating a simulation request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No program provided")]
    EmptyProgram,

    #[error("program is {size} bytes, the limit is {limit} bytes")]
    ProgramTooLarge { size: usize, limit: usize },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{field}' must be {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("unknown branch predictor scheme '{name}' in field '{field}'")]
    UnknownScheme { field: String, name: String },

    #[error("field '{field}' is not a parameter of predictor scheme '{scheme}'")]
    ParamNotApplicable { field: String, scheme: &'static str },

    #[error("'config' cannot be combined with top-level option '{0}'")]
    MixedSchema(String),

    #[error("predictor scheme '{scheme}' is not supported by the {contract} simulator contract")]
    UnsupportedByContract {
        scheme: &'static str,
        contract: &'static str,
    },
}

impl ValidationError {
    /// The request field the error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::UnknownField(field)
            | ValidationError::MixedSchema(field)
            | ValidationError::InvalidType { field, .. }
            | ValidationError::InvalidValue { field, .. }
            | ValidationError::UnknownScheme { field, .. }
            | ValidationError::ParamNotApplicable { field, .. } => Some(field.as_str()),
            ValidationError::EmptyProgram | ValidationError::ProgramTooLarge { .. } => {
                Some("program")
            }
            _ => None,
        }
    }

    /// Report a flat option name by its path in the nested `config` object
    fn into_nested(self) -> Self {
        match self {
            ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
                field: nested_path(&field),
                message,
            },
            ValidationError::ParamNotApplicable { field, scheme } => {
                ValidationError::ParamNotApplicable {
                    field: nested_path(&field),
                    scheme,
                }
            }
            other => other,
        }
    }
}

fn nested_path(flat: &str) -> String {
    match flat {
        "memory_start" => "config.memory_window.start".to_string(),
        "memory_length" => "config.memory_window.length".to_string(),
        key if PredictorParam::from_key(key).is_some() => {
            format!("config.branch_prediction.{key}")
        }
        other => other.to_string(),
    }
}

/// How the simulator drives the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Cycle-by-cycle, emitting state after every step
    #[default]
    Step,
    /// Run to completion, emitting only the final state
    Run,
}

impl ExecutionMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "step" => Some(ExecutionMode::Step),
            "run" => Some(ExecutionMode::Run),
            _ => None,
        }
    }
}

/// Branch predictor family, without parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    #[default]
    #[serde(alias = "static")]
    StaticNotTaken,
    StaticTaken,
    /// Backward taken, forward not taken
    Btfn,
    #[serde(alias = "1bit", alias = "bimodal_1bit")]
    OneBit,
    #[serde(alias = "2bit", alias = "bimodal_2bit")]
    TwoBit,
    Gshare,
    #[serde(alias = "local")]
    LocalHistory,
    Tournament,
}

impl PredictorKind {
    /// Parse a scheme name, accepting the short aliases of the original tooling
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "static" | "static_not_taken" => PredictorKind::StaticNotTaken,
            "static_taken" => PredictorKind::StaticTaken,
            "btfn" => PredictorKind::Btfn,
            "1bit" | "one_bit" | "bimodal_1bit" => PredictorKind::OneBit,
            "2bit" | "two_bit" | "bimodal_2bit" => PredictorKind::TwoBit,
            "gshare" => PredictorKind::Gshare,
            "local" | "local_history" => PredictorKind::LocalHistory,
            "tournament" => PredictorKind::Tournament,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical scheme name
    pub fn name(&self) -> &'static str {
        match self {
            PredictorKind::StaticNotTaken => "static_not_taken",
            PredictorKind::StaticTaken => "static_taken",
            PredictorKind::Btfn => "btfn",
            PredictorKind::OneBit => "one_bit",
            PredictorKind::TwoBit => "two_bit",
            PredictorKind::Gshare => "gshare",
            PredictorKind::LocalHistory => "local_history",
            PredictorKind::Tournament => "tournament",
        }
    }

    /// Parameters this scheme accepts
    pub fn params(&self) -> &'static [PredictorParam] {
        match self {
            PredictorKind::StaticNotTaken | PredictorKind::StaticTaken | PredictorKind::Btfn => {
                &[]
            }
            PredictorKind::OneBit | PredictorKind::TwoBit => &[PredictorParam::IndexBits],
            PredictorKind::Gshare => &[PredictorParam::HistoryBits, PredictorParam::IndexBits],
            PredictorKind::LocalHistory => {
                &[PredictorParam::LocalBits, PredictorParam::PatternBits]
            }
            PredictorKind::Tournament => &[PredictorParam::ChoiceBits],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorParam {
    IndexBits,
    HistoryBits,
    LocalBits,
    PatternBits,
    ChoiceBits,
}

impl PredictorParam {
    pub const ALL: [PredictorParam; 5] = [
        PredictorParam::IndexBits,
        PredictorParam::HistoryBits,
        PredictorParam::LocalBits,
        PredictorParam::PatternBits,
        PredictorParam::ChoiceBits,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PredictorParam::IndexBits => "index_bits",
            PredictorParam::HistoryBits => "history_bits",
            PredictorParam::LocalBits => "local_bits",
            PredictorParam::PatternBits => "pattern_bits",
            PredictorParam::ChoiceBits => "choice_bits",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// A branch predictor with its parameters resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum PredictorScheme {
    StaticNotTaken,
    StaticTaken,
    Btfn,
    OneBit { index_bits: u32 },
    TwoBit { index_bits: u32 },
    Gshare { history_bits: u32, index_bits: u32 },
    LocalHistory { local_bits: u32, pattern_bits: u32 },
    Tournament { choice_bits: u32 },
}

impl PredictorScheme {
    pub fn kind(&self) -> PredictorKind {
        match self {
            PredictorScheme::StaticNotTaken => PredictorKind::StaticNotTaken,
            PredictorScheme::StaticTaken => PredictorKind::StaticTaken,
            PredictorScheme::Btfn => PredictorKind::Btfn,
            PredictorScheme::OneBit { .. } => PredictorKind::OneBit,
            PredictorScheme::TwoBit { .. } => PredictorKind::TwoBit,
            PredictorScheme::Gshare { .. } => PredictorKind::Gshare,
            PredictorScheme::LocalHistory { .. } => PredictorKind::LocalHistory,
            PredictorScheme::Tournament { .. } => PredictorKind::Tournament,
        }
    }
}

/// Client-facing options. Every field is optional; unset fields fall back to
/// the service defaults and then to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationOptions {
    pub mode: Option<ExecutionMode>,
    pub pipeline: Option<bool>,
    pub branch_prediction: Option<bool>,
    pub predictor: Option<PredictorKind>,
    pub index_bits: Option<u32>,
    pub history_bits: Option<u32>,
    pub local_bits: Option<u32>,
    pub pattern_bits: Option<u32>,
    pub choice_bits: Option<u32>,
    pub show_pipeline: Option<bool>,
    pub show_registers: Option<bool>,
    pub show_memory: Option<bool>,
    pub memory_start: Option<u32>,
    pub memory_length: Option<u32>,
}

impl SimulationOptions {
    /// Parse options from a request object (without its `program` field)
    ///
    /// A `config` key selects the nested form; otherwise the flat form is
    /// expected. JSON `null` counts as unset.
    pub fn from_request(map: &Map<String, Value>) -> Result<Self, ValidationError> {
        match map.get("config") {
            Some(nested) if !nested.is_null() => {
                if let Some(key) = map.keys().find(|k| k.as_str() != "config") {
                    return Err(ValidationError::MixedSchema(key.clone()));
                }
                let nested = as_object("config", nested)?;
                Self::from_nested(nested)
            }
            _ => Self::from_flat(map),
        }
    }

    fn from_flat(map: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut options = Self::default();
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "config" => {}
                "mode" => options.mode = Some(parse_mode(key, value)?),
                "pipeline" => options.pipeline = Some(parse_bool(key, value)?),
                "branch_prediction" => options.branch_prediction = Some(parse_bool(key, value)?),
                "predictor" => options.predictor = Some(parse_predictor(key, value)?),
                "show_pipeline" => options.show_pipeline = Some(parse_bool(key, value)?),
                "show_registers" => options.show_registers = Some(parse_bool(key, value)?),
                "show_memory" => options.show_memory = Some(parse_bool(key, value)?),
                "memory_start" => options.memory_start = Some(parse_address(key, value)?),
                "memory_length" => options.memory_length = Some(parse_u32(key, value)?),
                other => match PredictorParam::from_key(other) {
                    Some(param) => options.set_param(param, parse_u32(key, value)?),
                    None => return Err(ValidationError::UnknownField(key.clone())),
                },
            }
        }
        Ok(options)
    }

    fn from_nested(config: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut options = Self::default();
        for (key, value) in config {
            if value.is_null() {
                continue;
            }
            let field = format!("config.{key}");
            match key.as_str() {
                "mode" => options.mode = Some(parse_mode(&field, value)?),
                "pipeline" => options.pipeline = Some(parse_toggle(&field, value)?),
                "branch_prediction" => options.read_branch_prediction(&field, value)?,
                "display" => options.read_display(&field, value)?,
                "memory_window" => options.read_memory_window(&field, value)?,
                _ => return Err(ValidationError::UnknownField(field)),
            }
        }
        Ok(options)
    }

    fn read_branch_prediction(&mut self, field: &str, value: &Value) -> Result<(), ValidationError> {
        if let Value::Bool(enabled) = value {
            self.branch_prediction = Some(*enabled);
            return Ok(());
        }
        let object = as_object(field, value)?;
        for (key, value) in object {
            if value.is_null() {
                continue;
            }
            let sub = format!("{field}.{key}");
            match key.as_str() {
                "enabled" => self.branch_prediction = Some(parse_bool(&sub, value)?),
                "scheme" => self.predictor = Some(parse_predictor(&sub, value)?),
                other => match PredictorParam::from_key(other) {
                    Some(param) => self.set_param(param, parse_u32(&sub, value)?),
                    None => return Err(ValidationError::UnknownField(sub)),
                },
            }
        }
        Ok(())
    }

    fn read_display(&mut self, field: &str, value: &Value) -> Result<(), ValidationError> {
        for (key, value) in as_object(field, value)? {
            if value.is_null() {
                continue;
            }
            let sub = format!("{field}.{key}");
            let flag = parse_bool(&sub, value)?;
            match key.as_str() {
                "pipeline" => self.show_pipeline = Some(flag),
                "registers" => self.show_registers = Some(flag),
                "memory" => self.show_memory = Some(flag),
                _ => return Err(ValidationError::UnknownField(sub)),
            }
        }
        Ok(())
    }

    fn read_memory_window(&mut self, field: &str, value: &Value) -> Result<(), ValidationError> {
        for (key, value) in as_object(field, value)? {
            if value.is_null() {
                continue;
            }
            let sub = format!("{field}.{key}");
            match key.as_str() {
                "start" => self.memory_start = Some(parse_address(&sub, value)?),
                "length" => self.memory_length = Some(parse_u32(&sub, value)?),
                _ => return Err(ValidationError::UnknownField(sub)),
            }
        }
        Ok(())
    }

    pub fn param(&self, param: PredictorParam) -> Option<u32> {
        match param {
            PredictorParam::IndexBits => self.index_bits,
            PredictorParam::HistoryBits => self.history_bits,
            PredictorParam::LocalBits => self.local_bits,
            PredictorParam::PatternBits => self.pattern_bits,
            PredictorParam::ChoiceBits => self.choice_bits,
        }
    }

    pub fn set_param(&mut self, param: PredictorParam, value: u32) {
        let slot = match param {
            PredictorParam::IndexBits => &mut self.index_bits,
            PredictorParam::HistoryBits => &mut self.history_bits,
            PredictorParam::LocalBits => &mut self.local_bits,
            PredictorParam::PatternBits => &mut self.pattern_bits,
            PredictorParam::ChoiceBits => &mut self.choice_bits,
        };
        *slot = Some(value);
    }

    /// Apply overrides from another set of options, preferring values from `overrides`
    ///
    /// Predictor parameters only carry over from `self` when `overrides` keeps
    /// the same predictor; switching schemes drops the base parameters.
    pub fn with_overrides(&self, overrides: &SimulationOptions) -> SimulationOptions {
        let switches_scheme = matches!(
            (overrides.predictor, self.predictor),
            (Some(new), old) if Some(new) != old
        );
        let param = |p: PredictorParam| {
            if switches_scheme {
                overrides.param(p)
            } else {
                overrides.param(p).or(self.param(p))
            }
        };

        SimulationOptions {
            mode: overrides.mode.or(self.mode),
            pipeline: overrides.pipeline.or(self.pipeline),
            branch_prediction: overrides.branch_prediction.or(self.branch_prediction),
            predictor: overrides.predictor.or(self.predictor),
            index_bits: param(PredictorParam::IndexBits),
            history_bits: param(PredictorParam::HistoryBits),
            local_bits: param(PredictorParam::LocalBits),
            pattern_bits: param(PredictorParam::PatternBits),
            choice_bits: param(PredictorParam::ChoiceBits),
            show_pipeline: overrides.show_pipeline.or(self.show_pipeline),
            show_registers: overrides.show_registers.or(self.show_registers),
            show_memory: overrides.show_memory.or(self.show_memory),
            memory_start: overrides.memory_start.or(self.memory_start),
            memory_length: overrides.memory_length.or(self.memory_length),
        }
    }

    /// Fill every unset field with its built-in default and validate the result
    pub fn resolve(&self) -> Result<SimulationConfig, ValidationError> {
        let kind = self.predictor.unwrap_or_default();

        for param in PredictorParam::ALL {
            if self.param(param).is_some() && !kind.params().contains(&param) {
                return Err(ValidationError::ParamNotApplicable {
                    field: param.key().to_string(),
                    scheme: kind.name(),
                });
            }
        }
        let bits = |param: PredictorParam| -> Result<u32, ValidationError> {
            let value = self.param(param).unwrap_or(DEFAULT_PREDICTOR_BITS);
            if !(1..=MAX_PREDICTOR_BITS).contains(&value) {
                return Err(ValidationError::InvalidValue {
                    field: param.key().to_string(),
                    message: format!("must be between 1 and {MAX_PREDICTOR_BITS}, got {value}"),
                });
            }
            Ok(value)
        };

        let predictor = match kind {
            PredictorKind::StaticNotTaken => PredictorScheme::StaticNotTaken,
            PredictorKind::StaticTaken => PredictorScheme::StaticTaken,
            PredictorKind::Btfn => PredictorScheme::Btfn,
            PredictorKind::OneBit => PredictorScheme::OneBit {
                index_bits: bits(PredictorParam::IndexBits)?,
            },
            PredictorKind::TwoBit => PredictorScheme::TwoBit {
                index_bits: bits(PredictorParam::IndexBits)?,
            },
            PredictorKind::Gshare => PredictorScheme::Gshare {
                history_bits: bits(PredictorParam::HistoryBits)?,
                index_bits: bits(PredictorParam::IndexBits)?,
            },
            PredictorKind::LocalHistory => PredictorScheme::LocalHistory {
                local_bits: bits(PredictorParam::LocalBits)?,
                pattern_bits: bits(PredictorParam::PatternBits)?,
            },
            PredictorKind::Tournament => PredictorScheme::Tournament {
                choice_bits: bits(PredictorParam::ChoiceBits)?,
            },
        };

        let memory_window = MemoryWindow::new(
            self.memory_start.unwrap_or(0),
            self.memory_length.unwrap_or(DEFAULT_MEMORY_WORDS),
        )?;

        Ok(SimulationConfig {
            mode: self.mode.unwrap_or_default(),
            pipeline: PipelineConfig {
                enabled: self.pipeline.unwrap_or(false),
            },
            branch_prediction: BranchPredictionConfig {
                enabled: self.branch_prediction.unwrap_or(false),
                predictor,
            },
            display: DisplayConfig {
                pipeline: self.show_pipeline.unwrap_or(true),
                registers: self.show_registers.unwrap_or(true),
                memory: self.show_memory.unwrap_or(false),
            },
            memory_window,
        })
    }
}

/// Canonical configuration staged for the simulator
///
/// Serializes to the nested JSON document written into the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationConfig {
    pub mode: ExecutionMode,
    pub pipeline: PipelineConfig,
    pub branch_prediction: BranchPredictionConfig,
    pub display: DisplayConfig,
    pub memory_window: MemoryWindow,
}

impl SimulationConfig {
    /// Build the canonical configuration for a request
    pub fn build(
        options: &Map<String, Value>,
        defaults: &SimulationOptions,
    ) -> Result<Self, ValidationError> {
        let nested = options.get("config").is_some_and(|c| !c.is_null());
        let requested = SimulationOptions::from_request(options)?;
        defaults
            .with_overrides(&requested)
            .resolve()
            .map_err(|e| if nested { e.into_nested() } else { e })
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationOptions::default()
            .resolve()
            .expect("built-in simulation defaults should be valid")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BranchPredictionConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub predictor: PredictorScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayConfig {
    pub pipeline: bool,
    pub registers: bool,
    pub memory: bool,
}

/// A word-aligned range of memory to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryWindow {
    /// Start address in bytes
    pub start: u32,
    /// Length in 32-bit words
    pub length: u32,
}

impl MemoryWindow {
    pub fn new(start: u32, length: u32) -> Result<Self, ValidationError> {
        if start % 4 != 0 {
            return Err(ValidationError::InvalidValue {
                field: "memory_start".to_string(),
                message: format!("address {start:#010x} is not word aligned"),
            });
        }
        if length == 0 || length > MAX_MEMORY_WORDS {
            return Err(ValidationError::InvalidValue {
                field: "memory_length".to_string(),
                message: format!("must be between 1 and {MAX_MEMORY_WORDS} words, got {length}"),
            });
        }
        let end = u64::from(start) + u64::from(length) * 4;
        if end > u64::from(u32::MAX) + 1 {
            return Err(ValidationError::InvalidValue {
                field: "memory_length".to_string(),
                message: format!("window starting at {start:#010x} runs past the address space"),
            });
        }
        Ok(Self { start, length })
    }

    /// Address one past the last byte of the window
    pub fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.length) * 4
    }
}

fn as_object<'a>(field: &str, value: &'a Value) -> Result<&'a Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError::InvalidType {
        field: field.to_string(),
        expected: "an object",
    })
}

fn parse_bool(field: &str, value: &Value) -> Result<bool, ValidationError> {
    value.as_bool().ok_or_else(|| ValidationError::InvalidType {
        field: field.to_string(),
        expected: "a boolean",
    })
}

/// A bool, or an object of the form `{"enabled": bool}`
fn parse_toggle(field: &str, value: &Value) -> Result<bool, ValidationError> {
    if let Value::Bool(enabled) = value {
        return Ok(*enabled);
    }
    let object = as_object(field, value)?;
    let mut enabled = None;
    for (key, value) in object {
        let sub = format!("{field}.{key}");
        match key.as_str() {
            "enabled" => enabled = Some(parse_bool(&sub, value)?),
            _ => return Err(ValidationError::UnknownField(sub)),
        }
    }
    enabled.ok_or_else(|| ValidationError::InvalidValue {
        field: field.to_string(),
        message: "missing 'enabled'".to_string(),
    })
}

fn parse_u32(field: &str, value: &Value) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidType {
        field: field.to_string(),
        expected: "a non-negative 32-bit integer",
    };
    let number = value.as_u64().ok_or_else(invalid)?;
    u32::try_from(number).map_err(|_| invalid())
}

/// A JSON integer, or a string in decimal or `0x` hexadecimal
fn parse_address(field: &str, value: &Value) -> Result<u32, ValidationError> {
    let Value::String(text) = value else {
        return parse_u32(field, value);
    };
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|_| ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("'{text}' is not a valid 32-bit address"),
    })
}

fn parse_mode(field: &str, value: &Value) -> Result<ExecutionMode, ValidationError> {
    let name = value.as_str().ok_or_else(|| ValidationError::InvalidType {
        field: field.to_string(),
        expected: "a string",
    })?;
    ExecutionMode::from_name(name).ok_or_else(|| ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("unknown mode '{name}', expected 'step' or 'run'"),
    })
}

fn parse_predictor(field: &str, value: &Value) -> Result<PredictorKind, ValidationError> {
    let name = value.as_str().ok_or_else(|| ValidationError::InvalidType {
        field: field.to_string(),
        expected: "a string",
    })?;
    PredictorKind::from_name(name).ok_or_else(|| ValidationError::UnknownScheme {
        field: field.to_string(),
        name: name.to_string(),
    })
}
