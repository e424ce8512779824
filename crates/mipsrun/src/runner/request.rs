use serde_json::{Map, Value};

use crate::config::ValidationError;

/// A client simulation request
///
/// `options` holds every request field except `program`, in either the flat
/// or the nested (`config`) form. They are validated by
/// [`SimulationConfig::build`](crate::config::SimulationConfig::build).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationRequest {
    pub program: String,
    pub options: Map<String, Value>,
}

impl SimulationRequest {
    /// Create a request with no options
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            options: Map::new(),
        }
    }

    /// Set a single option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Split a JSON request body into program and options
    ///
    /// A missing or `null` program becomes the empty string, which the
    /// simulator rejects as "No program provided".
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let Value::Object(mut options) = body else {
            return Err(ValidationError::NotAnObject);
        };
        let program = match options.remove("program") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(program)) => program,
            Some(_) => {
                return Err(ValidationError::InvalidType {
                    field: "program".to_string(),
                    expected: "a string",
                });
            }
        };
        Ok(Self { program, options })
    }

    /// Parse a raw JSON request body
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
        Self::from_json(value)
    }
}
