//! Structured output adapter
//!
//! Reads the JSON result document written by simulators that implement the
//! structured contract. Every field is optional; unknown top-level fields are
//! ignored so newer simulators stay readable.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::translate::OutputParseError;
use crate::types::{
    BranchStats, MemoryWord, OutputFormat, PipelineStage, REGISTER_NAMES, RegisterValue,
    SimulationOutput, register_index,
};

#[derive(Debug, Deserialize)]
struct ResultDocument {
    #[serde(default)]
    pc: Option<Word>,
    #[serde(default)]
    halted: Option<bool>,
    #[serde(default)]
    cycles: Option<u64>,
    #[serde(default)]
    instructions: Option<u64>,
    #[serde(default)]
    registers: Option<RegisterSet>,
    #[serde(default)]
    memory: Vec<MemoryEntry>,
    #[serde(default)]
    pipeline: Vec<StageEntry>,
    #[serde(default)]
    branch_prediction: Option<BranchEntry>,
    #[serde(default)]
    console: Option<String>,
}

/// Registers as a positional list or a name → value map
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegisterSet {
    List(Vec<Word>),
    Named(BTreeMap<String, Word>),
}

#[derive(Debug, Deserialize)]
struct MemoryEntry {
    address: Word,
    value: Word,
}

#[derive(Debug, Deserialize)]
struct StageEntry {
    stage: String,
    #[serde(default)]
    instruction: Option<Word>,
}

#[derive(Debug, Deserialize)]
struct BranchEntry {
    total: u64,
    correct: u64,
    #[serde(default)]
    incorrect: Option<u64>,
}

/// A 32-bit word written as a number (signed values wrap) or a hex/decimal string
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(try_from = "WordRepr")]
struct Word(u32);

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WordRepr {
    Number(i64),
    Text(String),
}

impl TryFrom<WordRepr> for Word {
    type Error = String;

    fn try_from(repr: WordRepr) -> Result<Self, Self::Error> {
        match repr {
            WordRepr::Number(n) if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&n) => {
                // two's complement for negative register contents
                Ok(Word(n as u32))
            }
            WordRepr::Number(n) => Err(format!("{n} does not fit in a 32-bit word")),
            WordRepr::Text(text) => {
                let text = text.trim();
                let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(digits) => u32::from_str_radix(digits, 16),
                    None => text.parse(),
                };
                parsed
                    .map(Word)
                    .map_err(|_| format!("'{text}' is not a 32-bit word"))
            }
        }
    }
}

/// Parse a structured result document
pub fn parse_structured(stdout: &str) -> Result<SimulationOutput, OutputParseError> {
    if stdout.trim().is_empty() {
        return Err(OutputParseError::Empty);
    }

    let document: ResultDocument = serde_json::from_str(stdout.trim())
        .map_err(|e| OutputParseError::Document(e.to_string()))?;

    let mut output = SimulationOutput::empty(OutputFormat::Structured);
    output.pc = document.pc.map(|w| w.0);
    output.halted = document.halted;
    output.cycles = document.cycles;
    output.instructions = document.instructions;
    output.console = document.console;

    if let Some(registers) = document.registers {
        output.registers = convert_registers(registers)?;
    }

    output.memory = document
        .memory
        .into_iter()
        .map(|entry| MemoryWord {
            address: entry.address.0,
            value: entry.value.0,
        })
        .collect();

    output.pipeline = document
        .pipeline
        .into_iter()
        .map(|entry| PipelineStage {
            stage: entry.stage,
            instruction: entry.instruction.map(|w| w.0),
        })
        .collect();

    if let Some(stats) = document.branch_prediction {
        if stats.correct > stats.total {
            return Err(OutputParseError::Document(format!(
                "branch_prediction: {} correct predictions out of {} branches",
                stats.correct, stats.total
            )));
        }
        output.branch_prediction = Some(BranchStats {
            total: stats.total,
            correct: stats.correct,
            incorrect: stats.incorrect.unwrap_or(stats.total - stats.correct),
        });
    }

    Ok(output)
}

fn convert_registers(registers: RegisterSet) -> Result<Vec<RegisterValue>, OutputParseError> {
    match registers {
        RegisterSet::List(values) => {
            if values.len() > REGISTER_NAMES.len() {
                return Err(OutputParseError::Document(format!(
                    "registers: {} values for {} registers",
                    values.len(),
                    REGISTER_NAMES.len()
                )));
            }
            Ok(values
                .into_iter()
                .enumerate()
                .filter_map(|(index, word)| RegisterValue::new(index, word.0))
                .collect())
        }
        RegisterSet::Named(map) => {
            let mut by_index = BTreeMap::new();
            for (name, word) in map {
                let index = register_index(&name).ok_or_else(|| {
                    OutputParseError::Document(format!("registers: unknown register '{name}'"))
                })?;
                by_index.insert(index, word.0);
            }
            Ok(by_index
                .into_iter()
                .filter_map(|(index, value)| RegisterValue::new(index, value))
                .collect())
        }
    }
}
