//! Free-text output adapter
//!
//! Reads the line-oriented diagnostic text printed by the original simulator:
//!
//! ```text
//! --- Cycle 3 ---
//! PC: 0x0000000c
//! Registers:
//! $00-$3: 0x00000000 0x00000000 0x00000000 0x00000000
//! $04-$7: 0x00000000 0x00000000 0x00000000 0x00000000
//! Halted: Yes
//!
//! Pipeline State:
//! IF: 0x20020005
//! ID: NOP
//! ...
//!
//! Branch Prediction Statistics:
//! Total Branches: 10
//! Correct Predictions: 8
//! Incorrect Predictions: 2
//! Accuracy: 80.00%
//! ```
//!
//! Step mode repeats the state block once per cycle; only the last one is
//! reported. Lines the adapter does not recognize are kept in `raw` only.

use crate::translate::OutputParseError;
use crate::types::{BranchStats, OutputFormat, PipelineStage, RegisterValue, SimulationOutput};

const STAGE_NAMES: [&str; 5] = ["IF", "ID", "EX", "MEM", "WB"];

/// Which multi-line block the parser is inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Pipeline,
    BranchStats,
}

#[derive(Debug, Default)]
struct StatsBuilder {
    total: Option<u64>,
    correct: Option<u64>,
    incorrect: Option<u64>,
}

/// Parse free-text simulator output
pub fn parse_text(stdout: &str) -> Result<SimulationOutput, OutputParseError> {
    if stdout.trim().is_empty() {
        return Err(OutputParseError::Empty);
    }

    let mut output = SimulationOutput::empty(OutputFormat::Text);
    let mut registers: [Option<u32>; 32] = [None; 32];
    let mut seen_state = false;
    let mut stats: Option<StatsBuilder> = None;
    let mut block = Block::None;

    for (line_idx, line) in stdout.lines().enumerate() {
        let line_number = line_idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            block = Block::None;
            continue;
        }
        let error = |message: String| OutputParseError::Line {
            line_number,
            line: line.to_string(),
            message,
        };

        if let Some(cycle) = parse_cycle_marker(trimmed) {
            output.cycles = Some(output.cycles.map_or(cycle, |c| c.max(cycle)));
            block = Block::None;
            continue;
        }

        if trimmed.starts_with('$') {
            let (start, values) = parse_register_row(trimmed).map_err(error)?;
            for (offset, value) in values.into_iter().enumerate() {
                registers[start + offset] = Some(value);
            }
            seen_state = true;
            block = Block::None;
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match (block, key) {
            (Block::Pipeline, stage) if STAGE_NAMES.contains(&stage) => {
                let instruction = if value == "NOP" {
                    None
                } else {
                    Some(parse_hex_word(value).ok_or_else(|| {
                        error(format!("invalid instruction word '{value}' in stage {stage}"))
                    })?)
                };
                output.pipeline.push(PipelineStage {
                    stage: stage.to_string(),
                    instruction,
                });
                continue;
            }
            (Block::BranchStats, _) => {
                if let Some(builder) = stats.as_mut()
                    && parse_stats_line(builder, key, value).map_err(error)?
                {
                    continue;
                }
            }
            _ => {}
        }

        block = Block::None;
        match key {
            "PC" => {
                // A new state block replaces the previous cycle's snapshot
                output.pc = Some(
                    parse_hex_word(value)
                        .ok_or_else(|| error(format!("invalid program counter '{value}'")))?,
                );
                output.halted = None;
                registers = [None; 32];
                seen_state = true;
            }
            "Halted" => {
                output.halted = Some(match value {
                    "Yes" => true,
                    "No" => false,
                    other => return Err(error(format!("expected Yes or No, got '{other}'"))),
                });
            }
            "Pipeline State" => {
                output.pipeline.clear();
                block = Block::Pipeline;
            }
            "Branch Prediction Statistics" => {
                stats = Some(StatsBuilder::default());
                block = Block::BranchStats;
            }
            _ => {}
        }
    }

    if !seen_state {
        return Err(OutputParseError::NoState);
    }

    output.registers = registers
        .iter()
        .enumerate()
        .filter_map(|(index, value)| value.and_then(|v| RegisterValue::new(index, v)))
        .collect();

    output.branch_prediction = stats.and_then(|s| {
        let total = s.total?;
        let correct = s.correct?;
        Some(BranchStats {
            total,
            correct,
            incorrect: s.incorrect.unwrap_or(total.saturating_sub(correct)),
        })
    });

    output.raw = Some(stdout.to_string());
    Ok(output)
}

/// `--- Cycle N ---`
fn parse_cycle_marker(line: &str) -> Option<u64> {
    line.strip_prefix("--- Cycle ")?
        .strip_suffix("---")?
        .trim()
        .parse()
        .ok()
}

/// Parse `$ N-$M: 0x........ ...` into the first register number and values
fn parse_register_row(line: &str) -> Result<(usize, Vec<u32>), String> {
    let (label, values) = line
        .split_once(':')
        .ok_or_else(|| "register row without ':'".to_string())?;
    let (first, last) = label
        .trim()
        .trim_start_matches('$')
        .split_once("-$")
        .ok_or_else(|| format!("invalid register range '{}'", label.trim()))?;

    let first: usize = first
        .trim()
        .parse()
        .map_err(|_| format!("invalid register number '{}'", first.trim()))?;
    let last: usize = last
        .trim()
        .parse()
        .map_err(|_| format!("invalid register number '{}'", last.trim()))?;
    if first > last || last >= 32 {
        return Err(format!("register range ${first}-${last} out of bounds"));
    }

    let values = values
        .split_whitespace()
        .map(|v| parse_hex_word(v).ok_or_else(|| format!("invalid register value '{v}'")))
        .collect::<Result<Vec<_>, _>>()?;
    let expected = last - first + 1;
    if values.len() != expected {
        return Err(format!(
            "expected {expected} register values, found {}",
            values.len()
        ));
    }

    Ok((first, values))
}

/// Returns whether the line belonged to the statistics block
fn parse_stats_line(builder: &mut StatsBuilder, key: &str, value: &str) -> Result<bool, String> {
    let slot = match key {
        "Total Branches" => &mut builder.total,
        "Correct Predictions" => &mut builder.correct,
        "Incorrect Predictions" => &mut builder.incorrect,
        // derived from the counts
        "Accuracy" => return Ok(true),
        _ => return Ok(false),
    };
    *slot = Some(
        value
            .parse()
            .map_err(|_| format!("invalid count '{value}' for {key}"))?,
    );
    Ok(true)
}

/// Parse a `0x`-prefixed hexadecimal word
fn parse_hex_word(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}
