//! Built-in example programs
//!
//! A fixed, ordered list served read-only to clients.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown example '{0}'")]
    NotFound(String),
}

/// An example program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleProgram {
    /// Lookup key, used as the map key when serializing the catalog
    #[serde(skip)]
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub code: &'static str,
}

static EXAMPLES: [ExampleProgram; 5] = [
    ExampleProgram {
        key: "simple_add",
        name: "Simple Addition",
        description: "Basic addition operation",
        code: "# Simple addition example
20020005  # addi $v0, $zero, 5
20030003  # addi $v1, $zero, 3
00622020  # add $a0, $v1, $v0
",
    },
    ExampleProgram {
        key: "loop",
        name: "Simple Loop",
        description: "Loop with branch instruction",
        code: "# Simple loop example
20020000  # addi $v0, $zero, 0
2003000A  # addi $v1, $zero, 10
20420001  # addi $v0, $v0, 1
1443FFFD  # bne $v0, $v1, -3
",
    },
    ExampleProgram {
        key: "memory",
        name: "Memory Operations",
        description: "Load and store operations",
        code: "# Memory operations example
20020064  # addi $v0, $zero, 100
AC020000  # sw $v0, 0($zero)
8C030000  # lw $v1, 0($zero)
",
    },
    ExampleProgram {
        key: "assembly_add",
        name: "Assembly Addition",
        description: "Addition written as assembly mnemonics",
        code: "# $t2 = 5 + 3
addi $t0, $zero, 5
addi $t1, $zero, 3
add $t2, $t0, $t1
",
    },
    ExampleProgram {
        key: "countdown",
        name: "Countdown",
        description: "Backward branch that counts a register down to zero",
        code: "# Count $t0 down from 5, summing into $t1
        addi $t0, $zero, 5
        addi $t1, $zero, 0
loop:   add $t1, $t1, $t0
        addi $t0, $t0, -1
        bne $t0, $zero, loop
",
    },
];

/// All examples, in display order
pub fn list() -> &'static [ExampleProgram] {
    &EXAMPLES
}

/// Look up an example by key
pub fn get(key: &str) -> Result<&'static ExampleProgram, CatalogError> {
    EXAMPLES
        .iter()
        .find(|example| example.key == key)
        .ok_or_else(|| CatalogError::NotFound(key.to_string()))
}

/// The whole catalog, serialized as an ordered `key → example` map
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(EXAMPLES.len()))?;
        for example in list() {
            map.serialize_entry(example.key, example)?;
        }
        map.end()
    }
}
