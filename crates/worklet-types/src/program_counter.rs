//! Position of a worklet inside a workflow program.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Reserved worklet type marking the start of every program.
pub const INIT: &str = "INIT";
/// Reserved worklet type marking the end of every program.
pub const COMPLETED: &str = "COMPLETED";
/// Reserved worklet type marking an interrupted context.
pub const INTERRUPTED: &str = "INTERRUPTED";

/// Immutable `(worklet_type, worklet_index)` pair.
///
/// The canonical string form is `"(index)type"`; it is also the serde
/// representation, so stored contexts round-trip through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProgramCounter {
    worklet_type: String,
    worklet_index: usize,
}

impl ProgramCounter {
    pub fn new(worklet_type: impl Into<String>, worklet_index: usize) -> Self {
        Self {
            worklet_type: worklet_type.into(),
            worklet_index,
        }
    }

    /// The counter every context starts from: `(0)INIT`.
    pub fn init() -> Self {
        Self::new(INIT, 0)
    }

    pub fn worklet_type(&self) -> &str {
        &self.worklet_type
    }

    pub fn worklet_index(&self) -> usize {
        self.worklet_index
    }

    pub fn is_init(&self) -> bool {
        self.worklet_type == INIT
    }

    pub fn is_completed(&self) -> bool {
        self.worklet_type == COMPLETED
    }
}

impl fmt::Display for ProgramCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.worklet_index, self.worklet_type)
    }
}

impl FromStr for ProgramCounter {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WorkflowError::InvalidProgramCounter(s.to_string());
        let rest = s.strip_prefix('(').ok_or_else(invalid)?;
        let (digits, worklet_type) = rest.split_once(')').ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || worklet_type.is_empty()
        {
            return Err(invalid());
        }
        let worklet_index = digits.parse::<usize>().map_err(|_| invalid())?;
        Ok(Self::new(worklet_type, worklet_index))
    }
}

impl TryFrom<String> for ProgramCounter {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProgramCounter> for String {
    fn from(pc: ProgramCounter) -> Self {
        pc.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_round_trips() {
        for (worklet_type, index) in [
            (INIT, 0),
            ("org.sample.ConfigureDevice", 3),
            ("name(with)parens", 17),
            (COMPLETED, 1_000),
        ] {
            let pc = ProgramCounter::new(worklet_type, index);
            let parsed: ProgramCounter = pc.to_string().parse().unwrap();
            assert_eq!(parsed, pc);
            assert_eq!(parsed.worklet_type(), worklet_type);
            assert_eq!(parsed.worklet_index(), index);
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(ProgramCounter::new("Wait", 2).to_string(), "(2)Wait");
        assert_eq!(ProgramCounter::init().to_string(), "(0)INIT");
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["", "Wait", "(x)Wait", "()Wait", "(2)", "2)Wait", "(2Wait", "(-1)Wait"] {
            assert!(
                matches!(bad.parse::<ProgramCounter>(), Err(WorkflowError::InvalidProgramCounter(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn serde_uses_canonical_string() {
        let pc = ProgramCounter::new("Done", 4);
        assert_eq!(serde_json::to_string(&pc).unwrap(), "\"(4)Done\"");
        let back: ProgramCounter = serde_json::from_str("\"(4)Done\"").unwrap();
        assert_eq!(back, pc);
        assert!(serde_json::from_str::<ProgramCounter>("\"Done\"").is_err());
    }

    #[test]
    fn sentinel_predicates() {
        assert!(ProgramCounter::init().is_init());
        assert!(ProgramCounter::new(COMPLETED, 5).is_completed());
        assert!(!ProgramCounter::new("Wait", 1).is_completed());
    }
}
