//! Solver verdicts
//!
//! Every check ends in exactly one of UNSAT, SAT with a model, or UNKNOWN
//! with the backend's reason. None of them is an error.

use crate::features::term_algebra::PredicateId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::expr::to_signed;

/// Value of a variable in a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelValue {
    Bool(bool),
    BitVector { value: u128, width: u32 },
}

impl ModelValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            ModelValue::BitVector { value, .. } => Some(*value != 0),
        }
    }

    /// Two's-complement reading, `None` when it does not fit
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ModelValue::Bool(b) => Some(*b as i64),
            ModelValue::BitVector { value, width } => i64::try_from(to_signed(*value, *width)).ok(),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ModelValue::Bool(b) => Some(*b as u64),
            ModelValue::BitVector { value, .. } => u64::try_from(*value).ok(),
        }
    }
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Bool(b) => write!(f, "{}", b),
            ModelValue::BitVector { value, width } => write!(f, "{}", to_signed(*value, *width)),
        }
    }
}

/// Concrete cells of one memory array, address to value
pub type MemoryShape = BTreeMap<u64, u64>;

/// Satisfying assignment of a violated query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SatResult {
    /// Variable name to value
    pub model: BTreeMap<String, ModelValue>,
    /// Memory before the state ran, per memspace
    pub initial_memory: BTreeMap<u32, MemoryShape>,
    /// Memory after the state ran, per memspace
    pub final_memory: BTreeMap<u32, MemoryShape>,
    /// Allocation bounds, per memspace
    pub bounds: BTreeMap<u32, MemoryShape>,
    /// Property arrays by property name
    pub properties: BTreeMap<String, MemoryShape>,
    /// PATH predicates that hold in the model, in state order
    pub counterexample: Vec<PredicateId>,
}

impl SatResult {
    pub fn at(&self, name: &str) -> Option<&ModelValue> {
        self.model.get(name)
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.at(name).and_then(|v| v.as_i64())
    }

    /// Final contents of the default memspace at `address`
    pub fn deref(&self, address: u64) -> Option<u64> {
        self.final_memory
            .get(&0)
            .and_then(|shape| shape.get(&address).copied())
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model:")?;
        for (name, value) in &self.model {
            writeln!(f, "  {} = {}", name, value)?;
        }
        for (space, shape) in &self.final_memory {
            writeln!(f, "memory[{}]:", space)?;
            for (addr, value) in shape {
                writeln!(f, "  {:#x} -> {:#x}", addr, value)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a solver check
#[derive(Debug, Clone, PartialEq)]
pub enum SmtResult {
    Unsat,
    Sat(Box<SatResult>),
    Unknown(String),
}

impl SmtResult {
    pub fn is_unsat(&self) -> bool {
        matches!(self, SmtResult::Unsat)
    }

    pub fn is_sat(&self) -> bool {
        matches!(self, SmtResult::Sat(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SmtResult::Unknown(_))
    }

    pub fn sat(&self) -> Option<&SatResult> {
        match self {
            SmtResult::Sat(res) => Some(res),
            _ => None,
        }
    }

    pub fn unknown_reason(&self) -> Option<&str> {
        match self {
            SmtResult::Unknown(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for SmtResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtResult::Unsat => write!(f, "unsat"),
            SmtResult::Sat(_) => write!(f, "sat"),
            SmtResult::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}
