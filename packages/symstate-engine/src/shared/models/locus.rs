//! Source locations
//!
//! A `Locus` is a `file:line:col` triple. The empty locus (no file, 0:0) is
//! used for synthesized predicates and is never recorded as visited.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Source file/line/column identifying where a predicate originates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Locus {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

/// Ordered set of visited loci
pub type Loci = BTreeSet<Locus>;

impl Locus {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }

    /// The unknown location
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.file.is_empty() && self.line == 0 && self.col == 0
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.col)
        }
    }
}
