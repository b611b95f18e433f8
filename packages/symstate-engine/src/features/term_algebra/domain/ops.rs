//! Opcodes carried by Binary / Unary / Cmp terms

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary arithmetic and logic operators
///
/// Signed and unsigned division/remainder are distinct opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithType {
    Add,
    Sub,
    Mul,
    Div,
    UDiv,
    Rem,
    URem,
    Shl,
    Ashr,
    Lshr,
    BAnd,
    BOr,
    Xor,
    LAnd,
    LOr,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryArithType {
    Neg,
    Not,
    BNot,
}

/// Comparison predicates; Gt/Ge/Lt/Le are signed, U* unsigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
    Ugt,
    Uge,
    Ult,
    Ule,
    True,
    False,
}

impl ArithType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::UDiv => "/u",
            Self::Rem => "%",
            Self::URem => "%u",
            Self::Shl => "<<",
            Self::Ashr => ">>",
            Self::Lshr => ">>>",
            Self::BAnd => "&",
            Self::BOr => "|",
            Self::Xor => "^",
            Self::LAnd => "&&",
            Self::LOr => "||",
        }
    }

    /// Operators whose result is a boolean regardless of operand types
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::LAnd | Self::LOr)
    }
}

impl UnaryArithType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
            Self::BNot => "~",
        }
    }
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Ugt => ">u",
            Self::Uge => ">=u",
            Self::Ult => "<u",
            Self::Ule => "<=u",
            Self::True => "true",
            Self::False => "false",
        }
    }

    /// The condition holding exactly when `self` does not
    pub fn negated(&self) -> Self {
        match self {
            Self::Eq => Self::Neq,
            Self::Neq => Self::Eq,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Ugt => Self::Ule,
            Self::Uge => Self::Ult,
            Self::Ult => Self::Uge,
            Self::Ule => Self::Ugt,
            Self::True => Self::False,
            Self::False => Self::True,
        }
    }
}

impl fmt::Display for ArithType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UnaryArithType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
