//! Type lattice
//!
//! Types are interned like terms. Ill-typed constructions produce a
//! `Type::TypeError` node instead of failing, so consumers can carry the
//! marker through transforms and check it explicitly.

use super::handles::TypeId;
use serde::{Deserialize, Serialize};

/// Integer signedness as recovered from debug metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Signedness {
    #[default]
    Unknown,
    Signed,
    Unsigned,
}

/// Semantic type of a term
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Integer {
        bitsize: u32,
        signedness: Signedness,
    },
    Float,
    Unknown,
    Pointer {
        pointed: TypeId,
        memspace: u32,
    },
    Array {
        element: TypeId,
        size: Option<u64>,
    },
    /// Named record; its body lives in the factory's record registry
    Record {
        name: String,
    },
    Function {
        ret: TypeId,
        args: Vec<TypeId>,
    },
    TypeError {
        message: String,
    },
}

impl Type {
    pub fn is_error(&self) -> bool {
        matches!(self, Type::TypeError { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn memspace(&self) -> u32 {
        match self {
            Type::Pointer { memspace, .. } => *memspace,
            _ => 0,
        }
    }
}
