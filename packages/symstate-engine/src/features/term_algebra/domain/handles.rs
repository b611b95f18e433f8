//! Arena handles
//!
//! Plain indexes into the arenas owned by a `FactoryNest`. Predicate handles
//! additionally carry the memory-effect bit of the node they point at, so
//! states can decide order sensitivity without consulting the arena.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_handle {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_handle!(TypeId, "ty");
arena_handle!(TermId, "term");

const EFFECT_BIT: u32 = 1 << 31;

/// Handle of an interned predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredicateId(pub(crate) u32);

impl PredicateId {
    pub(crate) fn new(slot: u32, memory_effect: bool) -> Self {
        if memory_effect {
            PredicateId(slot | EFFECT_BIT)
        } else {
            PredicateId(slot)
        }
    }

    pub(crate) fn slot(self) -> u32 {
        self.0 & !EFFECT_BIT
    }

    pub fn index(self) -> usize {
        self.slot() as usize
    }

    /// Whether the predicate is an order-sensitive memory effect
    pub fn is_memory_effect(self) -> bool {
        self.0 & EFFECT_BIT != 0
    }
}

impl fmt::Display for PredicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pred#{}", self.slot())
    }
}
