//! Predicate kinds
//!
//! Predicates are effects or assertions over terms, tagged with the
//! `PredicateType` used for later filtering and with the source `Locus`.

use super::handles::TermId;
use crate::shared::models::Locus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a predicate inside a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum PredicateType {
    Path,
    #[default]
    State,
    Requires,
    Ensures,
    Assume,
    Assert,
    Invariant,
}

impl PredicateType {
    /// Display tag; STATE predicates carry none
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Path => "@P ",
            Self::State => "",
            Self::Requires => "@R ",
            Self::Ensures => "@E ",
            Self::Assume => "@U ",
            Self::Assert => "@A ",
            Self::Invariant => "@I ",
        }
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Path => "PATH",
            Self::State => "STATE",
            Self::Requires => "REQUIRES",
            Self::Ensures => "ENSURES",
            Self::Assume => "ASSUME",
            Self::Assert => "ASSERT",
            Self::Invariant => "INVARIANT",
        };
        f.write_str(s)
    }
}

/// Closed set of predicate kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateKind {
    Equality {
        lhv: TermId,
        rhv: TermId,
    },
    Inequality {
        lhv: TermId,
        rhv: TermId,
    },
    Store {
        lhv: TermId,
        rhv: TermId,
    },
    Alloca {
        lhv: TermId,
        num_elems: TermId,
        orig_num_elems: TermId,
    },
    Malloc {
        lhv: TermId,
        num_elems: TermId,
        orig_num_elems: TermId,
    },
    Call {
        lhv: Option<TermId>,
        function: TermId,
        args: Vec<TermId>,
    },
    Globals {
        globals: Vec<TermId>,
    },
    SeqData {
        base: TermId,
        data: Vec<TermId>,
    },
    SeqDataZero {
        base: TermId,
        size: u64,
    },
    WriteProperty {
        prop: TermId,
        lhv: TermId,
        rhv: TermId,
    },
    WriteBound {
        lhv: TermId,
        rhv: TermId,
    },
    Mark {
        id: TermId,
    },
    DefaultSwitchCase {
        cond: TermId,
        cases: Vec<TermId>,
    },
}

/// Interned predicate node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub kind: PredicateKind,
    pub ptype: PredicateType,
    pub locus: Locus,
}

impl PredicateKind {
    /// Operand terms in a fixed order
    pub fn operands(&self) -> Vec<TermId> {
        match self {
            PredicateKind::Equality { lhv, rhv }
            | PredicateKind::Inequality { lhv, rhv }
            | PredicateKind::Store { lhv, rhv }
            | PredicateKind::WriteBound { lhv, rhv } => vec![*lhv, *rhv],
            PredicateKind::Alloca {
                lhv,
                num_elems,
                orig_num_elems,
            }
            | PredicateKind::Malloc {
                lhv,
                num_elems,
                orig_num_elems,
            } => vec![*lhv, *num_elems, *orig_num_elems],
            PredicateKind::Call {
                lhv,
                function,
                args,
            } => {
                let mut res: Vec<TermId> = lhv.iter().copied().collect();
                res.push(*function);
                res.extend(args.iter().copied());
                res
            }
            PredicateKind::Globals { globals } => globals.clone(),
            PredicateKind::SeqData { base, data } => {
                let mut res = vec![*base];
                res.extend(data.iter().copied());
                res
            }
            PredicateKind::SeqDataZero { base, .. } => vec![*base],
            PredicateKind::WriteProperty { prop, lhv, rhv } => vec![*prop, *lhv, *rhv],
            PredicateKind::Mark { id } => vec![*id],
            PredicateKind::DefaultSwitchCase { cond, cases } => {
                let mut res = vec![*cond];
                res.extend(cases.iter().copied());
                res
            }
        }
    }

    /// Same kind with every operand replaced through `f`
    pub fn map_operands(&self, mut f: impl FnMut(TermId) -> TermId) -> PredicateKind {
        match self {
            PredicateKind::Equality { lhv, rhv } => PredicateKind::Equality {
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            PredicateKind::Inequality { lhv, rhv } => PredicateKind::Inequality {
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            PredicateKind::Store { lhv, rhv } => PredicateKind::Store {
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            PredicateKind::WriteBound { lhv, rhv } => PredicateKind::WriteBound {
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            PredicateKind::Alloca {
                lhv,
                num_elems,
                orig_num_elems,
            } => {
                let lhv = f(*lhv);
                let num_elems = f(*num_elems);
                PredicateKind::Alloca {
                    lhv,
                    num_elems,
                    orig_num_elems: f(*orig_num_elems),
                }
            }
            PredicateKind::Malloc {
                lhv,
                num_elems,
                orig_num_elems,
            } => {
                let lhv = f(*lhv);
                let num_elems = f(*num_elems);
                PredicateKind::Malloc {
                    lhv,
                    num_elems,
                    orig_num_elems: f(*orig_num_elems),
                }
            }
            PredicateKind::Call {
                lhv,
                function,
                args,
            } => {
                let lhv = lhv.map(&mut f);
                let function = f(*function);
                PredicateKind::Call {
                    lhv,
                    function,
                    args: args.iter().map(|a| f(*a)).collect(),
                }
            }
            PredicateKind::Globals { globals } => PredicateKind::Globals {
                globals: globals.iter().map(|g| f(*g)).collect(),
            },
            PredicateKind::SeqData { base, data } => {
                let base = f(*base);
                PredicateKind::SeqData {
                    base,
                    data: data.iter().map(|d| f(*d)).collect(),
                }
            }
            PredicateKind::SeqDataZero { base, size } => PredicateKind::SeqDataZero {
                base: f(*base),
                size: *size,
            },
            PredicateKind::WriteProperty { prop, lhv, rhv } => {
                let prop = f(*prop);
                let lhv = f(*lhv);
                PredicateKind::WriteProperty {
                    prop,
                    lhv,
                    rhv: f(*rhv),
                }
            }
            PredicateKind::Mark { id } => PredicateKind::Mark { id: f(*id) },
            PredicateKind::DefaultSwitchCase { cond, cases } => {
                let cond = f(*cond);
                PredicateKind::DefaultSwitchCase {
                    cond,
                    cases: cases.iter().map(|c| f(*c)).collect(),
                }
            }
        }
    }

    /// Memory effects are order sensitive and never deduplicated
    pub fn is_memory_effect(&self) -> bool {
        matches!(
            self,
            PredicateKind::Store { .. }
                | PredicateKind::Alloca { .. }
                | PredicateKind::Malloc { .. }
                | PredicateKind::Call { .. }
                | PredicateKind::SeqData { .. }
                | PredicateKind::SeqDataZero { .. }
                | PredicateKind::WriteProperty { .. }
                | PredicateKind::WriteBound { .. }
        )
    }

    pub fn is_mark(&self) -> bool {
        matches!(self, PredicateKind::Mark { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PredicateKind::Equality { .. } => "Equality",
            PredicateKind::Inequality { .. } => "Inequality",
            PredicateKind::Store { .. } => "Store",
            PredicateKind::Alloca { .. } => "Alloca",
            PredicateKind::Malloc { .. } => "Malloc",
            PredicateKind::Call { .. } => "Call",
            PredicateKind::Globals { .. } => "Globals",
            PredicateKind::SeqData { .. } => "SeqData",
            PredicateKind::SeqDataZero { .. } => "SeqDataZero",
            PredicateKind::WriteProperty { .. } => "WriteProperty",
            PredicateKind::WriteBound { .. } => "WriteBound",
            PredicateKind::Mark { .. } => "Mark",
            PredicateKind::DefaultSwitchCase { .. } => "DefaultSwitchCase",
        }
    }
}
