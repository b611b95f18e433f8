//! Term kinds
//!
//! A `Term` is identified by its kind (which embeds child handles) and its
//! type. The display name is derived from both at construction time.

use super::handles::{TermId, TypeId};
use super::ops::{ArithType, ConditionType, UnaryArithType};
use serde::{Deserialize, Serialize};

/// How an argument term is materialized at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ArgumentKind {
    #[default]
    Any,
    /// The actual must be a compile-time string
    String,
}

/// Closed set of term kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    Value {
        name: String,
        global: bool,
    },
    Argument {
        index: u32,
        name: String,
        kind: ArgumentKind,
    },
    ReturnValue {
        function: String,
    },
    ReturnPtr {
        function: String,
    },
    /// IR constant that has no literal form (e.g. a constant expression)
    Const {
        name: String,
    },
    ArgumentCount,
    VarArgument {
        index: u32,
    },
    Binary {
        op: ArithType,
        lhv: TermId,
        rhv: TermId,
    },
    Unary {
        op: UnaryArithType,
        rhv: TermId,
    },
    Cmp {
        op: ConditionType,
        lhv: TermId,
        rhv: TermId,
    },
    Load {
        rhv: TermId,
    },
    Gep {
        base: TermId,
        shifts: Vec<TermId>,
        trivially_inbounds: bool,
    },
    Ternary {
        cnd: TermId,
        tru: TermId,
        fls: TermId,
    },
    Axiom {
        lhv: TermId,
        rhv: TermId,
    },
    Bound {
        rhv: TermId,
    },
    ReadProperty {
        prop: TermId,
        rhv: TermId,
    },
    Cast {
        sign_extend: bool,
        rhv: TermId,
    },
    Sign {
        rhv: TermId,
    },
    OpaqueBool(bool),
    OpaqueInt(i64),
    /// IEEE-754 bits of the constant
    OpaqueFloat(u64),
    OpaqueString(String),
    OpaqueNullPtr,
    OpaqueInvalidPtr,
    OpaqueUndef,
    OpaqueVar(String),
    OpaqueBuiltin(String),
    OpaqueNamedConstant(String),
    OpaqueIndexing {
        lhv: TermId,
        rhv: TermId,
    },
    OpaqueMemberAccess {
        lhv: TermId,
        property: String,
        indirect: bool,
    },
    OpaqueCall {
        lhv: TermId,
        args: Vec<TermId>,
    },
}

/// Interned term node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub kind: TermKind,
    pub ty: TypeId,
    pub name: String,
}

impl TermKind {
    /// Direct children in a fixed order
    pub fn subterms(&self) -> Vec<TermId> {
        match self {
            TermKind::Binary { lhv, rhv, .. }
            | TermKind::Cmp { lhv, rhv, .. }
            | TermKind::Axiom { lhv, rhv }
            | TermKind::OpaqueIndexing { lhv, rhv } => vec![*lhv, *rhv],
            TermKind::ReadProperty { prop, rhv } => vec![*prop, *rhv],
            TermKind::Unary { rhv, .. }
            | TermKind::Load { rhv }
            | TermKind::Bound { rhv }
            | TermKind::Cast { rhv, .. }
            | TermKind::Sign { rhv } => vec![*rhv],
            TermKind::Gep { base, shifts, .. } => {
                let mut res = Vec::with_capacity(shifts.len() + 1);
                res.push(*base);
                res.extend(shifts.iter().copied());
                res
            }
            TermKind::Ternary { cnd, tru, fls } => vec![*cnd, *tru, *fls],
            TermKind::OpaqueMemberAccess { lhv, .. } => vec![*lhv],
            TermKind::OpaqueCall { lhv, args } => {
                let mut res = Vec::with_capacity(args.len() + 1);
                res.push(*lhv);
                res.extend(args.iter().copied());
                res
            }
            _ => Vec::new(),
        }
    }

    /// Same kind with every child replaced through `f`
    pub fn map_subterms(&self, mut f: impl FnMut(TermId) -> TermId) -> TermKind {
        match self {
            TermKind::Binary { op, lhv, rhv } => TermKind::Binary {
                op: *op,
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            TermKind::Cmp { op, lhv, rhv } => TermKind::Cmp {
                op: *op,
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            TermKind::Axiom { lhv, rhv } => TermKind::Axiom {
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            TermKind::OpaqueIndexing { lhv, rhv } => TermKind::OpaqueIndexing {
                lhv: f(*lhv),
                rhv: f(*rhv),
            },
            TermKind::ReadProperty { prop, rhv } => TermKind::ReadProperty {
                prop: f(*prop),
                rhv: f(*rhv),
            },
            TermKind::Unary { op, rhv } => TermKind::Unary {
                op: *op,
                rhv: f(*rhv),
            },
            TermKind::Load { rhv } => TermKind::Load { rhv: f(*rhv) },
            TermKind::Bound { rhv } => TermKind::Bound { rhv: f(*rhv) },
            TermKind::Sign { rhv } => TermKind::Sign { rhv: f(*rhv) },
            TermKind::Cast { sign_extend, rhv } => TermKind::Cast {
                sign_extend: *sign_extend,
                rhv: f(*rhv),
            },
            TermKind::Gep {
                base,
                shifts,
                trivially_inbounds,
            } => {
                let base = f(*base);
                TermKind::Gep {
                    base,
                    shifts: shifts.iter().map(|s| f(*s)).collect(),
                    trivially_inbounds: *trivially_inbounds,
                }
            }
            TermKind::Ternary { cnd, tru, fls } => {
                let cnd = f(*cnd);
                let tru = f(*tru);
                TermKind::Ternary {
                    cnd,
                    tru,
                    fls: f(*fls),
                }
            }
            TermKind::OpaqueMemberAccess {
                lhv,
                property,
                indirect,
            } => TermKind::OpaqueMemberAccess {
                lhv: f(*lhv),
                property: property.clone(),
                indirect: *indirect,
            },
            TermKind::OpaqueCall { lhv, args } => {
                let lhv = f(*lhv);
                TermKind::OpaqueCall {
                    lhv,
                    args: args.iter().map(|a| f(*a)).collect(),
                }
            }
            other => other.clone(),
        }
    }

    /// Kinds that name a program value rather than compute one
    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            TermKind::Value { .. }
                | TermKind::Argument { .. }
                | TermKind::ReturnValue { .. }
                | TermKind::ReturnPtr { .. }
                | TermKind::Const { .. }
                | TermKind::ArgumentCount
                | TermKind::VarArgument { .. }
                | TermKind::OpaqueVar(_)
                | TermKind::OpaqueBuiltin(_)
                | TermKind::OpaqueNamedConstant(_)
        )
    }

    /// Literal constants
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            TermKind::OpaqueBool(_)
                | TermKind::OpaqueInt(_)
                | TermKind::OpaqueFloat(_)
                | TermKind::OpaqueString(_)
                | TermKind::OpaqueNullPtr
                | TermKind::OpaqueInvalidPtr
        )
    }

    /// Annotation-language placeholders that must be resolved before encoding
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            TermKind::OpaqueIndexing { .. }
                | TermKind::OpaqueMemberAccess { .. }
                | TermKind::OpaqueCall { .. }
        )
    }

    /// Short kind name used in logs and wire envelopes
    pub fn kind_name(&self) -> &'static str {
        match self {
            TermKind::Value { .. } => "Value",
            TermKind::Argument { .. } => "Argument",
            TermKind::ReturnValue { .. } => "ReturnValue",
            TermKind::ReturnPtr { .. } => "ReturnPtr",
            TermKind::Const { .. } => "Const",
            TermKind::ArgumentCount => "ArgumentCount",
            TermKind::VarArgument { .. } => "VarArgument",
            TermKind::Binary { .. } => "Binary",
            TermKind::Unary { .. } => "Unary",
            TermKind::Cmp { .. } => "Cmp",
            TermKind::Load { .. } => "Load",
            TermKind::Gep { .. } => "Gep",
            TermKind::Ternary { .. } => "Ternary",
            TermKind::Axiom { .. } => "Axiom",
            TermKind::Bound { .. } => "Bound",
            TermKind::ReadProperty { .. } => "ReadProperty",
            TermKind::Cast { .. } => "Cast",
            TermKind::Sign { .. } => "Sign",
            TermKind::OpaqueBool(_) => "OpaqueBool",
            TermKind::OpaqueInt(_) => "OpaqueInt",
            TermKind::OpaqueFloat(_) => "OpaqueFloat",
            TermKind::OpaqueString(_) => "OpaqueString",
            TermKind::OpaqueNullPtr => "OpaqueNullPtr",
            TermKind::OpaqueInvalidPtr => "OpaqueInvalidPtr",
            TermKind::OpaqueUndef => "OpaqueUndef",
            TermKind::OpaqueVar(_) => "OpaqueVar",
            TermKind::OpaqueBuiltin(_) => "OpaqueBuiltin",
            TermKind::OpaqueNamedConstant(_) => "OpaqueNamedConstant",
            TermKind::OpaqueIndexing { .. } => "OpaqueIndexing",
            TermKind::OpaqueMemberAccess { .. } => "OpaqueMemberAccess",
            TermKind::OpaqueCall { .. } => "OpaqueCall",
        }
    }
}
