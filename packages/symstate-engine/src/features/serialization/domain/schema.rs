//! Wire schema
//!
//! Every node is an envelope carrying the fields common to its family plus
//! an extension id and exactly one populated extension for the concrete
//! kind. Children are nested envelopes, so a document is self-contained and
//! can be re-interned into any `FactoryNest`.
//!
//! Extension ids are part of the persisted format and must never be reused:
//!
//! ```text
//! Type       16 Bool .. 24 TypeError
//! Term       16 Argument, 17 Binary, 21 Load, 22 OpaqueBool, 34 Sign,
//!            35 Axiom, .. 46 OpaqueCall
//! Predicate  16 Equality .. 28 DefaultSwitchCase
//! State      16 Basic, 17 Chain, 18 Choice
//! ```

use crate::features::term_algebra::{
    ArgumentKind, ArithType, ConditionType, PredicateType, Signedness, UnaryArithType,
};
use crate::shared::models::Locus;
use serde::{Deserialize, Serialize};

/// Version stamped on every document
pub const WIRE_VERSION: u32 = 1;

// ═══════════════════════════════════════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level unit of serialization: a root node plus the bodies of every
/// record type it mentions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDocument<T> {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordEnvelope>,
    pub root: T,
}

/// Field list of a named record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    pub name: String,
    pub fields: Vec<TypeEnvelope>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEnvelope {
    pub ext: u32,
    pub body: TypeExt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExt {
    Bool,
    Integer {
        bitsize: u32,
        signedness: Signedness,
    },
    Float,
    Unknown,
    Pointer {
        pointed: Box<TypeEnvelope>,
        memspace: u32,
    },
    Array {
        element: Box<TypeEnvelope>,
        size: Option<u64>,
    },
    Record {
        name: String,
    },
    Function {
        ret: Box<TypeEnvelope>,
        args: Vec<TypeEnvelope>,
    },
    TypeError {
        message: String,
    },
}

impl TypeExt {
    pub fn id(&self) -> u32 {
        match self {
            TypeExt::Bool => 16,
            TypeExt::Integer { .. } => 17,
            TypeExt::Float => 18,
            TypeExt::Unknown => 19,
            TypeExt::Pointer { .. } => 20,
            TypeExt::Array { .. } => 21,
            TypeExt::Record { .. } => 22,
            TypeExt::Function { .. } => 23,
            TypeExt::TypeError { .. } => 24,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Terms
// ═══════════════════════════════════════════════════════════════════════════

/// Term envelope: result type and display name are common to every kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEnvelope {
    pub ty: Box<TypeEnvelope>,
    pub name: String,
    pub ext: u32,
    pub body: TermExt,
}

type Child = Box<TermEnvelope>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TermExt {
    Argument {
        index: u32,
        arg_name: String,
        kind: ArgumentKind,
    },
    Binary {
        op: ArithType,
        lhv: Child,
        rhv: Child,
    },
    Cmp {
        op: ConditionType,
        lhv: Child,
        rhv: Child,
    },
    Const {
        const_name: String,
    },
    Gep {
        base: Child,
        shifts: Vec<TermEnvelope>,
        trivially_inbounds: bool,
    },
    Load {
        rhv: Child,
    },
    OpaqueBool {
        value: bool,
    },
    OpaqueFloat {
        bits: u64,
    },
    OpaqueInt {
        value: i64,
    },
    OpaqueInvalidPtr,
    OpaqueNullPtr,
    OpaqueString {
        value: String,
    },
    OpaqueUndef,
    OpaqueVar {
        var_name: String,
    },
    ReturnValue {
        function: String,
    },
    Ternary {
        cnd: Child,
        tru: Child,
        fls: Child,
    },
    Unary {
        op: UnaryArithType,
        rhv: Child,
    },
    Value {
        value_name: String,
        global: bool,
    },
    Sign {
        rhv: Child,
    },
    Axiom {
        lhv: Child,
        rhv: Child,
    },
    Bound {
        rhv: Child,
    },
    Cast {
        sign_extend: bool,
        rhv: Child,
    },
    ReturnPtr {
        function: String,
    },
    ReadProperty {
        prop: Child,
        rhv: Child,
    },
    ArgumentCount,
    VarArgument {
        index: u32,
    },
    OpaqueBuiltin {
        builtin: String,
    },
    OpaqueNamedConstant {
        constant: String,
    },
    OpaqueIndexing {
        lhv: Child,
        rhv: Child,
    },
    OpaqueMemberAccess {
        lhv: Child,
        property: String,
        indirect: bool,
    },
    OpaqueCall {
        lhv: Child,
        args: Vec<TermEnvelope>,
    },
}

impl TermExt {
    pub fn id(&self) -> u32 {
        match self {
            TermExt::Argument { .. } => 16,
            TermExt::Binary { .. } => 17,
            TermExt::Cmp { .. } => 18,
            TermExt::Const { .. } => 19,
            TermExt::Gep { .. } => 20,
            TermExt::Load { .. } => 21,
            TermExt::OpaqueBool { .. } => 22,
            TermExt::OpaqueFloat { .. } => 23,
            TermExt::OpaqueInt { .. } => 24,
            TermExt::OpaqueInvalidPtr => 25,
            TermExt::OpaqueNullPtr => 26,
            TermExt::OpaqueString { .. } => 27,
            TermExt::OpaqueUndef => 28,
            TermExt::OpaqueVar { .. } => 29,
            TermExt::ReturnValue { .. } => 30,
            TermExt::Ternary { .. } => 31,
            TermExt::Unary { .. } => 32,
            TermExt::Value { .. } => 33,
            TermExt::Sign { .. } => 34,
            TermExt::Axiom { .. } => 35,
            TermExt::Bound { .. } => 36,
            TermExt::Cast { .. } => 37,
            TermExt::ReturnPtr { .. } => 38,
            TermExt::ReadProperty { .. } => 39,
            TermExt::ArgumentCount => 40,
            TermExt::VarArgument { .. } => 41,
            TermExt::OpaqueBuiltin { .. } => 42,
            TermExt::OpaqueNamedConstant { .. } => 43,
            TermExt::OpaqueIndexing { .. } => 44,
            TermExt::OpaqueMemberAccess { .. } => 45,
            TermExt::OpaqueCall { .. } => 46,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Predicates
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateEnvelope {
    pub ptype: PredicateType,
    #[serde(default, skip_serializing_if = "Locus::is_unknown")]
    pub locus: Locus,
    pub ext: u32,
    pub body: PredicateExt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateExt {
    Equality {
        lhv: TermEnvelope,
        rhv: TermEnvelope,
    },
    Inequality {
        lhv: TermEnvelope,
        rhv: TermEnvelope,
    },
    Store {
        lhv: TermEnvelope,
        rhv: TermEnvelope,
    },
    Alloca {
        lhv: TermEnvelope,
        num_elems: TermEnvelope,
        orig_num_elems: TermEnvelope,
    },
    Malloc {
        lhv: TermEnvelope,
        num_elems: TermEnvelope,
        orig_num_elems: TermEnvelope,
    },
    Call {
        lhv: Option<TermEnvelope>,
        function: TermEnvelope,
        args: Vec<TermEnvelope>,
    },
    Globals {
        globals: Vec<TermEnvelope>,
    },
    SeqData {
        base: TermEnvelope,
        data: Vec<TermEnvelope>,
    },
    SeqDataZero {
        base: TermEnvelope,
        size: u64,
    },
    WriteProperty {
        prop: TermEnvelope,
        lhv: TermEnvelope,
        rhv: TermEnvelope,
    },
    WriteBound {
        lhv: TermEnvelope,
        rhv: TermEnvelope,
    },
    Mark {
        id: TermEnvelope,
    },
    DefaultSwitchCase {
        cond: TermEnvelope,
        cases: Vec<TermEnvelope>,
    },
}

impl PredicateExt {
    pub fn id(&self) -> u32 {
        match self {
            PredicateExt::Equality { .. } => 16,
            PredicateExt::Inequality { .. } => 17,
            PredicateExt::Store { .. } => 18,
            PredicateExt::Alloca { .. } => 19,
            PredicateExt::Malloc { .. } => 20,
            PredicateExt::Call { .. } => 21,
            PredicateExt::Globals { .. } => 22,
            PredicateExt::SeqData { .. } => 23,
            PredicateExt::SeqDataZero { .. } => 24,
            PredicateExt::WriteProperty { .. } => 25,
            PredicateExt::WriteBound { .. } => 26,
            PredicateExt::Mark { .. } => 27,
            PredicateExt::DefaultSwitchCase { .. } => 28,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// States
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub ext: u32,
    pub body: StateExt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateExt {
    Basic {
        data: Vec<PredicateEnvelope>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        visited: Vec<Locus>,
    },
    Chain {
        base: Box<StateEnvelope>,
        curr: Box<StateEnvelope>,
    },
    Choice {
        choices: Vec<StateEnvelope>,
    },
}

impl StateExt {
    pub fn id(&self) -> u32 {
        match self {
            StateExt::Basic { .. } => 16,
            StateExt::Chain { .. } => 17,
            StateExt::Choice { .. } => 18,
        }
    }
}
