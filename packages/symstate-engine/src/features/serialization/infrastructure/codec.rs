//! Arena ⇄ envelope conversion
//!
//! `WireEncoder` walks interned nodes into nested envelopes, remembering
//! every record type it passes so the document can carry their bodies.
//! `WireDecoder` re-interns envelopes into a target `FactoryNest`,
//! checking each declared extension id against the populated extension.
//! Decoded terms keep their stored display names, so renamed terms
//! survive a round trip unchanged.

use crate::features::predicate_state::{PredicateState, StateNode};
use crate::features::serialization::domain::{
    PredicateEnvelope, PredicateExt, RecordEnvelope, StateEnvelope, StateExt, TermEnvelope,
    TermExt, TypeEnvelope, TypeExt, WireDocument, WireError, WireResult, WIRE_VERSION,
};
use crate::features::term_algebra::{
    FactoryNest, Predicate, PredicateId, PredicateKind, Term, TermId, TermKind, Type, TypeId,
};
use crate::shared::models::Loci;
use std::collections::BTreeSet;

// ═══════════════════════════════════════════════════════════════════════════
// Encoding
// ═══════════════════════════════════════════════════════════════════════════

pub struct WireEncoder<'n> {
    nest: &'n FactoryNest,
    records: BTreeSet<String>,
}

impl<'n> WireEncoder<'n> {
    pub fn new(nest: &'n FactoryNest) -> Self {
        Self {
            nest,
            records: BTreeSet::new(),
        }
    }

    pub fn type_(&mut self, id: TypeId) -> TypeEnvelope {
        let body = match self.nest.ty(id).clone() {
            Type::Bool => TypeExt::Bool,
            Type::Integer {
                bitsize,
                signedness,
            } => TypeExt::Integer {
                bitsize,
                signedness,
            },
            Type::Float => TypeExt::Float,
            Type::Unknown => TypeExt::Unknown,
            Type::Pointer { pointed, memspace } => TypeExt::Pointer {
                pointed: Box::new(self.type_(pointed)),
                memspace,
            },
            Type::Array { element, size } => TypeExt::Array {
                element: Box::new(self.type_(element)),
                size,
            },
            Type::Record { name } => {
                if self.nest.type_factory().record_body(&name).is_some() {
                    self.records.insert(name.clone());
                }
                TypeExt::Record { name }
            }
            Type::Function { ret, args } => TypeExt::Function {
                ret: Box::new(self.type_(ret)),
                args: args.iter().map(|a| self.type_(*a)).collect(),
            },
            Type::TypeError { message } => TypeExt::TypeError { message },
        };
        TypeEnvelope {
            ext: body.id(),
            body,
        }
    }

    fn child(&mut self, id: TermId) -> Box<TermEnvelope> {
        Box::new(self.term(id))
    }

    fn children(&mut self, ids: &[TermId]) -> Vec<TermEnvelope> {
        ids.iter().map(|t| self.term(*t)).collect()
    }

    pub fn term(&mut self, id: TermId) -> TermEnvelope {
        let Term { kind, ty, name } = self.nest.term(id).clone();
        let body = match kind {
            TermKind::Value { name, global } => TermExt::Value {
                value_name: name,
                global,
            },
            TermKind::Argument { index, name, kind } => TermExt::Argument {
                index,
                arg_name: name,
                kind,
            },
            TermKind::ReturnValue { function } => TermExt::ReturnValue { function },
            TermKind::ReturnPtr { function } => TermExt::ReturnPtr { function },
            TermKind::Const { name } => TermExt::Const { const_name: name },
            TermKind::ArgumentCount => TermExt::ArgumentCount,
            TermKind::VarArgument { index } => TermExt::VarArgument { index },
            TermKind::Binary { op, lhv, rhv } => TermExt::Binary {
                op,
                lhv: self.child(lhv),
                rhv: self.child(rhv),
            },
            TermKind::Unary { op, rhv } => TermExt::Unary {
                op,
                rhv: self.child(rhv),
            },
            TermKind::Cmp { op, lhv, rhv } => TermExt::Cmp {
                op,
                lhv: self.child(lhv),
                rhv: self.child(rhv),
            },
            TermKind::Load { rhv } => TermExt::Load {
                rhv: self.child(rhv),
            },
            TermKind::Gep {
                base,
                shifts,
                trivially_inbounds,
            } => TermExt::Gep {
                base: self.child(base),
                shifts: self.children(&shifts),
                trivially_inbounds,
            },
            TermKind::Ternary { cnd, tru, fls } => TermExt::Ternary {
                cnd: self.child(cnd),
                tru: self.child(tru),
                fls: self.child(fls),
            },
            TermKind::Axiom { lhv, rhv } => TermExt::Axiom {
                lhv: self.child(lhv),
                rhv: self.child(rhv),
            },
            TermKind::Bound { rhv } => TermExt::Bound {
                rhv: self.child(rhv),
            },
            TermKind::ReadProperty { prop, rhv } => TermExt::ReadProperty {
                prop: self.child(prop),
                rhv: self.child(rhv),
            },
            TermKind::Cast { sign_extend, rhv } => TermExt::Cast {
                sign_extend,
                rhv: self.child(rhv),
            },
            TermKind::Sign { rhv } => TermExt::Sign {
                rhv: self.child(rhv),
            },
            TermKind::OpaqueBool(value) => TermExt::OpaqueBool { value },
            TermKind::OpaqueInt(value) => TermExt::OpaqueInt { value },
            TermKind::OpaqueFloat(bits) => TermExt::OpaqueFloat { bits },
            TermKind::OpaqueString(value) => TermExt::OpaqueString { value },
            TermKind::OpaqueNullPtr => TermExt::OpaqueNullPtr,
            TermKind::OpaqueInvalidPtr => TermExt::OpaqueInvalidPtr,
            TermKind::OpaqueUndef => TermExt::OpaqueUndef,
            TermKind::OpaqueVar(var_name) => TermExt::OpaqueVar { var_name },
            TermKind::OpaqueBuiltin(builtin) => TermExt::OpaqueBuiltin { builtin },
            TermKind::OpaqueNamedConstant(constant) => TermExt::OpaqueNamedConstant { constant },
            TermKind::OpaqueIndexing { lhv, rhv } => TermExt::OpaqueIndexing {
                lhv: self.child(lhv),
                rhv: self.child(rhv),
            },
            TermKind::OpaqueMemberAccess {
                lhv,
                property,
                indirect,
            } => TermExt::OpaqueMemberAccess {
                lhv: self.child(lhv),
                property,
                indirect,
            },
            TermKind::OpaqueCall { lhv, args } => TermExt::OpaqueCall {
                lhv: self.child(lhv),
                args: self.children(&args),
            },
        };
        TermEnvelope {
            ty: Box::new(self.type_(ty)),
            name,
            ext: body.id(),
            body,
        }
    }

    pub fn predicate(&mut self, id: PredicateId) -> PredicateEnvelope {
        let Predicate { kind, ptype, locus } = self.nest.predicate(id).clone();
        let body = match kind {
            PredicateKind::Equality { lhv, rhv } => PredicateExt::Equality {
                lhv: self.term(lhv),
                rhv: self.term(rhv),
            },
            PredicateKind::Inequality { lhv, rhv } => PredicateExt::Inequality {
                lhv: self.term(lhv),
                rhv: self.term(rhv),
            },
            PredicateKind::Store { lhv, rhv } => PredicateExt::Store {
                lhv: self.term(lhv),
                rhv: self.term(rhv),
            },
            PredicateKind::Alloca {
                lhv,
                num_elems,
                orig_num_elems,
            } => PredicateExt::Alloca {
                lhv: self.term(lhv),
                num_elems: self.term(num_elems),
                orig_num_elems: self.term(orig_num_elems),
            },
            PredicateKind::Malloc {
                lhv,
                num_elems,
                orig_num_elems,
            } => PredicateExt::Malloc {
                lhv: self.term(lhv),
                num_elems: self.term(num_elems),
                orig_num_elems: self.term(orig_num_elems),
            },
            PredicateKind::Call {
                lhv,
                function,
                args,
            } => PredicateExt::Call {
                lhv: lhv.map(|l| self.term(l)),
                function: self.term(function),
                args: self.children(&args),
            },
            PredicateKind::Globals { globals } => PredicateExt::Globals {
                globals: self.children(&globals),
            },
            PredicateKind::SeqData { base, data } => PredicateExt::SeqData {
                base: self.term(base),
                data: self.children(&data),
            },
            PredicateKind::SeqDataZero { base, size } => PredicateExt::SeqDataZero {
                base: self.term(base),
                size,
            },
            PredicateKind::WriteProperty { prop, lhv, rhv } => PredicateExt::WriteProperty {
                prop: self.term(prop),
                lhv: self.term(lhv),
                rhv: self.term(rhv),
            },
            PredicateKind::WriteBound { lhv, rhv } => PredicateExt::WriteBound {
                lhv: self.term(lhv),
                rhv: self.term(rhv),
            },
            PredicateKind::Mark { id } => PredicateExt::Mark { id: self.term(id) },
            PredicateKind::DefaultSwitchCase { cond, cases } => PredicateExt::DefaultSwitchCase {
                cond: self.term(cond),
                cases: self.children(&cases),
            },
        };
        PredicateEnvelope {
            ptype,
            locus,
            ext: body.id(),
            body,
        }
    }

    pub fn state(&mut self, state: &PredicateState) -> StateEnvelope {
        let body = match state.node() {
            StateNode::Basic { data, loci } => StateExt::Basic {
                data: data.iter().map(|p| self.predicate(*p)).collect(),
                visited: loci.iter().cloned().collect(),
            },
            StateNode::Chain { base, curr } => StateExt::Chain {
                base: Box::new(self.state(base)),
                curr: Box::new(self.state(curr)),
            },
            StateNode::Choice { choices } => StateExt::Choice {
                choices: choices.iter().map(|c| self.state(c)).collect(),
            },
        };
        StateEnvelope {
            ext: body.id(),
            body,
        }
    }

    /// Wraps `root` with the bodies of every record reached so far,
    /// including records only reachable through other record bodies
    pub fn finish<T>(mut self, root: T) -> WireDocument<T> {
        let mut done: BTreeSet<String> = BTreeSet::new();
        let mut records = Vec::new();
        loop {
            let pending: Vec<String> = self.records.difference(&done).cloned().collect();
            if pending.is_empty() {
                break;
            }
            for name in pending {
                let fields: Vec<TypeId> = self
                    .nest
                    .type_factory()
                    .record_body(&name)
                    .map(<[TypeId]>::to_vec)
                    .unwrap_or_default();
                let fields = fields.iter().map(|f| self.type_(*f)).collect();
                records.push(RecordEnvelope {
                    name: name.clone(),
                    fields,
                });
                done.insert(name);
            }
        }
        WireDocument {
            version: WIRE_VERSION,
            records,
            root,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════════════════════════════════════

pub struct WireDecoder<'n> {
    nest: &'n mut FactoryNest,
}

fn check(node: &'static str, declared: u32, found: u32) -> WireResult<()> {
    if declared == found {
        Ok(())
    } else {
        Err(WireError::mismatch(node, declared, found))
    }
}

impl<'n> WireDecoder<'n> {
    pub fn new(nest: &'n mut FactoryNest) -> Self {
        Self { nest }
    }

    /// Registers record bodies and checks the document version
    pub fn prepare<T>(&mut self, doc: &WireDocument<T>) -> WireResult<()> {
        if doc.version != WIRE_VERSION {
            return Err(WireError::Version {
                found: doc.version,
                expected: WIRE_VERSION,
            });
        }
        for record in &doc.records {
            let fields = record
                .fields
                .iter()
                .map(|f| self.type_(f))
                .collect::<WireResult<Vec<_>>>()?;
            self.nest.types().define_record(record.name.clone(), fields);
        }
        Ok(())
    }

    pub fn type_(&mut self, env: &TypeEnvelope) -> WireResult<TypeId> {
        check("Type", env.ext, env.body.id())?;
        let res = match &env.body {
            TypeExt::Bool => self.nest.types().bool(),
            TypeExt::Integer {
                bitsize,
                signedness,
            } => self.nest.types().integer(*bitsize, *signedness),
            TypeExt::Float => self.nest.types().float(),
            TypeExt::Unknown => self.nest.types().unknown(),
            TypeExt::Pointer { pointed, memspace } => {
                let pointed = self.type_(pointed)?;
                self.nest.types().pointer(pointed, *memspace)
            }
            TypeExt::Array { element, size } => {
                let element = self.type_(element)?;
                self.nest.types().array(element, *size)
            }
            TypeExt::Record { name } => self.nest.types().record(name.clone()),
            TypeExt::Function { ret, args } => {
                let ret = self.type_(ret)?;
                let args = args
                    .iter()
                    .map(|a| self.type_(a))
                    .collect::<WireResult<Vec<_>>>()?;
                self.nest.types().function(ret, args)
            }
            TypeExt::TypeError { message } => self.nest.types().type_error(message.clone()),
        };
        Ok(res)
    }

    fn child(&mut self, env: &TermEnvelope) -> WireResult<TermId> {
        self.term(env)
    }

    fn children(&mut self, envs: &[TermEnvelope]) -> WireResult<Vec<TermId>> {
        envs.iter().map(|e| self.term(e)).collect()
    }

    pub fn term(&mut self, env: &TermEnvelope) -> WireResult<TermId> {
        check("Term", env.ext, env.body.id())?;
        let ty = self.type_(&env.ty)?;
        let kind = match &env.body {
            TermExt::Value { value_name, global } => TermKind::Value {
                name: value_name.clone(),
                global: *global,
            },
            TermExt::Argument {
                index,
                arg_name,
                kind,
            } => TermKind::Argument {
                index: *index,
                name: arg_name.clone(),
                kind: *kind,
            },
            TermExt::ReturnValue { function } => TermKind::ReturnValue {
                function: function.clone(),
            },
            TermExt::ReturnPtr { function } => TermKind::ReturnPtr {
                function: function.clone(),
            },
            TermExt::Const { const_name } => TermKind::Const {
                name: const_name.clone(),
            },
            TermExt::ArgumentCount => TermKind::ArgumentCount,
            TermExt::VarArgument { index } => TermKind::VarArgument { index: *index },
            TermExt::Binary { op, lhv, rhv } => TermKind::Binary {
                op: *op,
                lhv: self.child(lhv)?,
                rhv: self.child(rhv)?,
            },
            TermExt::Unary { op, rhv } => TermKind::Unary {
                op: *op,
                rhv: self.child(rhv)?,
            },
            TermExt::Cmp { op, lhv, rhv } => TermKind::Cmp {
                op: *op,
                lhv: self.child(lhv)?,
                rhv: self.child(rhv)?,
            },
            TermExt::Load { rhv } => TermKind::Load {
                rhv: self.child(rhv)?,
            },
            TermExt::Gep {
                base,
                shifts,
                trivially_inbounds,
            } => TermKind::Gep {
                base: self.child(base)?,
                shifts: self.children(shifts)?,
                trivially_inbounds: *trivially_inbounds,
            },
            TermExt::Ternary { cnd, tru, fls } => TermKind::Ternary {
                cnd: self.child(cnd)?,
                tru: self.child(tru)?,
                fls: self.child(fls)?,
            },
            TermExt::Axiom { lhv, rhv } => TermKind::Axiom {
                lhv: self.child(lhv)?,
                rhv: self.child(rhv)?,
            },
            TermExt::Bound { rhv } => TermKind::Bound {
                rhv: self.child(rhv)?,
            },
            TermExt::ReadProperty { prop, rhv } => TermKind::ReadProperty {
                prop: self.child(prop)?,
                rhv: self.child(rhv)?,
            },
            TermExt::Cast { sign_extend, rhv } => TermKind::Cast {
                sign_extend: *sign_extend,
                rhv: self.child(rhv)?,
            },
            TermExt::Sign { rhv } => TermKind::Sign {
                rhv: self.child(rhv)?,
            },
            TermExt::OpaqueBool { value } => TermKind::OpaqueBool(*value),
            TermExt::OpaqueInt { value } => TermKind::OpaqueInt(*value),
            TermExt::OpaqueFloat { bits } => TermKind::OpaqueFloat(*bits),
            TermExt::OpaqueString { value } => TermKind::OpaqueString(value.clone()),
            TermExt::OpaqueNullPtr => TermKind::OpaqueNullPtr,
            TermExt::OpaqueInvalidPtr => TermKind::OpaqueInvalidPtr,
            TermExt::OpaqueUndef => TermKind::OpaqueUndef,
            TermExt::OpaqueVar { var_name } => TermKind::OpaqueVar(var_name.clone()),
            TermExt::OpaqueBuiltin { builtin } => TermKind::OpaqueBuiltin(builtin.clone()),
            TermExt::OpaqueNamedConstant { constant } => {
                TermKind::OpaqueNamedConstant(constant.clone())
            }
            TermExt::OpaqueIndexing { lhv, rhv } => TermKind::OpaqueIndexing {
                lhv: self.child(lhv)?,
                rhv: self.child(rhv)?,
            },
            TermExt::OpaqueMemberAccess {
                lhv,
                property,
                indirect,
            } => TermKind::OpaqueMemberAccess {
                lhv: self.child(lhv)?,
                property: property.clone(),
                indirect: *indirect,
            },
            TermExt::OpaqueCall { lhv, args } => TermKind::OpaqueCall {
                lhv: self.child(lhv)?,
                args: self.children(args)?,
            },
        };
        Ok(self.nest.terms().intern_raw(Term {
            kind,
            ty,
            name: env.name.clone(),
        }))
    }

    pub fn predicate(&mut self, env: &PredicateEnvelope) -> WireResult<PredicateId> {
        check("Predicate", env.ext, env.body.id())?;
        let kind = match &env.body {
            PredicateExt::Equality { lhv, rhv } => PredicateKind::Equality {
                lhv: self.term(lhv)?,
                rhv: self.term(rhv)?,
            },
            PredicateExt::Inequality { lhv, rhv } => PredicateKind::Inequality {
                lhv: self.term(lhv)?,
                rhv: self.term(rhv)?,
            },
            PredicateExt::Store { lhv, rhv } => PredicateKind::Store {
                lhv: self.term(lhv)?,
                rhv: self.term(rhv)?,
            },
            PredicateExt::Alloca {
                lhv,
                num_elems,
                orig_num_elems,
            } => PredicateKind::Alloca {
                lhv: self.term(lhv)?,
                num_elems: self.term(num_elems)?,
                orig_num_elems: self.term(orig_num_elems)?,
            },
            PredicateExt::Malloc {
                lhv,
                num_elems,
                orig_num_elems,
            } => PredicateKind::Malloc {
                lhv: self.term(lhv)?,
                num_elems: self.term(num_elems)?,
                orig_num_elems: self.term(orig_num_elems)?,
            },
            PredicateExt::Call {
                lhv,
                function,
                args,
            } => PredicateKind::Call {
                lhv: lhv.as_ref().map(|l| self.term(l)).transpose()?,
                function: self.term(function)?,
                args: self.children(args)?,
            },
            PredicateExt::Globals { globals } => PredicateKind::Globals {
                globals: self.children(globals)?,
            },
            PredicateExt::SeqData { base, data } => PredicateKind::SeqData {
                base: self.term(base)?,
                data: self.children(data)?,
            },
            PredicateExt::SeqDataZero { base, size } => PredicateKind::SeqDataZero {
                base: self.term(base)?,
                size: *size,
            },
            PredicateExt::WriteProperty { prop, lhv, rhv } => PredicateKind::WriteProperty {
                prop: self.term(prop)?,
                lhv: self.term(lhv)?,
                rhv: self.term(rhv)?,
            },
            PredicateExt::WriteBound { lhv, rhv } => PredicateKind::WriteBound {
                lhv: self.term(lhv)?,
                rhv: self.term(rhv)?,
            },
            PredicateExt::Mark { id } => PredicateKind::Mark {
                id: self.term(id)?,
            },
            PredicateExt::DefaultSwitchCase { cond, cases } => PredicateKind::DefaultSwitchCase {
                cond: self.term(cond)?,
                cases: self.children(cases)?,
            },
        };
        Ok(self
            .nest
            .predicates()
            .make(kind, env.ptype, env.locus.clone()))
    }

    pub fn state(&mut self, env: &StateEnvelope) -> WireResult<PredicateState> {
        check("State", env.ext, env.body.id())?;
        let res = match &env.body {
            StateExt::Basic { data, visited } => {
                let data = data
                    .iter()
                    .map(|p| self.predicate(p))
                    .collect::<WireResult<Vec<_>>>()?;
                let loci: Loci = visited.iter().cloned().collect();
                PredicateState::basic_with_loci(data, loci)
            }
            StateExt::Chain { base, curr } => {
                let base = self.state(base)?;
                let curr = self.state(curr)?;
                PredicateState::chain(&base, &curr)
            }
            StateExt::Choice { choices } => PredicateState::choice(
                choices
                    .iter()
                    .map(|c| self.state(c))
                    .collect::<WireResult<Vec<_>>>()?,
            ),
        };
        Ok(res)
    }
}
