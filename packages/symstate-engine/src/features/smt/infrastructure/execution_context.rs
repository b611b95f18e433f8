//! ExecutionContext
//!
//! Symbolic machine state threaded through the encoding of one predicate
//! state: the current and initial contents of every memory array, the
//! allocation counters and the axioms collected along the way.
//!
//! Arrays are values; writes replace the current array of a key and leave
//! the initial one alone. Cloning a context is cheap and is how Choice
//! branches get their own copy before `switch_on` merges them back.

use super::expr_factory::ExprFactory;
use crate::config::SmtConfig;
use crate::features::smt::domain::expr::{ExprContext, ExprId};
use crate::features::smt::domain::logic::{Bool, DynBitVector};
use crate::features::smt::domain::mem_array::{MemArray, CELL_BITS};
use crate::features::term_algebra::infrastructure::type_factory::POINTER_BITS;
use std::collections::BTreeMap;
use std::fmt;

/// Which array a read or write goes to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrayKey {
    /// Main memory of a memspace
    Memory(u32),
    /// Allocation bound of every pointer
    Bounds,
    /// Per-pointer property cells
    Property(String),
}

impl ArrayKey {
    pub fn name(&self) -> String {
        match self {
            ArrayKey::Memory(space) => format!("$$memory$${}", space),
            ArrayKey::Bounds => "$$gep_bound$$".to_string(),
            ArrayKey::Property(name) => format!("$$property$${}", name),
        }
    }
}

/// Lifetime-free copy of a context, valid against the `ExprContext` it was
/// taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    current: BTreeMap<ArrayKey, ExprId>,
    initial: BTreeMap<ArrayKey, ExprId>,
    global_ptr: u64,
    local_ptr: u64,
    memory_start: u64,
    memory_end: u64,
    axioms: Vec<ExprId>,
    unknown_memory: bool,
    craig_colton: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutionContext<'c> {
    ef: ExprFactory<'c>,
    current: BTreeMap<ArrayKey, MemArray<'c>>,
    initial: BTreeMap<ArrayKey, MemArray<'c>>,
    global_ptr: u64,
    local_ptr: u64,
    memory_start: u64,
    memory_end: u64,
    axioms: Vec<ExprId>,
    unknown_memory: bool,
    craig_colton: bool,
}

impl<'c> ExecutionContext<'c> {
    pub fn new(ctx: &'c ExprContext, config: &SmtConfig, memory_start: u64, memory_end: u64) -> Self {
        let mut res = Self {
            ef: ExprFactory::new(ctx),
            current: BTreeMap::new(),
            initial: BTreeMap::new(),
            global_ptr: 1,
            local_ptr: memory_start,
            memory_start,
            memory_end,
            axioms: Vec::new(),
            unknown_memory: config.memory_defaults_to_unknown,
            craig_colton: config.craig_colton_bounds,
        };
        res.init_bounds();
        res
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let ids = |m: &BTreeMap<ArrayKey, MemArray<'c>>| {
            m.iter().map(|(k, v)| (k.clone(), v.expr())).collect()
        };
        ContextSnapshot {
            current: ids(&self.current),
            initial: ids(&self.initial),
            global_ptr: self.global_ptr,
            local_ptr: self.local_ptr,
            memory_start: self.memory_start,
            memory_end: self.memory_end,
            axioms: self.axioms.clone(),
            unknown_memory: self.unknown_memory,
            craig_colton: self.craig_colton,
        }
    }

    pub fn restore(ctx: &'c ExprContext, snapshot: &ContextSnapshot) -> Self {
        let arrays = |m: &BTreeMap<ArrayKey, ExprId>| {
            m.iter()
                .map(|(k, v)| (k.clone(), MemArray::from_expr(ctx, *v)))
                .collect()
        };
        Self {
            ef: ExprFactory::new(ctx),
            current: arrays(&snapshot.current),
            initial: arrays(&snapshot.initial),
            global_ptr: snapshot.global_ptr,
            local_ptr: snapshot.local_ptr,
            memory_start: snapshot.memory_start,
            memory_end: snapshot.memory_end,
            axioms: snapshot.axioms.clone(),
            unknown_memory: snapshot.unknown_memory,
            craig_colton: snapshot.craig_colton,
        }
    }

    fn init_bounds(&mut self) {
        let bounds = if self.craig_colton {
            self.ef.default_memory_array(0)
        } else {
            self.ef.empty_memory_array(&ArrayKey::Bounds.name())
        };
        self.initial.insert(ArrayKey::Bounds, bounds);
        let minus_one = self.ef.int_const(-1, CELL_BITS);
        let bounds = bounds.store(self.ef.null_ptr(), minus_one);
        self.current.insert(ArrayKey::Bounds, bounds);
    }

    pub fn factory(&self) -> ExprFactory<'c> {
        self.ef
    }

    pub fn ctx(&self) -> &'c ExprContext {
        self.ef.ctx()
    }

    /// `[start, end)` range local allocations are drawn from
    pub fn local_memory_bounds(&self) -> (u64, u64) {
        (self.memory_start, self.memory_end)
    }

    pub fn axioms(&self) -> &[ExprId] {
        &self.axioms
    }

    /// Conjunction of the collected axioms
    pub fn to_smt(&self) -> Bool<'c> {
        let ctx = self.ctx();
        Bool::from_expr(ctx, ctx.and(self.axioms.clone()))
    }

    pub fn add_axiom(&mut self, axiom: ExprId) {
        if self.ctx().as_bool(axiom) != Some(true) && !self.axioms.contains(&axiom) {
            self.axioms.push(axiom);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Arrays
    // ═══════════════════════════════════════════════════════════════════════

    fn get(&mut self, key: &ArrayKey) -> MemArray<'c> {
        if let Some(mem) = self.current.get(key) {
            return *mem;
        }
        let mem = self.ef.no_memory_array(&key.name(), self.unknown_memory);
        self.current.insert(key.clone(), mem);
        self.initial.insert(key.clone(), mem);
        mem
    }

    fn set(&mut self, key: ArrayKey, mem: MemArray<'c>) {
        self.current.insert(key, mem);
    }

    pub fn current_memory(&mut self, memspace: u32) -> MemArray<'c> {
        self.get(&ArrayKey::Memory(memspace))
    }

    pub fn initial_memory(&mut self, memspace: u32) -> MemArray<'c> {
        let key = ArrayKey::Memory(memspace);
        let current = self.get(&key);
        self.initial.get(&key).copied().unwrap_or(current)
    }

    pub fn current_bounds(&mut self) -> MemArray<'c> {
        self.get(&ArrayKey::Bounds)
    }

    /// Every array touched so far with its initial and current value
    pub fn arrays(&self) -> Vec<(ArrayKey, MemArray<'c>, MemArray<'c>)> {
        self.current
            .iter()
            .map(|(key, cur)| {
                let init = self.initial.get(key).copied().unwrap_or(*cur);
                (key.clone(), init, *cur)
            })
            .collect()
    }

    pub fn read_memory(&mut self, memspace: u32, ix: DynBitVector<'c>, width: u32) -> DynBitVector<'c> {
        self.current_memory(memspace).load(ix, width)
    }

    pub fn write_memory(&mut self, memspace: u32, ix: DynBitVector<'c>, value: DynBitVector<'c>) {
        let mem = self.current_memory(memspace).store(ix, value);
        self.add_axiom(value.axiom());
        self.set(ArrayKey::Memory(memspace), mem);
    }

    pub fn write_memory_range(&mut self, memspace: u32, from: DynBitVector<'c>, size: u64, value: DynBitVector<'c>) {
        let mem = self.current_memory(memspace).store_range(from, size, value);
        self.add_axiom(value.axiom());
        self.set(ArrayKey::Memory(memspace), mem);
    }

    pub fn read_property(&mut self, name: &str, ix: DynBitVector<'c>, width: u32) -> DynBitVector<'c> {
        self.get(&ArrayKey::Property(name.to_string())).load(ix, width)
    }

    pub fn write_property(&mut self, name: &str, ix: DynBitVector<'c>, value: DynBitVector<'c>) {
        let key = ArrayKey::Property(name.to_string());
        let mem = self.get(&key).store(ix, value);
        self.add_axiom(value.axiom());
        self.set(key, mem);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════════════════

    /// Fresh global pointer spanning `size` elements
    pub fn global_ptr(&mut self, size: u64, orig_size: Option<DynBitVector<'c>>) -> DynBitVector<'c> {
        let ret = self.ef.ptr_const(self.global_ptr);
        self.global_ptr += size.max(1);
        let bound = orig_size.unwrap_or_else(|| self.ef.int_const(size as i64, POINTER_BITS));
        self.write_bound(ret, bound);
        ret
    }

    /// Fresh local pointer spanning `size` elements
    pub fn local_ptr(&mut self, size: u64, orig_size: Option<DynBitVector<'c>>) -> DynBitVector<'c> {
        let ret = self.ef.ptr_const(self.local_ptr);
        self.local_ptr += size.max(1);
        let bound = orig_size.unwrap_or_else(|| self.ef.int_const(size as i64, POINTER_BITS));
        self.write_bound(ret, bound);
        ret
    }

    /// Allocation bound of `p` in elements
    pub fn get_bound(&mut self, p: DynBitVector<'c>, width: u32) -> DynBitVector<'c> {
        self.current_bounds().load(p, width)
    }

    pub fn write_bound(&mut self, p: DynBitVector<'c>, bound: DynBitVector<'c>) {
        if self.craig_colton {
            let bounds = self.current_bounds().store(p, bound);
            self.add_axiom(bound.axiom());
            self.set(ArrayKey::Bounds, bounds);
        } else {
            let stored = self.get_bound(p, bound.width());
            self.add_axiom(stored.eq(bound).as_axiom());
        }
    }

    /// Write a bound only where `p` is a valid pointer
    pub fn write_bound_if_valid(&mut self, p: DynBitVector<'c>, bound: DynBitVector<'c>) {
        if self.craig_colton {
            self.write_bound(p, bound);
            return;
        }
        let stored = self.get_bound(p, bound.width());
        let valid = !self.ef.is_invalid_ptr(p);
        self.add_axiom(valid.implies(stored.eq(bound)).as_axiom());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Choice
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace this context with the merge of `choices`
    ///
    /// Each choice is the guard of an alternative with the context its
    /// encoding produced (cloned from `self` before encoding). Memory becomes
    /// an `ite` over the guards, the allocation counters take the maximum and
    /// every axiom an alternative added on its own holds under its guard.
    pub fn switch_on(&mut self, choices: &[(Bool<'c>, ExecutionContext<'c>)]) {
        let merged = Self::merge(self, choices);
        *self = merged;
    }

    pub fn merge(default: &ExecutionContext<'c>, choices: &[(Bool<'c>, ExecutionContext<'c>)]) -> Self {
        let mut res = default.clone();
        let ctx = default.ctx();
        for (_, alt) in choices {
            res.global_ptr = res.global_ptr.max(alt.global_ptr);
            res.local_ptr = res.local_ptr.max(alt.local_ptr);
        }

        let mut keys: Vec<ArrayKey> = default.current.keys().cloned().collect();
        for (_, alt) in choices {
            keys.extend(alt.current.keys().cloned());
        }
        keys.sort();
        keys.dedup();

        for key in keys {
            let base = res.get(&key);
            let alternatives: Vec<(Bool<'c>, MemArray<'c>)> = choices
                .iter()
                .map(|(guard, alt)| {
                    let mem = alt.current.get(&key).copied().unwrap_or(base);
                    (*guard, mem)
                })
                .collect();
            if alternatives.iter().all(|(_, mem)| mem.same_as(&base)) {
                continue;
            }
            res.set(key.clone(), MemArray::merge(base, &alternatives));
            for (_, alt) in choices {
                if let Some(init) = alt.initial.get(&key) {
                    res.initial.entry(key.clone()).or_insert(*init);
                }
            }
        }

        let shared = default.axioms.len();
        for (guard, alt) in choices {
            let local: Vec<ExprId> = alt.axioms.iter().skip(shared).copied().collect();
            if local.is_empty() {
                continue;
            }
            let guarded = ctx.implies(guard.as_axiom(), ctx.and(local));
            res.add_axiom(guarded);
        }
        res
    }
}

impl fmt::Display for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ctx state:")?;
        writeln!(f, "< global offset = {} >", self.global_ptr)?;
        writeln!(f, "< local offset = {} >", self.local_ptr)?;
        for (key, mem) in &self.current {
            writeln!(f, "{} = {}", key.name(), self.ctx().display(mem.expr()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtConfig {
        SmtConfig::default()
    }

    #[test]
    fn test_pointers_are_bumped() {
        let ctx = ExprContext::new();
        let mut ec = ExecutionContext::new(&ctx, &config(), 1 << 24, 2 << 24);
        let a = ec.global_ptr(4, None);
        let b = ec.global_ptr(1, None);
        let l = ec.local_ptr(2, None);
        assert_eq!(a.as_const(), Some(1));
        assert_eq!(b.as_const(), Some(5));
        assert_eq!(l.as_const(), Some(1 << 24));
        assert_eq!(ec.local_memory_bounds(), (1 << 24, 2 << 24));
        // one bound axiom per allocation
        assert_eq!(ec.axioms().len(), 3);
    }

    #[test]
    fn test_writes_leave_initial_memory_alone() {
        let ctx = ExprContext::new();
        let mut ec = ExecutionContext::new(&ctx, &config(), 1 << 24, 2 << 24);
        let p = ec.factory().ptr_const(7);
        let v = ec.factory().int_const(3, 64);
        ec.write_memory(0, p, v);
        let init = ec.initial_memory(0);
        let cur = ec.current_memory(0);
        assert!(!init.same_as(&cur));
        assert_eq!(ec.read_memory(0, p, 64).as_const(), Some(3));
    }

    #[test]
    fn test_branch_axioms_are_guarded() {
        let ctx = ExprContext::new();
        let base = ExecutionContext::new(&ctx, &config(), 1 << 24, 2 << 24);
        let mut left = base.clone();
        left.local_ptr(1, None);
        let right = base.clone();
        let g1 = Bool::var(&ctx, "g1");
        let g2 = Bool::var(&ctx, "g2");
        let merged = ExecutionContext::merge(&base, &[(g1, left.clone()), (g2, right)]);
        assert_eq!(merged.local_ptr, left.local_ptr);
        assert_eq!(merged.axioms().len(), base.axioms().len() + 1);
    }

    #[test]
    fn test_snapshot_restores_memory() {
        let ctx = ExprContext::new();
        let mut ec = ExecutionContext::new(&ctx, &config(), 1 << 24, 2 << 24);
        let p = ec.local_ptr(2, None);
        let v = ec.factory().int_const(9, 64);
        ec.write_memory(0, p, v);
        let snapshot = ec.snapshot();
        let mut back = ExecutionContext::restore(&ctx, &snapshot);
        assert_eq!(back.read_memory(0, p, 64).as_const(), Some(9));
        assert_eq!(back.local_ptr(1, None).as_const(), Some((1 << 24) + 2));
        assert!(back.axioms().starts_with(&snapshot.axioms));
    }
}
