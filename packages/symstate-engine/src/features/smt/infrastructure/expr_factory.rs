//! ExprFactory
//!
//! Typed constructors for the values the encoder needs: pointer and integer
//! constants, variables sized after term types, the null / invalid pointer
//! sentinels and initial memory arrays.

use crate::features::smt::domain::expr::{mask, ExprContext, Sort};
use crate::features::smt::domain::logic::{Bool, DynBitVector, Dynamic, Pointer};
use crate::features::smt::domain::mem_array::MemArray;
use crate::features::term_algebra::infrastructure::type_factory::POINTER_BITS;
use crate::features::term_algebra::{Type, TypeFactory, TypeId};

#[derive(Debug, Clone, Copy)]
pub struct ExprFactory<'c> {
    ctx: &'c ExprContext,
}

impl<'c> ExprFactory<'c> {
    pub fn new(ctx: &'c ExprContext) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &'c ExprContext {
        self.ctx
    }

    /// Bit width a term of type `ty` is encoded with
    ///
    /// Types without a scalar encoding (records, functions, unknown) are
    /// treated as pointer-sized.
    pub fn size_for_type(types: &TypeFactory, ty: TypeId) -> u32 {
        types.bitsize(ty).unwrap_or(POINTER_BITS)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Constants
    // ═══════════════════════════════════════════════════════════════════════

    pub fn bool_const(&self, value: bool) -> Bool<'c> {
        Bool::constant(self.ctx, value)
    }

    pub fn int_const(&self, value: i64, width: u32) -> DynBitVector<'c> {
        DynBitVector::signed(self.ctx, value, width)
    }

    pub fn ptr_const(&self, value: u64) -> DynBitVector<'c> {
        DynBitVector::constant(self.ctx, value as u128, POINTER_BITS)
    }

    pub fn null_ptr(&self) -> DynBitVector<'c> {
        self.ptr_const(0)
    }

    /// All-ones pointer every failed GEP collapses to
    pub fn invalid_ptr(&self) -> DynBitVector<'c> {
        DynBitVector::constant(self.ctx, mask(POINTER_BITS), POINTER_BITS)
    }

    pub fn is_invalid_ptr(&self, p: DynBitVector<'c>) -> Bool<'c> {
        let p = p.resize(POINTER_BITS, false);
        p.eq(self.invalid_ptr()) | p.eq(self.null_ptr())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════════

    /// Free variable encoding a term named `name` of type `ty`
    pub fn var_for_type(&self, types: &TypeFactory, ty: TypeId, name: &str) -> Dynamic<'c> {
        match types.get(ty) {
            Type::Bool => Dynamic::Bool(Bool::var(self.ctx, name)),
            _ => Dynamic::BitVector(DynBitVector::var(
                self.ctx,
                name,
                Self::size_for_type(types, ty),
            )),
        }
    }

    pub fn ptr_var(&self, name: &str) -> Pointer<'c> {
        Pointer::var(self.ctx, name)
    }

    pub fn fresh_bool(&self, prefix: &str) -> Bool<'c> {
        Bool::fresh(self.ctx, prefix)
    }

    pub fn sort_for_type(types: &TypeFactory, ty: TypeId) -> Sort {
        match types.get(ty) {
            Type::Bool => Sort::Bool,
            _ => Sort::BitVec(Self::size_for_type(types, ty)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Memory
    // ═══════════════════════════════════════════════════════════════════════

    /// Memory nothing has been written to yet
    pub fn no_memory_array(&self, id: &str, unknown: bool) -> MemArray<'c> {
        MemArray::empty(self.ctx, id, unknown)
    }

    /// Memory with every cell set to `value`
    pub fn default_memory_array(&self, value: u128) -> MemArray<'c> {
        MemArray::filled(self.ctx, value)
    }

    /// Unconstrained memory
    pub fn empty_memory_array(&self, id: &str) -> MemArray<'c> {
        MemArray::free(self.ctx, id)
    }
}
