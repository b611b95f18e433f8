//! Symbolic memory
//!
//! A `MemArray` is an array from 64-bit element addresses to 64-bit cells.
//! Values are immutable: `store` returns a new array and leaves the old one
//! untouched, so an execution context can keep both the initial and the
//! current memory of a memspace.

use super::expr::{mask, ExprContext, ExprId, Sort};
use super::logic::{Bool, DynBitVector};

/// Width of addresses and cells
pub const CELL_BITS: u32 = 64;

/// Byte every unwritten cell is filled with unless memory is unconstrained
pub const DEFAULT_BYTE: u8 = 0xFF;

/// Cell value made of `DEFAULT_BYTE` repeated
pub fn default_cell() -> u128 {
    let byte = DEFAULT_BYTE as u128;
    (0..CELL_BITS / 8).fold(0u128, |acc, _| (acc << 8) | byte) & mask(CELL_BITS)
}

#[derive(Debug, Clone, Copy)]
pub struct MemArray<'c> {
    ctx: &'c ExprContext,
    array: ExprId,
}

impl<'c> MemArray<'c> {
    pub fn sort() -> Sort {
        Sort::Array {
            index: CELL_BITS,
            element: CELL_BITS,
        }
    }

    pub fn from_expr(ctx: &'c ExprContext, array: ExprId) -> Self {
        Self { ctx, array }
    }

    /// Every cell holds `value`
    pub fn filled(ctx: &'c ExprContext, value: u128) -> Self {
        let cell = ctx.bv_const(value, CELL_BITS);
        Self {
            ctx,
            array: ctx.const_array(CELL_BITS, cell),
        }
    }

    /// Memory nothing has been written to
    ///
    /// Cells read as `DEFAULT_BYTE` repeated, or as unconstrained values when
    /// `unknown` is set.
    pub fn empty(ctx: &'c ExprContext, name: &str, unknown: bool) -> Self {
        if unknown {
            Self::free(ctx, name)
        } else {
            Self::filled(ctx, default_cell())
        }
    }

    /// Array with no constraints at all
    pub fn free(ctx: &'c ExprContext, name: &str) -> Self {
        Self {
            ctx,
            array: ctx.var(name, Self::sort()),
        }
    }

    pub fn expr(&self) -> ExprId {
        self.array
    }

    /// Cell at `index`, resized to `width` by truncation
    pub fn load(&self, index: DynBitVector<'c>, width: u32) -> DynBitVector<'c> {
        let index = index.resize(CELL_BITS, false);
        let cell = self.ctx.select(self.array, index.expr());
        DynBitVector::new(self.ctx, cell, index.axiom()).resize(width, false)
    }

    /// New array with `value` at `index`; axioms of both go to the caller
    pub fn store(&self, index: DynBitVector<'c>, value: DynBitVector<'c>) -> Self {
        let index = index.resize(CELL_BITS, false);
        let value = value.resize(CELL_BITS, false);
        Self {
            ctx: self.ctx,
            array: self.ctx.store(self.array, index.expr(), value.expr()),
        }
    }

    /// New array with `value` in `size` cells starting at `from`
    pub fn store_range(&self, from: DynBitVector<'c>, size: u64, value: DynBitVector<'c>) -> Self {
        let from = from.resize(CELL_BITS, false);
        let value = value.resize(CELL_BITS, false);
        Self {
            ctx: self.ctx,
            array: self
                .ctx
                .range_store(self.array, from.expr(), size, value.expr()),
        }
    }

    /// `cases[0].1` if `cases[0].0`, then the next case, else `default`
    pub fn merge(default: MemArray<'c>, cases: &[(Bool<'c>, MemArray<'c>)]) -> MemArray<'c> {
        let ctx = default.ctx;
        let array = cases
            .iter()
            .rev()
            .fold(default.array, |acc, (guard, mem)| {
                ctx.ite(guard.expr(), mem.array, acc)
            });
        MemArray { ctx, array }
    }

    pub fn same_as(&self, other: &MemArray<'c>) -> bool {
        self.array == other.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cell_is_all_ff() {
        assert_eq!(default_cell(), 0xFFFF_FFFF_FFFF_FFFF);
    }

    #[test]
    fn test_store_is_functional() {
        let ctx = ExprContext::new();
        let empty = MemArray::empty(&ctx, "mem", false);
        let p = DynBitVector::constant(&ctx, 16, 64);
        let v = DynBitVector::constant(&ctx, 7, 64);
        let written = empty.store(p, v);
        assert!(!written.same_as(&empty));
        assert_eq!(written.load(p, 64).as_const(), Some(7));
        assert_eq!(empty.load(p, 64).as_const(), Some(default_cell()));
        // narrow loads truncate
        assert_eq!(empty.load(p, 8).as_const(), Some(0xFF));
    }

    #[test]
    fn test_merge_builds_guarded_chain() {
        let ctx = ExprContext::new();
        let base = MemArray::empty(&ctx, "mem", true);
        let g = Bool::var(&ctx, "g");
        let p = DynBitVector::constant(&ctx, 1, 64);
        let v = DynBitVector::constant(&ctx, 2, 64);
        let branch = base.store(p, v);
        let merged = MemArray::merge(base, &[(g, branch)]);
        assert_eq!(merged.expr(), ctx.ite(g.expr(), branch.expr(), base.expr()));
        assert!(MemArray::merge(base, &[]).same_as(&base));
    }
}
