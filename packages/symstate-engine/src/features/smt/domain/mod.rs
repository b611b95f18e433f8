//! SMT domain: expressions, typed values, memory, verdicts

pub mod expr;
pub mod logic;
pub mod mem_array;
pub mod result;

pub use expr::{BvBinaryOp, BvCmpOp, BvUnaryOp, ExprContext, ExprId, Op, Sort};
pub use logic::{BitVector, Bool, DynBitVector, Dynamic, Pointer};
pub use mem_array::MemArray;
pub use result::{MemoryShape, ModelValue, SatResult, SmtResult};
