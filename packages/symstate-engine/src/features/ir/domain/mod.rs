//! IR domain models

pub mod function;

pub use function::{BasicBlock, Function, FunctionArgument, FunctionBuilder, InstKind, Instruction};
