//! SMT infrastructure: encoding and backends

pub mod encoder;
pub mod execution_context;
pub mod expr_factory;
pub mod solvers;
pub mod unlogic;

pub use encoder::{EncodeError, Encoder};
pub use execution_context::{ArrayKey, ContextSnapshot, ExecutionContext};
pub use expr_factory::ExprFactory;
pub use solvers::{backend_for, CheckOutcome, SmtBackend, SmtSession};
pub use unlogic::{undo_value, Unlogic};
