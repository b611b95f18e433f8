//! Feature slices
//!
//! ```text
//! features
//! ├── term_algebra       # Type / Term / Predicate arenas and factories
//! ├── predicate_state    # Basic / Chain / Choice trees, builder, transformers
//! ├── ir                 # IR input model, CFG and dominator utilities
//! ├── path_sensitivity   # OneForOne, OneForAll, OneForAllTD
//! ├── smt                # Expression DAG, memory model, backends, solver
//! └── serialization      # Wire schema and persistence side-channel
//! ```

pub mod ir;
pub mod path_sensitivity;
pub mod predicate_state;
pub mod serialization;
pub mod smt;
pub mod term_algebra;
