//! PredicateState algebra
//!
//! The symbolic trace abstraction: Basic runs of predicates, sequential
//! Chains and Choices at merge points.
//!
//! ```text
//! predicate_state
//! ├── domain/
//! │   ├── state          # Arc-shared normalized tree
//! │   └── builder        # += / <<= folding, retyping build
//! └── infrastructure/
//!     ├── transformer    # rewrite hooks with default walks
//!     ├── retyper
//!     ├── call_site      # callee state instantiation
//!     ├── cropper        # prefix through a predicate
//!     ├── mark_eraser
//!     └── optimizer      # prefix hoisting, memoized
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{PredicateState, PredicateStateBuilder, StateNode};
pub use infrastructure::{
    CallSiteInitializer, Cropper, MarkEraser, Retyper, StateOptimizer, Transformer,
};
