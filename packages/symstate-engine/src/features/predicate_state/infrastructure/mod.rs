//! State transformers

pub mod call_site;
pub mod cropper;
pub mod mark_eraser;
pub mod optimizer;
pub mod retyper;
pub mod transformer;

pub use call_site::CallSiteInitializer;
pub use cropper::Cropper;
pub use mark_eraser::MarkEraser;
pub use optimizer::StateOptimizer;
pub use retyper::Retyper;
pub use transformer::{walk_predicate, walk_state, walk_term, Transformer};
