//! Path-sensitivity algorithms

pub(crate) mod common;
pub mod one_for_all;
pub mod one_for_all_td;
pub mod one_for_one;
pub mod structural_oracle;

pub use one_for_all::OneForAll;
pub use one_for_all_td::OneForAllTd;
pub use one_for_one::OneForOne;
pub use structural_oracle::StructuralOracle;
