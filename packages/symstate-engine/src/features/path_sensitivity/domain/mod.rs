//! Path-sensitivity domain

pub mod inputs;

pub use inputs::PsaInputs;
