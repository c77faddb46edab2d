//! Re-export public algorithms.

pub mod communicator;
pub mod consolidate;
pub mod wire;

pub use consolidate::Consolidator;
