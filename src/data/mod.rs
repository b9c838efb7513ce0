//! Input side of the pipeline: loading, gap filling and derived series
pub mod features;
pub mod imputer;
pub mod loader;

pub use features::*;
pub use imputer::*;
pub use loader::*;
