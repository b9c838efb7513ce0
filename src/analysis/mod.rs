//! Exploratory analysis: STL decomposition and seasonal views
pub mod explorer;
pub mod stl;

pub use explorer::*;
pub use stl::*;
