pub mod forecast;
pub mod observation;
pub mod types;

pub use forecast::*;
pub use observation::*;
pub use types::*;
