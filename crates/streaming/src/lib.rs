pub mod error;
pub mod registry;
pub mod residency;
pub mod source;

pub use error::*;
pub use registry::*;
pub use residency::*;
pub use source::*;
