pub mod error;
pub mod geojson;
pub mod payload;

pub use error::*;
pub use geojson::*;
pub use payload::*;
