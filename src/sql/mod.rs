//! Safe SQL builder: identifiers quoted from the catalog, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
