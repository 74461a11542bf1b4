pub mod context;
pub mod geo;
pub mod requests;
pub mod snapshot;

pub use context::*;
pub use geo::*;
pub use requests::*;
pub use snapshot::*;
