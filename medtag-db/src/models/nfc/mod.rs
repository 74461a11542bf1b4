pub mod tag;
pub mod access_log;
pub mod emergency_access;

pub use tag::*;
pub use access_log::*;
pub use emergency_access::*;
