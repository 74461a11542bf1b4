pub mod identifiable;
pub mod index;
pub mod indexable;
pub mod nfc;
pub mod audit;

// Re-exports
pub use identifiable::*;
pub use index::*;
pub use indexable::*;
pub use nfc::*;
pub use audit::*;
