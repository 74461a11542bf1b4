use super::index::Index;

/// Trait for types that maintain a companion index record for hashed
/// natural-key lookups
pub trait IndexAware {
    /// The associated index type this type can be converted to
    type IndexType: Index;

    /// Builds the index record for this entity
    fn to_index(&self) -> Self::IndexType;
}
