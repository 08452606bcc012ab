/// Index of an entity inside a [`crate::World`].
///
/// Entities are never despawned within a run, so a plain index is stable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(&self) -> u32 {
        self.0
    }
}
