use std::fmt;
use std::sync::Arc;

use terrascape_common::GridCoordinate;

/// Hierarchical chunk identifier: the parent key plus this level's local uid.
///
/// Equality, hashing and ordering walk the whole ancestor path, so two chunks
/// with the same local coordinates under different parents never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    parent: Option<Arc<ChunkKey>>,
    local: u128,
}

impl ChunkKey {
    /// Key of `coords` under `parent` (`None` for the root level).
    pub fn new(parent: Option<&ChunkKey>, coords: &GridCoordinate) -> Self {
        Self {
            parent: parent.map(|p| Arc::new(p.clone())),
            local: coords.uid(),
        }
    }

    pub fn parent(&self) -> Option<&ChunkKey> {
        self.parent.as_deref()
    }

    /// Local coordinates encoded in this key.
    pub fn local(&self) -> GridCoordinate {
        GridCoordinate::from_uid(self.local)
    }

    /// Number of keys on the path, this one included.
    pub fn depth(&self) -> usize {
        1 + self.parent().map_or(0, ChunkKey::depth)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent}/")?;
        }
        write!(f, "{}", self.local())
    }
}
