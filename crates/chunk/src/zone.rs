use std::fmt;

use glam::DVec3;
use terrascape_common::GridCoordinate;

use crate::chunk::Chunk;
use crate::key::ChunkKey;
use crate::system::{ChunkEntry, LodGridChunkSystem};

/// Handle naming one chunk of a [`LodGridChunkSystem`].
///
/// Zones are plain values: navigation goes through the owning system, either
/// mutably (neighbours, children) or through a [`ZoneView`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Zone {
    pub(crate) key: ChunkKey,
    coords: GridCoordinate,
}

impl Zone {
    pub(crate) fn new(key: ChunkKey, coords: GridCoordinate) -> Self {
        Self { key, coords }
    }

    pub fn key(&self) -> &ChunkKey {
        &self.key
    }

    /// Coordinates local to the parent chunk.
    pub fn coords(&self) -> GridCoordinate {
        self.coords
    }

    pub fn lod(&self) -> i32 {
        self.coords.lod
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Read-only view of a zone together with the system that owns it.
#[derive(Clone, Copy)]
pub struct ZoneView<'a> {
    system: &'a LodGridChunkSystem,
    key: &'a ChunkKey,
    entry: &'a ChunkEntry,
}

impl<'a> ZoneView<'a> {
    pub(crate) fn new(
        system: &'a LodGridChunkSystem,
        key: &'a ChunkKey,
        entry: &'a ChunkEntry,
    ) -> Self {
        Self { system, key, entry }
    }

    /// Owned handle for this view.
    pub fn zone(&self) -> Zone {
        Zone::new(self.key.clone(), self.entry.coords)
    }

    pub fn key(&self) -> &'a ChunkKey {
        self.key
    }

    pub fn coords(&self) -> GridCoordinate {
        self.entry.coords
    }

    pub fn lod(&self) -> i32 {
        self.entry.coords.lod
    }

    pub fn chunk(&self) -> &'a Chunk {
        &self.entry.chunk
    }

    pub fn has_parent(&self) -> bool {
        self.entry.parent.is_some()
    }

    pub fn parent(&self) -> Option<ZoneView<'a>> {
        let parent = self.entry.parent.as_ref()?;
        let (key, entry) = self.system.entry_by_key(parent)?;
        Some(ZoneView::new(self.system, key, entry))
    }

    /// Number of chunks materialised below this one (0 until expanded).
    pub fn child_count(&self) -> usize {
        self.entry.children.len()
    }

    /// World-space offset: the chunk offsets summed along the ancestor chain.
    pub fn absolute_offset(&self) -> DVec3 {
        let mut offset = self.entry.chunk.offset();
        let mut current = self.parent();
        while let Some(view) = current {
            offset += view.chunk().offset();
            current = view.parent();
        }
        offset
    }

    pub fn dimensions(&self) -> DVec3 {
        self.entry.chunk.size()
    }

    pub fn min_resolution(&self) -> f64 {
        self.entry.chunk.min_resolution()
    }

    pub fn max_resolution(&self) -> f64 {
        self.entry.chunk.max_resolution()
    }
}

impl fmt::Debug for ZoneView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneView")
            .field("key", self.key)
            .field("chunk", &self.entry.chunk)
            .finish()
    }
}
