use std::collections::BTreeMap;
use std::fmt;

use terrascape_common::TileCoordinates;

use crate::terrain::{Terrain, TerrainMesh};
use crate::texmap::TerrainTexture;

/// Kind of item pushed into a [`Collector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Terrain,
    Mesh,
    Texture,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Terrain, Channel::Mesh, Channel::Texture];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Terrain => "terrain",
            Channel::Mesh => "mesh",
            Channel::Texture => "texture",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub channel: Channel,
    pub tile: TileCoordinates,
}

impl ItemKey {
    pub fn new(channel: Channel, tile: TileCoordinates) -> Self {
        Self { channel, tile }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{},{}",
            self.channel, self.tile.lod, self.tile.pos.x, self.tile.pos.y
        )
    }
}

/// Receiver of generated tile content.
pub trait Collector {
    /// Items on channels a collector does not want are never built.
    fn wants(&self, _channel: Channel) -> bool {
        true
    }

    fn put_terrain(&mut self, key: ItemKey, terrain: &Terrain);

    fn put_mesh(&mut self, key: ItemKey, mesh: TerrainMesh);

    fn put_texture(&mut self, key: ItemKey, texture: TerrainTexture);
}

/// Collector keeping every item in memory, ordered by key.
#[derive(Debug, Default)]
pub struct MemoryCollector {
    channels: Option<Vec<Channel>>,
    pub terrains: BTreeMap<ItemKey, Terrain>,
    pub meshes: BTreeMap<ItemKey, TerrainMesh>,
    pub textures: BTreeMap<ItemKey, TerrainTexture>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector accepting only the given channels.
    pub fn only(channels: &[Channel]) -> Self {
        Self {
            channels: Some(channels.to_vec()),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.terrains.len() + self.meshes.len() + self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All item keys, terrain first, then meshes, then textures.
    pub fn keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.terrains
            .keys()
            .chain(self.meshes.keys())
            .chain(self.textures.keys())
    }
}

impl Collector for MemoryCollector {
    fn wants(&self, channel: Channel) -> bool {
        self.channels
            .as_ref()
            .is_none_or(|channels| channels.contains(&channel))
    }

    fn put_terrain(&mut self, key: ItemKey, terrain: &Terrain) {
        self.terrains.insert(key, terrain.clone());
    }

    fn put_mesh(&mut self, key: ItemKey, mesh: TerrainMesh) {
        self.meshes.insert(key, mesh);
    }

    fn put_texture(&mut self, key: ItemKey, texture: TerrainTexture) {
        self.textures.insert(key, texture);
    }
}
