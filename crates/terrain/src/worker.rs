use terrascape_common::TileCoordinates;

use crate::error::TerrainError;
use crate::terrain::Terrain;

/// Whether a worker needs access to surrounding tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    ContextFree,
    ContextAware,
}

/// Read access to the tiles around the one being generated.
///
/// Lookups never trigger generation. When a tile registered a partial state
/// at the current stage, that state is returned instead of the finished tile.
pub trait TerrainWorkerContext {
    /// Key of the tile being generated.
    fn key(&self) -> TileCoordinates;

    /// Same-level tile at offset `(dx, dy)`, if it already exists and shares
    /// this tile's parent.
    fn neighbour(&self, dx: i32, dy: i32) -> Option<&Terrain>;

    fn parent(&self) -> Option<&Terrain>;

    /// Number of ancestors, equal to the tile's level.
    fn parent_count(&self) -> i32;

    /// Ask for the tile's state to be snapshotted once the current stage
    /// finishes.
    fn register_current_state(&mut self);
}

/// One stage of the tile generation pipeline.
pub trait TerrainWorker {
    fn mode(&self) -> WorkerMode;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Transform `terrain` in place. `context` is `Some` exactly when
    /// [`mode`](Self::mode) is [`WorkerMode::ContextAware`].
    fn process(
        &mut self,
        terrain: &mut Terrain,
        context: Option<&mut dyn TerrainWorkerContext>,
    ) -> Result<(), TerrainError>;
}
