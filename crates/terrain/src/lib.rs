//! Level-of-detail terrain tiles.
//!
//! [`Ground`] produces square heightfield tiles on demand by running a chain
//! of [`TerrainWorker`]s, caches them under an LRU bound and serves altitude
//! queries and zone collection on top of the cache.
//!
//! # Invariants
//! - A tile at level `L > 0` is only generated after its parent exists.
//! - Workers run in insertion order; context-aware workers see same-stage
//!   snapshots of other tiles before their finished state.
//! - Context lookups never generate tiles.
//! - Heights are normalised to `[0, 1]` and mapped onto the configured
//!   altitude range by each tile's bounds.
//! - Eviction drops a tile together with its snapshots; a later request
//!   regenerates it, ancestors included.

mod collect;
mod config;
mod error;
mod ground;
mod terrain;
mod texmap;
mod worker;
pub mod workers;

pub use collect::{Channel, Collector, ItemKey, MemoryCollector};
pub use config::GroundConfig;
pub use error::TerrainError;
pub use ground::{CacheStats, Ground, TEXTURE_MAP_RESOLUTION};
pub use terrain::{StageSnapshots, Terrain, TerrainElement, TerrainMesh};
pub use texmap::{ColorPart, TerrainTexture, TexmapBuilder, TextureMap};
pub use worker::{TerrainWorker, TerrainWorkerContext, WorkerMode};
pub use workers::{NoiseWorker, ParentBlendWorker};

pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"))
}
