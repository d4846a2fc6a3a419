//! LOD chunk hierarchy: hierarchical keys, lazily created chunks, zones.
//!
//! # Invariants
//! - Identical keys denote identical chunks; distinct parent chains never collide.
//! - Lookups create missing entries idempotently; only a children query expands.
//! - Expansion is irreversible and memoised.
//! - Resolution bands `[min(l), max(l))` partition `[0, inf)`.

mod chunk;
mod key;
mod system;
mod zone;

pub use chunk::{Chunk, LodData};
pub use key::ChunkKey;
pub use system::{ChunkError, ChunkSystemConfig, LodGridChunkSystem};
pub use zone::{Zone, ZoneView};

pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"))
}
