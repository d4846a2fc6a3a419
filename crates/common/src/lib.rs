//! Shared grid coordinates and scalar helpers.
//!
//! # Invariants
//! - `GridCoordinate::uid` is injective over (lod, x, y, z).
//! - `TileCoordinates` order is total and deterministic (lod first).

pub mod math;
pub mod types;

pub use types::{GridCoordinate, TileCoordinates};
