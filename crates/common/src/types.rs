use std::cmp::Ordering;
use std::fmt;

use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Integer grid position plus level of detail.
///
/// Used by the chunk hierarchy, where the position is local to the parent
/// chunk for every level above 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoordinate {
    pub pos: IVec3,
    pub lod: i32,
}

impl GridCoordinate {
    pub fn new(x: i32, y: i32, z: i32, lod: i32) -> Self {
        Self {
            pos: IVec3::new(x, y, z),
            lod,
        }
    }

    pub fn from_pos(pos: IVec3, lod: i32) -> Self {
        Self { pos, lod }
    }

    /// Injective 128-bit encoding of the coordinate.
    ///
    /// Layout, high to low: lod, x, y, z, 32 bits each (two's complement).
    pub fn uid(&self) -> u128 {
        ((self.lod as u32 as u128) << 96)
            | ((self.pos.x as u32 as u128) << 64)
            | ((self.pos.y as u32 as u128) << 32)
            | (self.pos.z as u32 as u128)
    }

    /// Inverse of [`GridCoordinate::uid`].
    pub fn from_uid(uid: u128) -> Self {
        Self::new(
            (uid >> 64) as u32 as i32,
            (uid >> 32) as u32 as i32,
            uid as u32 as i32,
            (uid >> 96) as u32 as i32,
        )
    }

    /// Same LOD, position shifted by `direction`.
    pub fn offset(&self, direction: IVec3) -> Self {
        Self {
            pos: self.pos + direction,
            lod: self.lod,
        }
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lod{}({},{},{})",
            self.lod, self.pos.x, self.pos.y, self.pos.z
        )
    }
}

/// Absolute tile address: position + LOD. Key type of `GridStorage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoordinates {
    pub pos: IVec3,
    pub lod: i32,
}

impl TileCoordinates {
    pub fn new(x: i32, y: i32, z: i32, lod: i32) -> Self {
        Self {
            pos: IVec3::new(x, y, z),
            lod,
        }
    }

    /// 2D tile (z = 0), the form used by heightfield tiles.
    pub fn flat(x: i32, y: i32, lod: i32) -> Self {
        Self::new(x, y, 0, lod)
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            pos: self.pos + IVec3::new(dx, dy, 0),
            lod: self.lod,
        }
    }
}

impl Ord for TileCoordinates {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.lod, self.pos.x, self.pos.y, self.pos.z).cmp(&(
            other.lod,
            other.pos.x,
            other.pos.y,
            other.pos.z,
        ))
    }
}

impl PartialOrd for TileCoordinates {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{},{},{}",
            self.lod, self.pos.x, self.pos.y, self.pos.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_round_trips_negative_coordinates() {
        let c = GridCoordinate::new(-1, 7, i32::MIN, 3);
        assert_eq!(GridCoordinate::from_uid(c.uid()), c);
    }

    #[test]
    fn uid_distinguishes_axes() {
        let a = GridCoordinate::new(1, 0, 0, 1);
        let b = GridCoordinate::new(0, 1, 0, 1);
        let c = GridCoordinate::new(0, 0, 1, 1);
        let d = GridCoordinate::new(0, 0, 0, 2);
        let uids = [a.uid(), b.uid(), c.uid(), d.uid()];
        for i in 0..uids.len() {
            for j in (i + 1)..uids.len() {
                assert_ne!(uids[i], uids[j]);
            }
        }
    }

    #[test]
    fn tile_coordinates_order_by_lod_first() {
        let coarse = TileCoordinates::flat(100, 100, 0);
        let fine = TileCoordinates::flat(-5, -5, 1);
        assert!(coarse < fine);
    }

    #[test]
    fn tile_offset_keeps_lod() {
        let t = TileCoordinates::flat(2, 3, 1).offset(-1, 1);
        assert_eq!(t, TileCoordinates::flat(1, 4, 1));
    }
}
