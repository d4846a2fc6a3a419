use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Geometric envelope of one cell of the hierarchy.
///
/// The offset is relative to the parent chunk (absolute for LOD 0). The
/// resolution limits bound the detail size, in samples per metre, of content
/// that belongs in this chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    offset: DVec3,
    size: DVec3,
    min_resolution: f64,
    max_resolution: f64,
}

impl Chunk {
    pub fn new(offset: DVec3, size: DVec3) -> Self {
        Self {
            offset,
            size,
            min_resolution: 0.0,
            max_resolution: f64::INFINITY,
        }
    }

    pub fn set_resolution_limits(&mut self, min: f64, max: f64) {
        self.min_resolution = min;
        self.max_resolution = max;
    }

    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    pub fn size(&self) -> DVec3 {
        self.size
    }

    pub fn min_resolution(&self) -> f64 {
        self.min_resolution
    }

    pub fn max_resolution(&self) -> f64 {
        self.max_resolution
    }
}

/// Per-level metadata: chunk dimensions and the max-resolution threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodData {
    pub chunk_size: DVec3,
    pub max_resolution: f64,
}

impl LodData {
    pub fn new(chunk_size: DVec3, max_resolution: f64) -> Self {
        Self {
            chunk_size,
            max_resolution,
        }
    }
}
