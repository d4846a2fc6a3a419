use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use terrascape_common::math::lerp;

/// Square heightfield of normalised heights in `[0, 1]`.
///
/// Heights are stored row-major (`y * resolution + x`). The bounds map the
/// grid onto world space: `(u, v)` in `[0, 1]^2` covers `offset.xy ..
/// offset.xy + size.xy`, and a height `h` sits at altitude
/// `offset.z + h * size.z`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    resolution: usize,
    heights: Vec<f64>,
    offset: DVec3,
    size: DVec3,
}

impl Terrain {
    /// Flat terrain covering the unit square.
    pub fn new(resolution: usize) -> Self {
        Self {
            resolution,
            heights: vec![0.0; resolution * resolution],
            offset: DVec3::ZERO,
            size: DVec3::ONE,
        }
    }

    pub fn with_bounds(resolution: usize, offset: DVec3, size: DVec3) -> Self {
        let mut terrain = Self::new(resolution);
        terrain.set_bounds(offset, size);
        terrain
    }

    pub fn set_bounds(&mut self, offset: DVec3, size: DVec3) {
        self.offset = offset;
        self.size = size;
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    pub fn size(&self) -> DVec3 {
        self.size
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    pub fn height(&self, x: usize, y: usize) -> f64 {
        self.heights[y * self.resolution + x]
    }

    pub fn set_height(&mut self, x: usize, y: usize, value: f64) {
        self.heights[y * self.resolution + x] = value;
    }

    /// Bilinear height at normalised coordinates; `u` and `v` are clamped to
    /// `[0, 1]`.
    pub fn interpolated_height(&self, u: f64, v: f64) -> f64 {
        let last = self.resolution.saturating_sub(1);
        if last == 0 {
            return self.heights.first().copied().unwrap_or(0.0);
        }

        let fx = u.clamp(0.0, 1.0) * last as f64;
        let fy = v.clamp(0.0, 1.0) * last as f64;
        let x0 = (fx.floor() as usize).min(last - 1);
        let y0 = (fy.floor() as usize).min(last - 1);
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let bottom = lerp(self.height(x0, y0), self.height(x0 + 1, y0), tx);
        let top = lerp(self.height(x0, y0 + 1), self.height(x0 + 1, y0 + 1), tx);
        lerp(bottom, top, ty)
    }

    /// World altitude at normalised coordinates.
    pub fn altitude_at(&self, u: f64, v: f64) -> f64 {
        self.offset.z + self.interpolated_height(u, v) * self.size.z
    }

    /// Lowest and highest stored heights.
    pub fn height_range(&self) -> (f64, f64) {
        self.heights
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }

    /// Multiply every height by `factor`.
    pub fn multiply(&mut self, factor: f64) {
        for h in &mut self.heights {
            *h *= factor;
        }
    }

    /// Add a same-sized buffer of heights.
    pub fn apply_offset(&mut self, offsets: &[f64]) {
        debug_assert_eq!(offsets.len(), self.heights.len());
        for (h, o) in self.heights.iter_mut().zip(offsets) {
            *h += o;
        }
    }

    /// Triangulated surface in world space, two triangles per grid cell,
    /// counter-clockwise when seen from above.
    pub fn to_mesh(&self) -> TerrainMesh {
        let res = self.resolution;
        let mut mesh = TerrainMesh::default();
        if res < 2 {
            return mesh;
        }
        let last = (res - 1) as f64;
        let step_x = self.size.x / last;
        let step_y = self.size.y / last;
        let altitude = |x: usize, y: usize| self.offset.z + self.height(x, y) * self.size.z;

        mesh.positions.reserve(res * res);
        mesh.normals.reserve(res * res);
        mesh.uvs.reserve(res * res);
        for y in 0..res {
            for x in 0..res {
                let u = x as f64 / last;
                let v = y as f64 / last;
                mesh.positions.push([
                    (self.offset.x + u * self.size.x) as f32,
                    (self.offset.y + v * self.size.y) as f32,
                    altitude(x, y) as f32,
                ]);

                // Central differences, one-sided at the borders.
                let (xl, xr) = (x.saturating_sub(1), (x + 1).min(res - 1));
                let (yl, yr) = (y.saturating_sub(1), (y + 1).min(res - 1));
                let dzdx = (altitude(xr, y) - altitude(xl, y)) / ((xr - xl) as f64 * step_x);
                let dzdy = (altitude(x, yr) - altitude(x, yl)) / ((yr - yl) as f64 * step_y);
                let normal = DVec3::new(-dzdx, -dzdy, 1.0).normalize();
                mesh.normals.push(normal.as_vec3().to_array());
                mesh.uvs.push([u as f32, v as f32]);
            }
        }

        let stride = res as u32;
        mesh.indices.reserve((res - 1) * (res - 1) * 6);
        for y in 0..stride - 1 {
            for x in 0..stride - 1 {
                let i = y * stride + x;
                mesh.indices
                    .extend_from_slice(&[i, i + 1, i + stride, i + 1, i + stride + 1, i + stride]);
            }
        }
        mesh
    }
}

/// Plain triangle mesh emitted through the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl TerrainMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Tile store element: a finished terrain.
#[derive(Debug, Clone)]
pub struct TerrainElement {
    pub terrain: Terrain,
}

/// Partial tile states registered by workers, by stage index.
#[derive(Debug, Clone, Default)]
pub struct StageSnapshots {
    pub stages: BTreeMap<usize, Terrain>,
}
