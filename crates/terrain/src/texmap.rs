use serde::{Deserialize, Serialize};
use terrascape_common::math::{interpolate, lerp};

use crate::error::TerrainError;
use crate::terrain::Terrain;

/// One colour band of a slice; `ratio` is its relative width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorPart {
    pub color: [f64; 3],
    pub ratio: f64,
}

impl ColorPart {
    pub fn new(r: f64, g: f64, b: f64, ratio: f64) -> Self {
        Self {
            color: [r, g, b],
            ratio,
        }
    }
}

/// Builds an altitude x variation colour table from horizontal slices.
#[derive(Debug, Clone)]
pub struct TexmapBuilder {
    min_altitude: f64,
    max_altitude: f64,
    // Sorted by altitude.
    slices: Vec<(f64, Vec<ColorPart>)>,
}

impl TexmapBuilder {
    pub fn new(min_altitude: f64, max_altitude: f64) -> Self {
        Self {
            min_altitude,
            max_altitude,
            slices: Vec::new(),
        }
    }

    /// Add (or replace) the slice at `altitude`.
    pub fn add_slice(&mut self, altitude: f64, parts: Vec<ColorPart>) -> Result<(), TerrainError> {
        if !(self.min_altitude..=self.max_altitude).contains(&altitude) {
            return Err(TerrainError::BadConfiguration(format!(
                "slice altitude {altitude} outside [{}, {}]",
                self.min_altitude, self.max_altitude
            )));
        }
        if parts.is_empty() {
            return Err(TerrainError::BadConfiguration(format!(
                "slice at altitude {altitude} has no colour"
            )));
        }
        if parts.iter().any(|p| p.ratio.is_nan() || p.ratio < 0.0) {
            return Err(TerrainError::BadConfiguration(format!(
                "slice at altitude {altitude} has a negative ratio"
            )));
        }

        match self
            .slices
            .binary_search_by(|(a, _)| a.total_cmp(&altitude))
        {
            Ok(i) => self.slices[i].1 = parts,
            Err(i) => self.slices.insert(i, (altitude, parts)),
        }
        Ok(())
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Sample the slices into a `resolution x resolution` table.
    pub fn build(&self, resolution: usize) -> Result<TextureMap, TerrainError> {
        if self.slices.is_empty() {
            return Err(TerrainError::BadConfiguration(
                "texture map has no slices".to_string(),
            ));
        }
        if resolution == 0 {
            return Err(TerrainError::BadConfiguration(
                "texture map resolution must be positive".to_string(),
            ));
        }

        let range = self.max_altitude - self.min_altitude;
        let mut colors = Vec::with_capacity(resolution * resolution);
        for row in 0..resolution {
            let altitude = self.min_altitude + row as f64 * range / resolution as f64;
            for col in 0..resolution {
                let variation = col as f64 / resolution as f64;
                colors.push(self.color_between_slices(altitude, variation));
            }
        }
        Ok(TextureMap {
            min_altitude: self.min_altitude,
            max_altitude: self.max_altitude,
            resolution,
            colors,
        })
    }

    fn color_between_slices(&self, altitude: f64, variation: f64) -> [f64; 3] {
        let upper = self.slices.partition_point(|(a, _)| *a <= altitude);
        if upper == 0 {
            return slice_color(&self.slices[0].1, variation);
        }
        if upper == self.slices.len() {
            return slice_color(&self.slices[upper - 1].1, variation);
        }
        let (a0, lower_parts) = &self.slices[upper - 1];
        let (a1, upper_parts) = &self.slices[upper];
        let t = interpolate(*a0, 0.0, *a1, 1.0, altitude);
        mix(slice_color(lower_parts, variation), slice_color(upper_parts, variation), t)
    }
}

// Parts are laid side by side across [0, 1]; colours blend between the centres
// of adjacent parts.
fn slice_color(parts: &[ColorPart], variation: f64) -> [f64; 3] {
    let total: f64 = parts.iter().map(|p| p.ratio).sum();
    if parts.len() == 1 || total <= 0.0 {
        return parts[0].color;
    }

    let mut centres = Vec::with_capacity(parts.len());
    let mut start = 0.0;
    for part in parts {
        let width = part.ratio / total;
        centres.push(start + width / 2.0);
        start += width;
    }

    let next = centres.partition_point(|c| *c <= variation);
    if next == 0 {
        return parts[0].color;
    }
    if next == parts.len() {
        return parts[next - 1].color;
    }
    let t = interpolate(centres[next - 1], 0.0, centres[next], 1.0, variation);
    mix(parts[next - 1].color, parts[next].color, t)
}

fn mix(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

/// Colour lookup table: rows by altitude, columns by variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureMap {
    min_altitude: f64,
    max_altitude: f64,
    resolution: usize,
    colors: Vec<[f64; 3]>,
}

impl TextureMap {
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Nearest table entry; `variation` is expected in `[0, 1)`. Both axes
    /// are clamped to the table.
    pub fn color_at(&self, altitude: f64, variation: f64) -> [f64; 3] {
        let last = self.resolution - 1;
        let range = self.max_altitude - self.min_altitude;
        let row = ((altitude - self.min_altitude) / range * self.resolution as f64).floor();
        let col = (variation * self.resolution as f64).floor();
        let row = (row.max(0.0) as usize).min(last);
        let col = (col.max(0.0) as usize).min(last);
        self.colors[row * self.resolution + col]
    }

    /// Paint a `size x size` RGB texture over the terrain. Variation is a
    /// hash of the texel's world position, so adjacent tiles agree.
    pub fn paint(&self, terrain: &Terrain, size: usize, seed: u64) -> TerrainTexture {
        let mut pixels = Vec::with_capacity(size * size);
        let offset = terrain.offset();
        let texel = terrain.size().x / size as f64;
        let origin_x = (offset.x / texel).round() as i64;
        let origin_y = (offset.y / texel).round() as i64;

        for ty in 0..size {
            for tx in 0..size {
                let u = (tx as f64 + 0.5) / size as f64;
                let v = (ty as f64 + 0.5) / size as f64;
                let altitude = terrain.altitude_at(u, v);
                let variation = unit_hash(seed, origin_x + tx as i64, origin_y + ty as i64);
                let [r, g, b] = self.color_at(altitude, variation);
                pixels.push([to_byte(r), to_byte(g), to_byte(b)]);
            }
        }
        TerrainTexture {
            width: size,
            height: size,
            pixels,
        }
    }
}

fn to_byte(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

// Splitmix64 finaliser over the texel position, mapped to [0, 1).
fn unit_hash(seed: u64, x: i64, y: i64) -> f64 {
    let mut z = seed
        .wrapping_add((x as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
        .wrapping_add((y as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

/// Row-major RGB texture emitted through the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainTexture {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<[u8; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    const BLACK: [f64; 3] = [0.0, 0.0, 0.0];
    const WHITE: [f64; 3] = [1.0, 1.0, 1.0];

    fn two_slices() -> TexmapBuilder {
        let mut b = TexmapBuilder::new(0.0, 100.0);
        b.add_slice(0.0, vec![ColorPart::new(0.0, 0.0, 0.0, 1.0)]).unwrap();
        b.add_slice(100.0, vec![ColorPart::new(1.0, 1.0, 1.0, 1.0)]).unwrap();
        b
    }

    #[test]
    fn slice_validation() {
        let mut b = TexmapBuilder::new(-10.0, 10.0);
        assert!(matches!(
            b.add_slice(11.0, vec![ColorPart::new(1.0, 0.0, 0.0, 1.0)]),
            Err(TerrainError::BadConfiguration(_))
        ));
        assert!(matches!(
            b.add_slice(0.0, Vec::new()),
            Err(TerrainError::BadConfiguration(_))
        ));
        assert!(matches!(b.build(4), Err(TerrainError::BadConfiguration(_))));
        assert_eq!(b.slice_count(), 0);
    }

    #[test]
    fn interpolates_between_slices() {
        let map = two_slices().build(4).unwrap();
        assert_eq!(map.color_at(0.0, 0.0), BLACK);
        let mid = map.color_at(50.0, 0.0);
        assert!((mid[0] - 0.5).abs() < 1e-12);
        // Out-of-range altitudes clamp to the edge rows.
        assert_eq!(map.color_at(-500.0, 0.5), BLACK);
        assert!((map.color_at(500.0, 0.5)[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn interpolates_between_parts() {
        let mut b = TexmapBuilder::new(0.0, 1.0);
        b.add_slice(
            0.5,
            vec![
                ColorPart::new(0.0, 0.0, 0.0, 1.0),
                ColorPart::new(1.0, 1.0, 1.0, 1.0),
            ],
        )
        .unwrap();
        let map = b.build(8).unwrap();
        // Part centres sit at 0.25 and 0.75.
        assert_eq!(map.color_at(0.5, 0.0), BLACK);
        assert_eq!(map.color_at(0.5, 0.99), WHITE);
        assert!((map.color_at(0.5, 0.5)[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn replacing_a_slice_keeps_count() {
        let mut b = two_slices();
        b.add_slice(0.0, vec![ColorPart::new(1.0, 0.0, 0.0, 1.0)]).unwrap();
        assert_eq!(b.slice_count(), 2);
        assert_eq!(b.build(2).unwrap().color_at(0.0, 0.0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn paints_by_altitude() {
        let map = two_slices().build(16).unwrap();
        let low = Terrain::with_bounds(3, DVec3::ZERO, DVec3::new(10.0, 10.0, 100.0));
        let texture = map.paint(&low, 4, 0);
        assert_eq!((texture.width, texture.height), (4, 4));
        assert_eq!(texture.pixels.len(), 16);
        assert!(texture.pixels.iter().all(|p| *p == [0, 0, 0]));
    }

    #[test]
    fn hash_is_in_unit_interval() {
        for i in -50..50 {
            let h = unit_hash(9, i, i * 7);
            assert!((0.0..1.0).contains(&h));
        }
        assert_eq!(unit_hash(1, 2, 3), unit_hash(1, 2, 3));
    }
}
