use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::error::TerrainError;
use crate::terrain::Terrain;
use crate::worker::{TerrainWorker, TerrainWorkerContext, WorkerMode};

// Shifts samples off the Perlin lattice, where every octave is zero.
const PHASE: [f64; 2] = [0.318, 0.713];

/// Fractal Perlin noise sampled in world space.
///
/// Coordinates are scaled by the tile width, so every level carries the same
/// number of features per tile and same-level neighbours join seamlessly.
pub struct NoiseWorker {
    noise: Fbm<Perlin>,
    frequency: f64,
}

impl NoiseWorker {
    pub const DEFAULT_OCTAVES: usize = 5;
    pub const DEFAULT_FREQUENCY: f64 = 8.0;
    pub const DEFAULT_PERSISTENCE: f64 = 0.5;

    pub fn new(seed: u32) -> Self {
        Self::with_params(
            seed,
            Self::DEFAULT_OCTAVES,
            Self::DEFAULT_FREQUENCY,
            Self::DEFAULT_PERSISTENCE,
        )
    }

    /// `frequency` is the base number of noise periods across one tile.
    pub fn with_params(seed: u32, octaves: usize, frequency: f64, persistence: f64) -> Self {
        let noise = Fbm::<Perlin>::new(seed)
            .set_octaves(octaves)
            .set_persistence(persistence)
            .set_lacunarity(2.0);
        Self { noise, frequency }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    fn sample(&self, world_x: f64, world_y: f64, tile_width: f64) -> f64 {
        let nx = world_x / tile_width * self.frequency + PHASE[0];
        let ny = world_y / tile_width * self.frequency + PHASE[1];
        ((self.noise.get([nx, ny]) + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

impl Default for NoiseWorker {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TerrainWorker for NoiseWorker {
    fn mode(&self) -> WorkerMode {
        WorkerMode::ContextFree
    }

    fn name(&self) -> &str {
        "noise"
    }

    fn process(
        &mut self,
        terrain: &mut Terrain,
        _context: Option<&mut dyn TerrainWorkerContext>,
    ) -> Result<(), TerrainError> {
        let res = terrain.resolution();
        if res < 2 {
            return Err(TerrainError::Worker(format!(
                "noise needs a resolution of at least 2, got {res}"
            )));
        }
        let offset = terrain.offset();
        let size = terrain.size();
        let last = (res - 1) as f64;

        for y in 0..res {
            for x in 0..res {
                let wx = offset.x + x as f64 / last * size.x;
                let wy = offset.y + y as f64 / last * size.y;
                let h = self.sample(wx, wy, size.x);
                terrain.set_height(x, y, h);
            }
        }
        Ok(())
    }
}
