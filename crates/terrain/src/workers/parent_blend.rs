use terrascape_common::math::powi;

use crate::error::TerrainError;
use crate::terrain::Terrain;
use crate::worker::{TerrainWorker, TerrainWorkerContext, WorkerMode};

/// Blends a tile with its parent so detail levels stay continuous.
///
/// Child heights are scaled by [`contribution`](Self::contribution) and the
/// parent heightfield, resampled over the child's footprint, fills the
/// remaining weight. The blended state is registered for later stages.
#[derive(Debug, Clone)]
pub struct ParentBlendWorker {
    child_rate: f64,
}

impl ParentBlendWorker {
    pub const DEFAULT_CHILD_RATE: f64 = 0.1;

    pub fn new(child_rate: f64) -> Self {
        Self { child_rate }
    }

    pub fn child_rate(&self) -> f64 {
        self.child_rate
    }

    /// Weight of the child's own heights at `level`, where `ratio` is
    /// `child_width / parent_width`.
    pub fn contribution(&self, level: i32, ratio: f64) -> f64 {
        if level == 0 {
            1.0
        } else {
            self.child_rate * powi(ratio, level - 1)
        }
    }

    fn resample_parent(&self, terrain: &Terrain, parent: &Terrain, weight: f64) -> Vec<f64> {
        let res = terrain.resolution();
        let parent_width = parent.size().x;
        let ratio = terrain.size().x / parent_width;
        let start = (terrain.offset() - parent.offset()) / parent_width;
        let step = ratio / (res - 1) as f64;

        let mut buffer = Vec::with_capacity(res * res);
        for y in 0..res {
            for x in 0..res {
                let u = start.x + x as f64 * step;
                let v = start.y + y as f64 * step;
                buffer.push(parent.interpolated_height(u, v) * weight);
            }
        }
        buffer
    }
}

impl Default for ParentBlendWorker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHILD_RATE)
    }
}

impl TerrainWorker for ParentBlendWorker {
    fn mode(&self) -> WorkerMode {
        WorkerMode::ContextAware
    }

    fn name(&self) -> &str {
        "parent-blend"
    }

    fn process(
        &mut self,
        terrain: &mut Terrain,
        context: Option<&mut dyn TerrainWorkerContext>,
    ) -> Result<(), TerrainError> {
        let Some(context) = context else {
            return Err(TerrainError::Worker(
                "parent blending requires a context".to_string(),
            ));
        };
        let level = context.parent_count();
        if level == 0 {
            context.register_current_state();
            return Ok(());
        }
        if terrain.resolution() < 2 {
            return Err(TerrainError::Worker(format!(
                "cannot blend a terrain of resolution {}",
                terrain.resolution()
            )));
        }

        let (child_weight, buffer) = {
            let Some(parent) = context.parent() else {
                return Err(TerrainError::Worker(format!(
                    "parent of {} is not available",
                    context.key()
                )));
            };
            let ratio = terrain.size().x / parent.size().x;
            let child_weight = self.contribution(level, ratio);
            let buffer = self.resample_parent(terrain, parent, 1.0 - child_weight);
            (child_weight, buffer)
        };

        terrain.multiply(child_weight);
        terrain.apply_offset(&buffer);
        context.register_current_state();
        tracing::trace!(level, child_weight, "blended with parent");
        Ok(())
    }
}
