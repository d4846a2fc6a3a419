use std::cell::OnceCell;
use std::collections::HashMap;

use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};
use terrascape_common::GridCoordinate;
use terrascape_common::math::powi;

use crate::chunk::{Chunk, LodData};
use crate::key::ChunkKey;
use crate::zone::{Zone, ZoneView};

/// Errors from the chunk hierarchy.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("bad LOD index {lod}: expected 0..={max_lod}")]
    BadIndex { lod: i32, max_lod: i32 },
    #[error("zone is not part of this chunk system: {0}")]
    UnknownZone(String),
    #[error("chunk hierarchy reached its limit of {limit} entries")]
    ResourceGrowth { limit: usize },
    #[error("bad chunk system configuration: {0}")]
    BadConfiguration(String),
}

/// Chunk system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSystemConfig {
    /// Edge length, in metres, of a LOD 0 chunk.
    pub base_chunk_size: f64,
    /// Subdivision factor per axis between consecutive levels.
    pub factor: i32,
    /// Finest level; chunks at this level have no children.
    pub max_lod: i32,
    /// Max resolution (samples per metre) of LOD 0 chunks.
    pub base_resolution_threshold: f64,
    /// Hard cap on chunk entries. `None` leaves the hierarchy unbounded.
    pub max_chunks: Option<usize>,
}

impl Default for ChunkSystemConfig {
    fn default() -> Self {
        Self {
            base_chunk_size: 6000.0,
            factor: 4,
            max_lod: 6,
            base_resolution_threshold: 0.1,
            max_chunks: None,
        }
    }
}

impl ChunkSystemConfig {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if !is_positive(self.base_chunk_size) {
            return Err(ChunkError::BadConfiguration(format!(
                "base_chunk_size must be positive, got {}",
                self.base_chunk_size
            )));
        }
        if self.factor < 2 {
            return Err(ChunkError::BadConfiguration(format!(
                "factor must be at least 2, got {}",
                self.factor
            )));
        }
        if self.max_lod < 0 {
            return Err(ChunkError::BadConfiguration(format!(
                "max_lod must not be negative, got {}",
                self.max_lod
            )));
        }
        if !is_positive(self.base_resolution_threshold) {
            return Err(ChunkError::BadConfiguration(format!(
                "base_resolution_threshold must be positive, got {}",
                self.base_resolution_threshold
            )));
        }
        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value > 0.0
}

/// One node of the hierarchy, held by value in the system's arena.
#[derive(Debug)]
pub(crate) struct ChunkEntry {
    pub(crate) coords: GridCoordinate,
    pub(crate) chunk: Chunk,
    pub(crate) parent: Option<ChunkKey>,
    pub(crate) children: Vec<ChunkKey>,
}

/// Neighbour directions, in the order neighbour queries report them.
const DIRECTIONS: [IVec3; 6] = [
    IVec3::X,
    IVec3::NEG_X,
    IVec3::Y,
    IVec3::NEG_Y,
    IVec3::Z,
    IVec3::NEG_Z,
];

/// Lazily expanded LOD grid of chunks.
///
/// LOD 0 tiles all of space with cubes of `base_chunk_size`. Each chunk below
/// `max_lod` splits into `factor^3` children on first request. Entries are
/// created on first reference and kept for the lifetime of the system.
/// Parent and child relations are key lookups into one arena.
#[derive(Debug)]
pub struct LodGridChunkSystem {
    config: ChunkSystemConfig,
    lod_data: Vec<OnceCell<LodData>>,
    chunks: HashMap<ChunkKey, ChunkEntry>,
}

impl LodGridChunkSystem {
    /// Default configuration with the given LOD 0 chunk size.
    pub fn new(base_chunk_size: f64) -> Result<Self, ChunkError> {
        Self::with_config(ChunkSystemConfig {
            base_chunk_size,
            ..ChunkSystemConfig::default()
        })
    }

    pub fn with_config(config: ChunkSystemConfig) -> Result<Self, ChunkError> {
        config.validate()?;
        let base = LodData::new(
            DVec3::splat(config.base_chunk_size),
            config.base_resolution_threshold,
        );
        let mut lod_data: Vec<OnceCell<LodData>> =
            (0..=config.max_lod).map(|_| OnceCell::new()).collect();
        lod_data[0] = OnceCell::from(base);
        tracing::debug!(
            base_chunk_size = config.base_chunk_size,
            factor = config.factor,
            max_lod = config.max_lod,
            "chunk system created"
        );
        Ok(Self {
            config,
            lod_data,
            chunks: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ChunkSystemConfig {
        &self.config
    }

    pub fn factor(&self) -> i32 {
        self.config.factor
    }

    pub fn max_lod(&self) -> i32 {
        self.config.max_lod
    }

    /// Number of levels, `max_lod + 1`.
    pub fn lod_count(&self) -> usize {
        self.lod_data.len()
    }

    /// Number of chunk entries created so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    // LOD METADATA

    /// Memoised metadata for `lod`: dimensions scaled by `factor^-lod`, max
    /// resolution scaled by `factor^lod`, both relative to level 0.
    pub fn lod_data(&self, lod: i32) -> Result<LodData, ChunkError> {
        self.check_lod(lod)?;
        let data = self.lod_data[lod as usize].get_or_init(|| {
            let base = self.base_lod_data();
            let factor = self.config.factor as f64;
            LodData::new(
                base.chunk_size * powi(factor, -lod),
                base.max_resolution * powi(factor, lod),
            )
        });
        Ok(*data)
    }

    /// Override the metadata of one level. Overriding level 0 invalidates the
    /// memoised values of every other level.
    pub fn set_lod_data(&mut self, lod: i32, data: LodData) -> Result<(), ChunkError> {
        self.check_lod(lod)?;
        if lod == 0 {
            for cell in &mut self.lod_data {
                *cell = OnceCell::new();
            }
        }
        self.lod_data[lod as usize] = OnceCell::from(data);
        Ok(())
    }

    /// Upper bound (exclusive) of the resolution band of `lod`. Infinite for
    /// the finest level.
    pub fn max_resolution(&self, lod: i32) -> Result<f64, ChunkError> {
        self.check_lod(lod)?;
        if lod == self.config.max_lod {
            Ok(f64::INFINITY)
        } else {
            Ok(self.lod_data(lod)?.max_resolution)
        }
    }

    /// Lower bound (inclusive) of the resolution band of `lod`: 0 for level
    /// 0, otherwise the max resolution of the previous level.
    pub fn min_resolution(&self, lod: i32) -> Result<f64, ChunkError> {
        self.check_lod(lod)?;
        if lod == 0 {
            Ok(0.0)
        } else {
            Ok(self.lod_data(lod - 1)?.max_resolution)
        }
    }

    /// Lowest level whose `[min, max)` band contains `value`. Values below the
    /// first band map to 0, values past the last band to `max_lod`.
    pub fn lod_for_resolution(&self, value: f64) -> i32 {
        for lod in 0..self.config.max_lod {
            let max = self.max_resolution(lod).unwrap_or(f64::INFINITY);
            if value < max {
                return lod;
            }
        }
        self.config.max_lod
    }

    // NAVIGATION

    /// Zone of the LOD 0 chunk containing `position`.
    pub fn zone_at(&mut self, position: DVec3) -> Result<Zone, ChunkError> {
        let size = self.base_lod_data().chunk_size;
        let coords = GridCoordinate::from_pos((position / size).floor().as_ivec3(), 0);
        let key = self.create_chunk(None, coords)?;
        Ok(Zone::new(key, coords))
    }

    /// The six axis neighbours of `zone` (+x, -x, +y, -y, +z, -z), sharing its
    /// LOD and parent.
    ///
    /// Neighbours never cross the parent's boundary: a child at the edge of
    /// its parent gets a sibling with out-of-range local coordinates rather
    /// than the adjacent chunk of the parent's neighbour.
    pub fn neighbour_zones(&mut self, zone: &Zone) -> Result<Vec<Zone>, ChunkError> {
        DIRECTIONS
            .iter()
            .map(|direction| self.neighbour_zone(zone, *direction))
            .collect()
    }

    /// Neighbour of `zone` along `direction`, same LOD and parent.
    pub fn neighbour_zone(&mut self, zone: &Zone, direction: IVec3) -> Result<Zone, ChunkError> {
        let entry = self.entry(zone)?;
        let coords = entry.coords.offset(direction);
        let parent = entry.parent.clone();
        let key = self.create_chunk(parent.as_ref(), coords)?;
        Ok(Zone::new(key, coords))
    }

    /// The `factor^3` children of `zone` in nested x, y, z order, created on
    /// the first call. Empty at `max_lod`.
    pub fn children_zones(&mut self, zone: &Zone) -> Result<Vec<Zone>, ChunkError> {
        let entry = self.entry(zone)?;
        let lod = entry.coords.lod;
        if lod >= self.config.max_lod {
            return Ok(Vec::new());
        }

        if entry.children.is_empty() {
            let factor = self.config.factor;
            let mut children = Vec::with_capacity((factor * factor * factor) as usize);
            for x in 0..factor {
                for y in 0..factor {
                    for z in 0..factor {
                        let coords = GridCoordinate::new(x, y, z, lod + 1);
                        children.push(self.create_chunk(Some(&zone.key), coords)?);
                    }
                }
            }
            tracing::trace!(zone = %zone.key, count = children.len(), "zone expanded");
            if let Some(entry) = self.chunks.get_mut(&zone.key) {
                entry.children = children;
            }
        }

        let entry = self.entry(zone)?;
        Ok(entry
            .children
            .iter()
            .map(|key| Zone::new(key.clone(), key.local()))
            .collect())
    }

    /// Parent zone, `None` at LOD 0 or for zones unknown to this system.
    pub fn parent_zone(&self, zone: &Zone) -> Option<Zone> {
        let parent = self.chunks.get(&zone.key)?.parent.as_ref()?;
        Some(Zone::new(parent.clone(), parent.local()))
    }

    pub fn chunk(&self, zone: &Zone) -> Result<&Chunk, ChunkError> {
        Ok(&self.entry(zone)?.chunk)
    }

    /// Read-only handle on `zone` backed by this system.
    pub fn view(&self, zone: &Zone) -> Result<ZoneView<'_>, ChunkError> {
        let (key, entry) = self
            .chunks
            .get_key_value(&zone.key)
            .ok_or_else(|| ChunkError::UnknownZone(zone.key.to_string()))?;
        Ok(ZoneView::new(self, key, entry))
    }

    pub(crate) fn entry_by_key(&self, key: &ChunkKey) -> Option<(&ChunkKey, &ChunkEntry)> {
        self.chunks.get_key_value(key)
    }

    fn entry(&self, zone: &Zone) -> Result<&ChunkEntry, ChunkError> {
        self.chunks
            .get(&zone.key)
            .ok_or_else(|| ChunkError::UnknownZone(zone.key.to_string()))
    }

    fn base_lod_data(&self) -> LodData {
        self.lod_data[0].get().copied().unwrap_or_else(|| {
            LodData::new(
                DVec3::splat(self.config.base_chunk_size),
                self.config.base_resolution_threshold,
            )
        })
    }

    fn check_lod(&self, lod: i32) -> Result<(), ChunkError> {
        if lod < 0 || lod > self.config.max_lod {
            return Err(ChunkError::BadIndex {
                lod,
                max_lod: self.config.max_lod,
            });
        }
        Ok(())
    }

    /// Create the entry for `coords` under `parent` if it does not exist yet.
    fn create_chunk(
        &mut self,
        parent: Option<&ChunkKey>,
        coords: GridCoordinate,
    ) -> Result<ChunkKey, ChunkError> {
        let key = ChunkKey::new(parent, &coords);
        if self.chunks.contains_key(&key) {
            return Ok(key);
        }
        if let Some(limit) = self.config.max_chunks {
            if self.chunks.len() >= limit {
                tracing::warn!(limit, "chunk hierarchy limit reached");
                return Err(ChunkError::ResourceGrowth { limit });
            }
        }

        let lod = coords.lod;
        let data = self.lod_data(lod)?;
        let mut chunk = Chunk::new(coords.pos.as_dvec3() * data.chunk_size, data.chunk_size);
        chunk.set_resolution_limits(self.min_resolution(lod)?, self.max_resolution(lod)?);

        tracing::trace!(%key, "chunk created");
        self.chunks.insert(
            key.clone(),
            ChunkEntry {
                coords,
                chunk,
                parent: parent.cloned(),
                children: Vec::new(),
            },
        );
        Ok(key)
    }
}
