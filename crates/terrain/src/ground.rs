use glam::DVec3;
use terrascape_chunk::ZoneView;
use terrascape_common::TileCoordinates;
use terrascape_common::math::{floor_div, powi};
use terrascape_storage::{GridStorage, LruReducer};

use crate::collect::{Channel, Collector, ItemKey};
use crate::config::GroundConfig;
use crate::error::TerrainError;
use crate::terrain::{StageSnapshots, Terrain, TerrainElement};
use crate::texmap::{TexmapBuilder, TextureMap};
use crate::worker::{TerrainWorker, TerrainWorkerContext, WorkerMode};
use crate::workers::{NoiseWorker, ParentBlendWorker};

/// Rows and columns of the colour table built by [`Ground::set_texture_map`].
pub const TEXTURE_MAP_RESOLUTION: usize = 256;

const TEXTURE_SEED: u64 = 0x7e55_e1a7;

/// Tile cache counters, cumulative since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub generated: u64,
    pub evicted: u64,
    pub snapshots: u64,
    pub failures: u64,
}

/// Generates, caches and serves terrain tiles.
///
/// Level `L` splits the plane into square tiles of width
/// `unit_size * factor^-L`. A tile is produced by running the worker chain in
/// insertion order; every ancestor is generated first, so context-aware
/// workers can always reach the parent. Finished tiles live in an LRU-bounded
/// store and are regenerated on demand after eviction.
pub struct Ground {
    config: GroundConfig,
    workers: Vec<Box<dyn TerrainWorker>>,
    tiles: GridStorage<TerrainElement>,
    snapshots: GridStorage<StageSnapshots>,
    texture_map: Option<TextureMap>,
    stats: CacheStats,
}

impl Ground {
    pub fn new(config: GroundConfig) -> Result<Self, TerrainError> {
        config.validate()?;
        Ok(Self {
            tiles: GridStorage::with_reducer(LruReducer::new(config.max_cache_size)),
            snapshots: GridStorage::new(),
            workers: Vec::new(),
            texture_map: None,
            stats: CacheStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &GroundConfig {
        &self.config
    }

    /// Replace the configuration and discard every cached tile. Workers and
    /// the texture map are kept.
    pub fn reconfigure(&mut self, config: GroundConfig) -> Result<(), TerrainError> {
        config.validate()?;
        let discarded = self.tiles.len();
        self.tiles = GridStorage::with_reducer(LruReducer::new(config.max_cache_size));
        self.snapshots.clear();
        self.config = config;
        tracing::debug!(discarded, "ground reconfigured");
        Ok(())
    }

    pub fn add_worker(&mut self, worker: impl TerrainWorker + 'static) -> &mut Self {
        tracing::debug!(worker = worker.name(), stage = self.workers.len(), "worker added");
        self.workers.push(Box::new(worker));
        self
    }

    /// Replace the worker chain with noise followed by parent blending.
    pub fn set_default_worker_set(&mut self) -> &mut Self {
        self.workers.clear();
        self.add_worker(NoiseWorker::default())
            .add_worker(ParentBlendWorker::default())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn set_texture_map(&mut self, builder: &TexmapBuilder) -> Result<(), TerrainError> {
        self.texture_map = Some(builder.build(TEXTURE_MAP_RESOLUTION)?);
        Ok(())
    }

    pub fn texture_map(&self) -> Option<&TextureMap> {
        self.texture_map.as_ref()
    }

    // --- geometry ---

    pub fn tile_width(&self, lod: i32) -> f64 {
        self.config.unit_size * powi(self.config.factor as f64, -lod)
    }

    /// Samples per metre of a tile at `lod`.
    pub fn terrain_resolution(&self, lod: i32) -> f64 {
        (self.config.terrain_res - 1) as f64 / self.tile_width(lod)
    }

    /// Coarsest level at least as fine as `resolution`, or `max_lod`.
    pub fn level_for_resolution(&self, resolution: f64) -> i32 {
        (0..self.config.max_lod)
            .find(|&lod| self.terrain_resolution(lod) >= resolution)
            .unwrap_or(self.config.max_lod)
    }

    /// Finest level whose resolution stays below the zone's max resolution.
    pub fn level_for_zone(&self, view: &ZoneView<'_>) -> i32 {
        let max = view.max_resolution();
        (0..=self.config.max_lod)
            .rev()
            .find(|&lod| self.terrain_resolution(lod) < max)
            .unwrap_or(0)
    }

    /// Key of the tile at `lod` covering world position `(x, y)`.
    pub fn tile_key_at(&self, x: f64, y: f64, lod: i32) -> Result<TileCoordinates, TerrainError> {
        self.check_lod(lod)?;
        let width = self.tile_width(lod);
        Ok(TileCoordinates::flat(
            floor_div(x, width),
            floor_div(y, width),
            lod,
        ))
    }

    pub fn parent_key(&self, key: &TileCoordinates) -> Option<TileCoordinates> {
        parent_of(key, self.config.factor)
    }

    fn check_lod(&self, lod: i32) -> Result<(), TerrainError> {
        if lod < 0 || lod > self.config.max_lod {
            return Err(TerrainError::BadIndex {
                lod,
                max_lod: self.config.max_lod,
            });
        }
        Ok(())
    }

    // --- tile cache ---

    /// Fetch a tile, generating it and any missing ancestors first.
    pub fn provide(&mut self, key: TileCoordinates) -> Result<&Terrain, TerrainError> {
        self.ensure_tile(key)?;
        Ok(&self.tiles.get(&key)?.terrain)
    }

    pub fn has_tile(&self, key: &TileCoordinates) -> bool {
        self.tiles.has(key)
    }

    pub fn resident_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Resident keys in coordinate order.
    pub fn resident_keys(&self) -> Vec<TileCoordinates> {
        let mut keys: Vec<_> = self.tiles.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn clear_cache(&mut self) {
        tracing::debug!(discarded = self.tiles.len(), "tile cache cleared");
        self.tiles.clear();
        self.snapshots.clear();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// State a tile registered at `stage`, if it is still resident.
    pub fn stage_state(&self, key: &TileCoordinates, stage: usize) -> Option<&Terrain> {
        self.snapshots.try_get(key)?.stages.get(&stage)
    }

    /// Record `terrain` as the state of `key` after `stage`. Context lookups
    /// made from the same stage of other tiles see this state.
    pub fn snapshot(&mut self, key: TileCoordinates, stage: usize, terrain: &Terrain) {
        self.snapshots
            .get_or_create(key, StageSnapshots::default)
            .stages
            .insert(stage, terrain.clone());
        self.stats.snapshots += 1;
        tracing::trace!(%key, stage, "stage state registered");
    }

    fn ensure_tile(&mut self, key: TileCoordinates) -> Result<(), TerrainError> {
        self.check_lod(key.lod)?;
        if self.tiles.try_get(&key).is_some() {
            self.stats.hits += 1;
            tracing::trace!(%key, "tile cache hit");
            return Ok(());
        }
        self.stats.misses += 1;
        if let Some(parent) = self.parent_key(&key) {
            self.ensure_tile(parent)?;
        }
        self.generate_tile(key)
    }

    fn generate_tile(&mut self, key: TileCoordinates) -> Result<(), TerrainError> {
        let _span =
            tracing::debug_span!("generate_tile", lod = key.lod, x = key.pos.x, y = key.pos.y)
                .entered();

        let width = self.tile_width(key.lod);
        let mut terrain = Terrain::with_bounds(
            self.config.terrain_res,
            DVec3::new(
                key.pos.x as f64 * width,
                key.pos.y as f64 * width,
                self.config.min_altitude,
            ),
            DVec3::new(width, width, self.config.altitude_range()),
        );

        if let Err(err) = self.run_workers(key, &mut terrain) {
            self.snapshots.remove(&key);
            self.stats.failures += 1;
            tracing::warn!(%key, %err, "tile generation failed");
            return Err(err);
        }

        self.tiles.set(key, TerrainElement { terrain });
        self.stats.generated += 1;
        tracing::debug!(%key, resident = self.tiles.len(), "tile generated");
        self.update_cache();
        Ok(())
    }

    fn run_workers(&mut self, key: TileCoordinates, terrain: &mut Terrain) -> Result<(), TerrainError> {
        for stage in 0..self.workers.len() {
            let registered = {
                let worker = &mut self.workers[stage];
                match worker.mode() {
                    WorkerMode::ContextFree => {
                        worker.process(terrain, None)?;
                        false
                    }
                    WorkerMode::ContextAware => {
                        let mut context = GroundContext {
                            key,
                            stage,
                            factor: self.config.factor,
                            tiles: &self.tiles,
                            snapshots: &self.snapshots,
                            registered: false,
                        };
                        worker.process(terrain, Some(&mut context))?;
                        context.registered
                    }
                }
            };
            if registered {
                self.snapshot(key, stage, terrain);
            }
        }
        Ok(())
    }

    fn update_cache(&mut self) {
        for victim in self.tiles.eviction_candidates() {
            self.tiles.remove(&victim);
            self.snapshots.remove(&victim);
            self.stats.evicted += 1;
            tracing::debug!(%victim, "tile evicted");
        }
    }

    // --- sampling ---

    /// Altitude at world `(x, y)` from the level matching `resolution`
    /// (samples per metre). Falls back to coarser levels when generation
    /// fails.
    pub fn altitude_at(&mut self, x: f64, y: f64, resolution: f64) -> Result<f64, TerrainError> {
        let lod = self.level_for_resolution(resolution);
        self.altitude_with_fallback(x, y, lod)
    }

    /// Altitude at zone-local `(x, y)`, at the zone's level.
    pub fn observe_altitude_at(
        &mut self,
        view: &ZoneView<'_>,
        x: f64,
        y: f64,
    ) -> Result<f64, TerrainError> {
        let origin = view.absolute_offset();
        let lod = self.level_for_zone(view);
        self.altitude_with_fallback(origin.x + x, origin.y + y, lod)
    }

    fn altitude_with_fallback(&mut self, x: f64, y: f64, lod: i32) -> Result<f64, TerrainError> {
        self.check_lod(lod)?;
        let mut last_error = None;
        for level in (0..=lod).rev() {
            match self.sample_level(x, y, level) {
                Ok(altitude) => return Ok(altitude),
                Err(err) => {
                    tracing::warn!(level, %err, "altitude unavailable, trying a coarser level");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(TerrainError::BadIndex {
            lod,
            max_lod: self.config.max_lod,
        }))
    }

    fn sample_level(&mut self, x: f64, y: f64, lod: i32) -> Result<f64, TerrainError> {
        let key = self.tile_key_at(x, y, lod)?;
        let width = self.tile_width(lod);
        let u = x / width - key.pos.x as f64;
        let v = y / width - key.pos.y as f64;
        Ok(self.provide(key)?.altitude_at(u, v))
    }

    // --- collection ---

    /// Push every tile at the zone's level that overlaps the zone's footprint.
    /// Zones entirely above or below the altitude bounds collect nothing.
    /// Returns the number of tiles collected.
    pub fn collect_zone(
        &mut self,
        view: &ZoneView<'_>,
        collector: &mut dyn Collector,
    ) -> Result<usize, TerrainError> {
        let offset = view.absolute_offset();
        let dims = view.dimensions();
        if offset.z > self.config.max_altitude || offset.z + dims.z < self.config.min_altitude {
            tracing::trace!(zone = %view.key(), "zone outside altitude bounds");
            return Ok(0);
        }

        let lod = self.level_for_zone(view);
        let width = self.tile_width(lod);
        let x0 = floor_div(offset.x, width);
        let y0 = floor_div(offset.y, width);
        let x1 = (((offset.x + dims.x) / width).ceil() as i32 - 1).max(x0);
        let y1 = (((offset.y + dims.y) / width).ceil() as i32 - 1).max(y0);

        let mut collected = 0;
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.collect_tile(TileCoordinates::flat(x, y, lod), collector)?;
                collected += 1;
            }
        }
        tracing::debug!(zone = %view.key(), lod, collected, "zone collected");
        Ok(collected)
    }

    /// Push one tile's terrain, mesh and texture, as far as the collector
    /// wants them. Textures need a texture map.
    pub fn collect_tile(
        &mut self,
        key: TileCoordinates,
        collector: &mut dyn Collector,
    ) -> Result<(), TerrainError> {
        self.ensure_tile(key)?;
        let terrain = &self.tiles.get(&key)?.terrain;

        if collector.wants(Channel::Terrain) {
            collector.put_terrain(ItemKey::new(Channel::Terrain, key), terrain);
        }
        if collector.wants(Channel::Mesh) {
            collector.put_mesh(ItemKey::new(Channel::Mesh, key), terrain.to_mesh());
        }
        if let Some(map) = &self.texture_map {
            if collector.wants(Channel::Texture) {
                let size = (self.config.terrain_res - 1) * self.config.texture_res;
                collector.put_texture(
                    ItemKey::new(Channel::Texture, key),
                    map.paint(terrain, size, TEXTURE_SEED),
                );
            }
        }
        Ok(())
    }
}

fn parent_of(key: &TileCoordinates, factor: i32) -> Option<TileCoordinates> {
    (key.lod > 0).then(|| {
        TileCoordinates::new(
            key.pos.x.div_euclid(factor),
            key.pos.y.div_euclid(factor),
            key.pos.z,
            key.lod - 1,
        )
    })
}

/// Worker view of the tile store during one stage of one tile.
struct GroundContext<'a> {
    key: TileCoordinates,
    stage: usize,
    factor: i32,
    tiles: &'a GridStorage<TerrainElement>,
    snapshots: &'a GridStorage<StageSnapshots>,
    registered: bool,
}

impl<'a> GroundContext<'a> {
    fn lookup(&self, key: &TileCoordinates) -> Option<&'a Terrain> {
        let snapshots: &'a GridStorage<StageSnapshots> = self.snapshots;
        let tiles: &'a GridStorage<TerrainElement> = self.tiles;
        snapshots
            .try_get(key)
            .and_then(|s| s.stages.get(&self.stage))
            .or_else(|| tiles.try_get(key).map(|e| &e.terrain))
    }
}

impl TerrainWorkerContext for GroundContext<'_> {
    fn key(&self) -> TileCoordinates {
        self.key
    }

    // Tiles under another parent are not visible.
    fn neighbour(&self, dx: i32, dy: i32) -> Option<&Terrain> {
        let other = self.key.offset(dx, dy);
        if parent_of(&other, self.factor) != parent_of(&self.key, self.factor) {
            return None;
        }
        self.lookup(&other)
    }

    fn parent(&self) -> Option<&Terrain> {
        let parent = parent_of(&self.key, self.factor)?;
        self.lookup(&parent)
    }

    fn parent_count(&self) -> i32 {
        self.key.lod
    }

    fn register_current_state(&mut self) {
        self.registered = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::MemoryCollector;
    use crate::texmap::ColorPart;
    use std::cell::RefCell;
    use std::rc::Rc;
    use terrascape_chunk::LodGridChunkSystem;

    /// Context-free worker setting every height to a constant.
    struct Fill(f64);

    impl TerrainWorker for Fill {
        fn mode(&self) -> WorkerMode {
            WorkerMode::ContextFree
        }

        fn process(
            &mut self,
            terrain: &mut Terrain,
            _context: Option<&mut dyn TerrainWorkerContext>,
        ) -> Result<(), TerrainError> {
            let res = terrain.resolution();
            for y in 0..res {
                for x in 0..res {
                    terrain.set_height(x, y, self.0);
                }
            }
            Ok(())
        }
    }

    /// Fails on every tile of one level.
    struct FailAt(i32);

    impl TerrainWorker for FailAt {
        fn mode(&self) -> WorkerMode {
            WorkerMode::ContextAware
        }

        fn process(
            &mut self,
            _terrain: &mut Terrain,
            context: Option<&mut dyn TerrainWorkerContext>,
        ) -> Result<(), TerrainError> {
            match context {
                Some(ctx) if ctx.key().lod == self.0 => {
                    Err(TerrainError::Worker(format!("refusing {}", ctx.key())))
                }
                _ => Ok(()),
            }
        }
    }

    /// What a probe saw: tile, parent height, left neighbour height.
    type Seen = (TileCoordinates, Option<f64>, Option<f64>);

    /// Records parent and left neighbour, then writes 0.25 and registers it.
    struct Probe(Rc<RefCell<Vec<Seen>>>);

    impl TerrainWorker for Probe {
        fn mode(&self) -> WorkerMode {
            WorkerMode::ContextAware
        }

        fn process(
            &mut self,
            terrain: &mut Terrain,
            context: Option<&mut dyn TerrainWorkerContext>,
        ) -> Result<(), TerrainError> {
            let Some(ctx) = context else {
                return Err(TerrainError::Worker("no context".to_string()));
            };
            let parent = ctx.parent().map(|t| t.height(0, 0));
            let left = ctx.neighbour(-1, 0).map(|t| t.height(0, 0));
            self.0.borrow_mut().push((ctx.key(), parent, left));
            Fill(0.25).process(terrain, None)?;
            ctx.register_current_state();
            Ok(())
        }
    }

    fn small_config(max_cache_size: usize) -> GroundConfig {
        GroundConfig {
            terrain_res: 5,
            texture_res: 2,
            max_cache_size,
            ..GroundConfig::default()
        }
    }

    fn default_ground(config: GroundConfig) -> Ground {
        let mut ground = Ground::new(config).unwrap();
        ground.set_default_worker_set();
        ground
    }

    #[test]
    fn end_to_end_tile_at_origin() {
        let mut ground = default_ground(GroundConfig::default());
        assert_eq!(ground.worker_count(), 2);
        let key = ground.tile_key_at(0.0, 0.0, 2).unwrap();
        assert_eq!(key, TileCoordinates::flat(0, 0, 2));

        let terrain = ground.provide(key).unwrap();
        assert_eq!(terrain.resolution(), 33);
        assert_eq!(terrain.heights().len(), 33 * 33);
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
            let altitude = terrain.altitude_at(u, v);
            assert!((-2000.0..=4000.0).contains(&altitude), "{altitude}");
        }

        for lod in 0..=2 {
            assert!(ground.has_tile(&TileCoordinates::flat(0, 0, lod)));
        }
        assert!(!ground.has_tile(&TileCoordinates::flat(0, 0, 3)));
        assert_eq!(ground.resident_tiles(), 3);
        assert_eq!(ground.stats().generated, 3);
    }

    #[test]
    fn ancestor_chain_for_negative_positions() {
        let mut ground = default_ground(small_config(100));
        let key = ground.tile_key_at(-1.0, -1.0, 3).unwrap();
        ground.provide(key).unwrap();
        for lod in 0..=3 {
            let expected = ground.tile_key_at(-1.0, -1.0, lod).unwrap();
            assert_eq!(expected, TileCoordinates::flat(-1, -1, lod));
            assert!(ground.has_tile(&expected));
        }
    }

    #[test]
    fn geometry() {
        let ground = Ground::new(GroundConfig::default()).unwrap();
        assert_eq!(ground.tile_width(0), 6000.0);
        assert_eq!(ground.tile_width(2), 375.0);
        assert_eq!(ground.terrain_resolution(0), 32.0 / 6000.0);
        assert_eq!(ground.level_for_resolution(0.0), 0);
        assert_eq!(ground.level_for_resolution(0.02), 1);
        assert_eq!(ground.level_for_resolution(1.0), 3);

        assert_eq!(
            ground.parent_key(&TileCoordinates::flat(-5, 3, 2)),
            Some(TileCoordinates::flat(-2, 0, 1))
        );
        assert_eq!(
            ground.parent_key(&TileCoordinates::flat(-1, -1, 1)),
            Some(TileCoordinates::flat(-1, -1, 0))
        );
        assert_eq!(ground.parent_key(&TileCoordinates::flat(3, 3, 0)), None);
    }

    #[test]
    fn rejects_bad_levels() {
        let mut ground = default_ground(small_config(10));
        assert!(matches!(
            ground.provide(TileCoordinates::flat(0, 0, 4)),
            Err(TerrainError::BadIndex { lod: 4, max_lod: 3 })
        ));
        assert!(matches!(
            ground.tile_key_at(0.0, 0.0, -1),
            Err(TerrainError::BadIndex { .. })
        ));
        assert!(matches!(
            Ground::new(small_config(0)),
            Err(TerrainError::BadConfiguration(_))
        ));
    }

    #[test]
    fn lru_eviction_and_regeneration() {
        let mut ground = default_ground(small_config(2));
        for x in 0..3 {
            ground.provide(TileCoordinates::flat(x, 0, 0)).unwrap();
        }
        assert_eq!(ground.resident_tiles(), 2);
        assert!(!ground.has_tile(&TileCoordinates::flat(0, 0, 0)));
        assert_eq!(ground.stats().evicted, 1);

        let before = ground.stats().generated;
        ground.provide(TileCoordinates::flat(0, 0, 0)).unwrap();
        assert_eq!(ground.stats().generated, before + 1);
        assert!(ground.has_tile(&TileCoordinates::flat(0, 0, 0)));
        assert!(!ground.has_tile(&TileCoordinates::flat(1, 0, 0)));
        assert!(ground.has_tile(&TileCoordinates::flat(2, 0, 0)));
    }

    #[test]
    fn evicted_ancestors_are_regenerated() {
        let mut ground = default_ground(small_config(3));
        ground.provide(TileCoordinates::flat(0, 0, 3)).unwrap();
        assert_eq!(ground.stats().generated, 4);
        assert!(!ground.has_tile(&TileCoordinates::flat(0, 0, 0)));

        ground.provide(TileCoordinates::flat(1, 0, 3)).unwrap();
        assert!(!ground.has_tile(&TileCoordinates::flat(0, 0, 1)));

        ground.provide(TileCoordinates::flat(0, 0, 1)).unwrap();
        assert_eq!(ground.stats().generated, 7);
        assert!(ground.has_tile(&TileCoordinates::flat(0, 0, 0)));
        assert!(ground.has_tile(&TileCoordinates::flat(0, 0, 1)));
        assert_eq!(ground.resident_tiles(), 3);
        assert_eq!(ground.stats().evicted, 4);
    }

    #[test]
    fn regeneration_is_deterministic() {
        let key = TileCoordinates::flat(3, -2, 2);
        let mut a = default_ground(small_config(2));
        let first = a.provide(key).unwrap().clone();
        a.clear_cache();
        assert_eq!(a.resident_tiles(), 0);
        assert_eq!(a.provide(key).unwrap(), &first);

        let mut b = default_ground(small_config(50));
        assert_eq!(b.provide(key).unwrap(), &first);
    }

    #[test]
    fn child_stays_close_to_parent() {
        let mut ground = default_ground(small_config(10));
        let child = ground.provide(TileCoordinates::flat(0, 0, 1)).unwrap().clone();
        let parent = ground.provide(TileCoordinates::flat(0, 0, 0)).unwrap();
        assert!((child.height(0, 0) - parent.height(0, 0)).abs() <= 0.1 + 1e-12);
        let (lo, hi) = child.height_range();
        assert!(lo >= 0.0 && hi <= 1.0);
    }

    #[test]
    fn context_sees_stage_snapshots() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut ground = Ground::new(small_config(10)).unwrap();
        ground.add_worker(Probe(seen.clone())).add_worker(Fill(1.0));

        ground.provide(TileCoordinates::flat(0, 0, 1)).unwrap();
        let root = TileCoordinates::flat(0, 0, 0);
        assert_eq!(ground.provide(root).unwrap().height(0, 0), 1.0);
        assert_eq!(ground.stage_state(&root, 0).unwrap().height(0, 0), 0.25);
        assert!(ground.stage_state(&root, 1).is_none());

        // The child saw its parent as it was after stage 0, not the final tile.
        let expected: Vec<Seen> = vec![
            (root, None, None),
            (TileCoordinates::flat(0, 0, 1), Some(0.25), None),
        ];
        assert_eq!(*seen.borrow(), expected);
        assert_eq!(ground.stats().snapshots, 2);
    }

    #[test]
    fn neighbours_stop_at_parent_boundary() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut ground = Ground::new(small_config(20)).unwrap();
        ground.add_worker(Probe(seen.clone()));

        for x in [0, 1, 3, 4] {
            ground.provide(TileCoordinates::flat(x, 0, 1)).unwrap();
        }
        let left_of = |x: i32| {
            seen.borrow()
                .iter()
                .find(|(key, ..)| *key == TileCoordinates::flat(x, 0, 1))
                .map(|(.., left)| *left)
        };
        assert_eq!(left_of(0), Some(None));
        assert_eq!(left_of(1), Some(Some(0.25)));
        // (3, 0) is resident but belongs to another parent.
        assert_eq!(left_of(4), Some(None));
    }

    #[test]
    fn worker_failure_aborts_only_that_request() {
        let mut ground = Ground::new(small_config(10)).unwrap();
        ground.add_worker(Fill(0.5)).add_worker(FailAt(1));

        ground.provide(TileCoordinates::flat(0, 0, 0)).unwrap();
        assert!(matches!(
            ground.provide(TileCoordinates::flat(0, 0, 1)),
            Err(TerrainError::Worker(_))
        ));
        assert!(ground.has_tile(&TileCoordinates::flat(0, 0, 0)));
        assert!(!ground.has_tile(&TileCoordinates::flat(0, 0, 1)));
        assert_eq!(ground.stats().failures, 1);
    }

    #[test]
    fn altitude_falls_back_to_coarser_levels() {
        let mut ground = Ground::new(small_config(10)).unwrap();
        ground.add_worker(Fill(0.5)).add_worker(FailAt(2));
        // Level 3 and level 2 both fail; level 1 answers.
        let altitude = ground.altitude_at(10.0, 10.0, 1.0).unwrap();
        assert_eq!(altitude, 1000.0);
        assert!(ground.has_tile(&TileCoordinates::flat(0, 0, 1)));
    }

    #[test]
    fn altitude_sampling() {
        let mut ground = default_ground(small_config(10));
        let altitude = ground.altitude_at(100.0, -50.0, 0.0).unwrap();
        assert!((-2000.0..=4000.0).contains(&altitude));
        assert!(ground.has_tile(&TileCoordinates::flat(0, -1, 0)));

        let terrain = ground.provide(TileCoordinates::flat(0, -1, 0)).unwrap();
        let expected = terrain.altitude_at(100.0 / 6000.0, 1.0 - 50.0 / 6000.0);
        assert!((altitude - expected).abs() < 1e-9);
    }

    #[test]
    fn reconfigure_discards_tiles() {
        let mut ground = default_ground(small_config(10));
        ground.provide(TileCoordinates::flat(0, 0, 1)).unwrap();
        assert!(ground.reconfigure(small_config(0)).is_err());
        assert_eq!(ground.resident_tiles(), 2);

        let config = GroundConfig {
            unit_size: 1000.0,
            ..small_config(10)
        };
        ground.reconfigure(config).unwrap();
        assert_eq!(ground.resident_tiles(), 0);
        assert_eq!(ground.tile_width(0), 1000.0);
        assert_eq!(ground.worker_count(), 2);
    }

    #[test]
    fn collects_zone_footprint() {
        let mut chunks = LodGridChunkSystem::new(6000.0).unwrap();
        let zone = chunks.zone_at(DVec3::new(100.0, 100.0, 0.0)).unwrap();
        let view = chunks.view(&zone).unwrap();

        let mut ground = default_ground(GroundConfig {
            max_lod: 1,
            ..small_config(50)
        });
        assert_eq!(ground.level_for_zone(&view), 1);

        let mut collector = MemoryCollector::new();
        let collected = ground.collect_zone(&view, &mut collector).unwrap();
        assert_eq!(collected, 16);
        assert_eq!(collector.terrains.len(), 16);
        assert_eq!(collector.meshes.len(), 16);
        assert!(collector.textures.is_empty());
        let first = collector.terrains.keys().next().unwrap();
        assert_eq!(first.to_string(), "terrain/1/0,0");
    }

    #[test]
    fn zones_outside_altitude_bounds_collect_nothing() {
        let mut chunks = LodGridChunkSystem::new(6000.0).unwrap();
        let zone = chunks.zone_at(DVec3::new(0.0, 0.0, 13000.0)).unwrap();
        let view = chunks.view(&zone).unwrap();

        let mut ground = default_ground(small_config(10));
        let mut collector = MemoryCollector::new();
        assert_eq!(ground.collect_zone(&view, &mut collector).unwrap(), 0);
        assert!(collector.is_empty());
        assert_eq!(ground.resident_tiles(), 0);
    }

    #[test]
    fn collects_textures_when_configured() {
        let mut ground = default_ground(small_config(10));
        let mut builder = TexmapBuilder::new(-2000.0, 4000.0);
        builder
            .add_slice(-2000.0, vec![ColorPart::new(0.1, 0.3, 0.8, 1.0)])
            .unwrap();
        builder
            .add_slice(4000.0, vec![ColorPart::new(1.0, 1.0, 1.0, 1.0)])
            .unwrap();
        ground.set_texture_map(&builder).unwrap();
        assert!(ground.texture_map().is_some());

        let mut collector = MemoryCollector::only(&[Channel::Texture]);
        let key = TileCoordinates::flat(0, 0, 0);
        ground.collect_tile(key, &mut collector).unwrap();
        assert!(collector.terrains.is_empty());
        let texture = &collector.textures[&ItemKey::new(Channel::Texture, key)];
        assert_eq!((texture.width, texture.height), (8, 8));
        assert_eq!(texture.pixels.len(), 64);
    }

    #[test]
    fn observe_altitude_in_zone_coordinates() {
        let mut chunks = LodGridChunkSystem::new(6000.0).unwrap();
        let zone = chunks.zone_at(DVec3::new(-100.0, 100.0, 0.0)).unwrap();
        let view = chunks.view(&zone).unwrap();

        let mut ground = default_ground(small_config(100));
        let altitude = ground.observe_altitude_at(&view, 10.0, 20.0).unwrap();
        assert!((-2000.0..=4000.0).contains(&altitude));
        assert!(ground.has_tile(&ground.tile_key_at(-5990.0, 20.0, 3).unwrap()));
    }
}
