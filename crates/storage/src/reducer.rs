use std::collections::HashMap;

use terrascape_common::TileCoordinates;

/// Access-notification hook attached to a [`GridStorage`](crate::GridStorage).
///
/// The reducer owns the eviction policy: it is told about every successful
/// access and every removal, and nominates keys to discard on request.
pub trait GridStorageReducer {
    /// Called on every successful lookup or insertion of `coords`.
    fn register_access(&mut self, coords: &TileCoordinates);

    /// Called when `coords` leaves the storage.
    fn forget(&mut self, _coords: &TileCoordinates) {}

    /// Keys to remove given `resident` stored elements, most expendable first.
    fn candidates(&mut self, _resident: usize) -> Vec<TileCoordinates> {
        Vec::new()
    }
}

/// Least-recently-used policy bounded to `max_size` resident elements.
#[derive(Debug, Clone)]
pub struct LruReducer {
    max_size: usize,
    clock: u64,
    last_access: HashMap<TileCoordinates, u64>,
}

impl LruReducer {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            clock: 0,
            last_access: HashMap::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.last_access.len()
    }
}

impl GridStorageReducer for LruReducer {
    fn register_access(&mut self, coords: &TileCoordinates) {
        self.clock += 1;
        self.last_access.insert(*coords, self.clock);
    }

    fn forget(&mut self, coords: &TileCoordinates) {
        self.last_access.remove(coords);
    }

    fn candidates(&mut self, resident: usize) -> Vec<TileCoordinates> {
        if resident <= self.max_size {
            return Vec::new();
        }
        let excess = resident - self.max_size;
        let mut by_age: Vec<(u64, TileCoordinates)> = self
            .last_access
            .iter()
            .map(|(coords, tick)| (*tick, *coords))
            .collect();
        by_age.sort_unstable_by_key(|(tick, _)| *tick);
        let victims: Vec<TileCoordinates> = by_age
            .into_iter()
            .take(excess)
            .map(|(_, coords)| coords)
            .collect();
        tracing::trace!(resident, excess, victims = victims.len(), "lru candidates");
        victims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32) -> TileCoordinates {
        TileCoordinates::flat(x, 0, 0)
    }

    #[test]
    fn under_capacity_nominates_nothing() {
        let mut lru = LruReducer::new(3);
        lru.register_access(&key(0));
        lru.register_access(&key(1));
        assert!(lru.candidates(2).is_empty());
        assert!(lru.candidates(3).is_empty());
    }

    #[test]
    fn oldest_first() {
        let mut lru = LruReducer::new(2);
        for x in 0..4 {
            lru.register_access(&key(x));
        }
        assert_eq!(lru.candidates(4), vec![key(0), key(1)]);
    }

    #[test]
    fn access_refreshes_age() {
        let mut lru = LruReducer::new(2);
        lru.register_access(&key(0));
        lru.register_access(&key(1));
        lru.register_access(&key(2));
        lru.register_access(&key(0));
        assert_eq!(lru.candidates(3), vec![key(1)]);
    }

    #[test]
    fn forgotten_keys_are_never_nominated() {
        let mut lru = LruReducer::new(1);
        lru.register_access(&key(0));
        lru.register_access(&key(1));
        lru.forget(&key(0));
        assert_eq!(lru.tracked(), 1);
        assert!(lru.candidates(1).is_empty());
    }
}
