use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use terrascape_common::TileCoordinates;

use crate::reducer::GridStorageReducer;

/// Errors from grid storage lookups.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("tile not found: {0}")]
    NotFound(TileCoordinates),
}

/// Exclusive-ownership map from tile coordinates to elements.
///
/// Every successful lookup or insertion is reported to the attached reducer,
/// if any. The storage never drops elements on its own: a reducer can only
/// nominate eviction candidates, and the owner decides whether to remove them.
///
/// The reducer sits behind a `RefCell` so that shared lookups (`try_get`,
/// `get`) can still report accesses. This makes the storage `!Sync`.
pub struct GridStorage<T> {
    storage: HashMap<TileCoordinates, T>,
    reducer: RefCell<Option<Box<dyn GridStorageReducer>>>,
}

impl<T> Default for GridStorage<T> {
    fn default() -> Self {
        Self {
            storage: HashMap::new(),
            reducer: RefCell::new(None),
        }
    }
}

impl<T> GridStorage<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage with a reducer already attached.
    pub fn with_reducer(reducer: impl GridStorageReducer + 'static) -> Self {
        let storage = Self::new();
        *storage.reducer.borrow_mut() = Some(Box::new(reducer));
        storage
    }

    /// Attach a reducer, replacing the previous one. Existing keys are
    /// registered with the new reducer in arbitrary order.
    pub fn set_reducer(&mut self, mut reducer: Box<dyn GridStorageReducer>) {
        for coords in self.storage.keys() {
            reducer.register_access(coords);
        }
        *self.reducer.get_mut() = Some(reducer);
    }

    /// Detach and return the current reducer.
    pub fn clear_reducer(&mut self) -> Option<Box<dyn GridStorageReducer>> {
        self.reducer.get_mut().take()
    }

    pub fn has_reducer(&self) -> bool {
        self.reducer.borrow().is_some()
    }

    /// Insert `value` at `coords`, replacing any existing element.
    pub fn set(&mut self, coords: TileCoordinates, value: T) -> &mut T {
        self.notify(&coords);
        match self.storage.entry(coords) {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(value),
        }
    }

    /// Return the element at `coords`, constructing it with `ctor` if absent.
    pub fn get_or_create(&mut self, coords: TileCoordinates, ctor: impl FnOnce() -> T) -> &mut T {
        self.notify(&coords);
        self.storage.entry(coords).or_insert_with(ctor)
    }

    /// Like [`GridStorage::get_or_create`], running `callback` on the element
    /// only when it was constructed by this call.
    pub fn get_or_create_with(
        &mut self,
        coords: TileCoordinates,
        ctor: impl FnOnce() -> T,
        callback: impl FnOnce(&mut T),
    ) -> &mut T {
        self.notify(&coords);
        match self.storage.entry(coords) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let element = entry.insert(ctor());
                callback(element);
                element
            }
        }
    }

    /// Non-failing lookup.
    pub fn try_get(&self, coords: &TileCoordinates) -> Option<&T> {
        let element = self.storage.get(coords)?;
        self.notify(coords);
        Some(element)
    }

    pub fn try_get_mut(&mut self, coords: &TileCoordinates) -> Option<&mut T> {
        if !self.storage.contains_key(coords) {
            return None;
        }
        self.notify(coords);
        self.storage.get_mut(coords)
    }

    /// Failing lookup.
    pub fn get(&self, coords: &TileCoordinates) -> Result<&T, StorageError> {
        self.try_get(coords)
            .ok_or(StorageError::NotFound(*coords))
    }

    /// Presence check. Does not count as an access.
    pub fn has(&self, coords: &TileCoordinates) -> bool {
        self.storage.contains_key(coords)
    }

    /// Remove and return the element at `coords`; the reducer forgets the key.
    pub fn remove(&mut self, coords: &TileCoordinates) -> Option<T> {
        let removed = self.storage.remove(coords);
        if removed.is_some() {
            if let Some(reducer) = self.reducer.get_mut() {
                reducer.forget(coords);
            }
        }
        removed
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        if let Some(reducer) = self.reducer.get_mut() {
            for coords in self.storage.keys() {
                reducer.forget(coords);
            }
        }
        self.storage.clear();
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Stored keys, in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &TileCoordinates> {
        self.storage.keys()
    }

    /// Keys the reducer would like removed, given the current element count.
    /// Empty when no reducer is attached.
    pub fn eviction_candidates(&self) -> Vec<TileCoordinates> {
        let resident = self.storage.len();
        match self.reducer.borrow_mut().as_mut() {
            Some(reducer) => reducer.candidates(resident),
            None => Vec::new(),
        }
    }

    fn notify(&self, coords: &TileCoordinates) {
        if let Some(reducer) = self.reducer.borrow_mut().as_mut() {
            reducer.register_access(coords);
        }
    }
}

impl<T> fmt::Debug for GridStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridStorage")
            .field("len", &self.storage.len())
            .field("has_reducer", &self.has_reducer())
            .finish()
    }
}
