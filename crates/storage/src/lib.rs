//! Keyed tile storage with an access-notification hook.
//!
//! # Invariants
//! - The storage exclusively owns its elements.
//! - Every successful access is reported to the attached reducer.
//! - The storage never evicts on its own; eviction policy lives in the reducer.

mod grid;
mod reducer;

pub use grid::{GridStorage, StorageError};
pub use reducer::{GridStorageReducer, LruReducer};

pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"))
}
