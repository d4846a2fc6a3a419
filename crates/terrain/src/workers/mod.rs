//! Reference workers installed by [`Ground::set_default_worker_set`](crate::Ground::set_default_worker_set).

mod fbm;
mod parent_blend;

pub use fbm::NoiseWorker;
pub use parent_blend::ParentBlendWorker;
