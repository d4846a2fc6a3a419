use terrascape_chunk::ChunkError;
use terrascape_storage::StorageError;

/// Errors from terrain generation and configuration.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    #[error("bad LOD index {lod}: expected 0..={max_lod}")]
    BadIndex { lod: i32, max_lod: i32 },
    #[error("bad configuration: {0}")]
    BadConfiguration(String),
    #[error("worker failed: {0}")]
    Worker(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
