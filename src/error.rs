use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// The model asset is malformed or internally inconsistent
    #[error("Asset format error: {0}")]
    AssetFormat(String),

    /// The model asset is not valid JSON
    #[error("Asset format error: {0}")]
    Json(#[from] serde_json::Error),

    /// More models than the selector channel can address
    #[error("Unsupported model count: {count} > {max}")]
    UnsupportedModelCount { count: usize, max: usize },

    /// Edit referenced a model that is not loaded
    #[error("Invalid model id {id} (bank holds {count} models)")]
    InvalidModelId { id: usize, count: usize },

    /// Render mode not supported for this field
    #[error("Unsupported render mode: {0}")]
    UnsupportedRenderMode(String),

    /// Grid or view dimensions unusable
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// No adapter or device could be created
    #[error("GPU unavailable: {0}")]
    GpuUnavailable(String),

    /// The device or surface was lost; the engine must be rebuilt
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// Operation called after `destroy()`
    #[error("Engine destroyed")]
    EngineDestroyed,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Create an asset format error
    pub fn asset(msg: impl Into<String>) -> Self {
        Self::AssetFormat(msg.into())
    }

    /// Create an invalid grid error
    pub fn grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Create a device lost error
    pub fn device_lost(msg: impl Into<String>) -> Self {
        Self::DeviceLost(msg.into())
    }

    /// Whether the engine instance is unusable after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InvalidModelId { .. } | Self::UnsupportedRenderMode(_) | Self::InvalidGrid(_)
        )
    }
}
