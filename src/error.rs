pub type WallmaskResult<T> = Result<T, WallmaskError>;

#[derive(thiserror::Error, Debug)]
pub enum WallmaskError {
    /// Setup problem discovered before any worker was spawned (unreadable or
    /// empty input directory, bad style/color selection). Fatal.
    #[error("planning error: {0}")]
    Planning(String),

    /// A single rasterize/effect/composite task failed. Recovered at task
    /// granularity: logged and counted, siblings keep running.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// A cached artifact path was referenced but missing at use time.
    /// Treated as a miss: the caller regenerates instead of aborting.
    #[error("cache inconsistency: {0}")]
    Cache(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WallmaskError {
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::Cache(_))
    }
}
