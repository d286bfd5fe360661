use std::path::PathBuf;

use crate::{effects::BlurStrategy, style::Style};

/// Effective configuration for one run. Constructed once (by the CLI or a
/// test) and passed by reference to every component; nothing reads globals.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub masks_dir: PathBuf,
    pub wallpapers_dir: PathBuf,
    pub out_root: PathBuf,
    /// When set, source wallpapers are read through a persistent
    /// [`SourceCache`](crate::source_cache::SourceCache) under this directory.
    pub cache_dir: Option<PathBuf>,
    /// Fully enumerated style list (base styles and color variants), sorted.
    pub styles: Vec<Style>,
    /// Worker count; `None` leaves one processing unit in reserve.
    pub workers: Option<usize>,
    /// Tasks dispatched per worker batch within a stage.
    pub chunk_size: usize,
    pub blur_strategy: BlurStrategy,
    pub jpeg_quality: u8,
}

impl RunConfig {
    pub fn new(
        masks_dir: impl Into<PathBuf>,
        wallpapers_dir: impl Into<PathBuf>,
        out_root: impl Into<PathBuf>,
        styles: Vec<Style>,
    ) -> Self {
        Self {
            masks_dir: masks_dir.into(),
            wallpapers_dir: wallpapers_dir.into(),
            out_root: out_root.into(),
            cache_dir: None,
            styles,
            workers: None,
            chunk_size: 16,
            blur_strategy: BlurStrategy::default(),
            jpeg_quality: 90,
        }
    }

    /// Bounded pool size: available processing units minus a small reserve,
    /// never below one.
    pub fn effective_workers(&self) -> usize {
        match self.workers {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }

    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}
