#![forbid(unsafe_code)]

pub mod compose;
pub mod config;
pub mod effects;
pub mod error;
pub mod inputs;
pub mod naming;
pub mod ops;
pub mod palette;
pub mod pipeline;
pub mod raster;
pub mod resolve;
pub mod source_cache;
pub mod store;
pub mod style;

pub use config::RunConfig;
pub use effects::BlurStrategy;
pub use error::{WallmaskError, WallmaskResult};
pub use inputs::{MaskRef, WallpaperRef};
pub use palette::{Color, all_colors, color_by_name};
pub use pipeline::{RunPlan, RunReport, plan_run, run};
pub use resolve::{WorkIndex, resolve_missing};
pub use style::{EffectKind, Style};
