//! Pure key-to-path mapping. No I/O: every function here is a deterministic
//! function of its arguments, and distinct logical keys never produce the
//! same string (id, size and artifact family are all encoded in the stem).

use std::path::{Path, PathBuf};

use crate::style::{EffectKind, Style};

/// Final output location: `<out_root>/<mask>/<wallpaper>/<style>.jpg`.
pub fn output_path(out_root: &Path, mask_id: &str, wallpaper_id: &str, style: &Style) -> PathBuf {
    out_root
        .join(mask_id)
        .join(wallpaper_id)
        .join(format!("{}.jpg", style.name()))
}

/// Cache key for a mask rasterized at one output size. Two wallpapers with
/// identical dimensions share the artifacts behind one `MaskKey`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskKey {
    pub mask_id: String,
    pub width: u32,
    pub height: u32,
}

impl MaskKey {
    pub fn stencil_stem(&self) -> String {
        format!("mask_{}_{}x{}.png", self.mask_id, self.width, self.height)
    }

    pub fn shadow_stem(&self) -> String {
        format!("shadow_{}_{}x{}.png", self.mask_id, self.width, self.height)
    }

    pub fn logo_stem(&self) -> String {
        format!("logo_{}_{}x{}.png", self.mask_id, self.width, self.height)
    }
}

/// Cache key for one wallpaper-scoped effect artifact.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectKey {
    pub wallpaper_id: String,
    pub kind: EffectKind,
}

impl EffectKey {
    /// The kind sits behind a `__` separator in terminal position: kind stems
    /// never contain `__`, so a wallpaper id ending in a kind-stem prefix
    /// (e.g. `dark_w`) cannot alias another key's stem.
    pub fn stem(&self) -> String {
        format!("{}__{}.png", self.wallpaper_id, self.kind.stem())
    }
}
