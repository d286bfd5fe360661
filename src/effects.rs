//! Effect artifact cache: the wallpaper-scoped derived bitmaps. Each effect
//! is a fixed deterministic transform of the wallpaper pixels, persisted once
//! per (wallpaper, effect) key and reused by every style that lists it.

use std::path::PathBuf;

use image::{RgbImage, imageops::FilterType};

use crate::{error::WallmaskResult, naming::EffectKey, ops, store::ArtifactStore, style::EffectKind};

const EFFECT_BLUR_RADIUS: u32 = 80;
const DARK_FACTOR: f32 = 0.8;
const DARKER_FACTOR: f32 = 0.4;
const BRIGHTEN_FACTOR: f32 = 1.1;
const PIXELATE_LINEAR_SCALE: f64 = 0.01;
const PIXELATE_DARKEN: f32 = 0.8;

/// How the `Blurred*` artifacts are produced.
///
/// `DownscaleApprox` blurs a quarter-resolution copy at a quarter of the
/// radius and scales back up. Its output differs slightly from a
/// full-resolution blur; both are valid, so the choice is pinned per run and
/// pixel-exact tests only target `FullResolution`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlurStrategy {
    #[default]
    FullResolution,
    DownscaleApprox,
}

/// Produce (or reuse) one effect artifact. Skip-if-exists: an artifact
/// already on disk is never recomputed within or across stages.
pub fn derive_effect(
    store: &dyn ArtifactStore,
    wallpaper: &RgbImage,
    key: &EffectKey,
    strategy: BlurStrategy,
) -> WallmaskResult<PathBuf> {
    let stem = key.stem();
    let path = store.path_for(&stem);
    if store.contains(&stem) {
        return Ok(path);
    }

    let out = render_effect(wallpaper, key.kind, strategy);
    ops::save_png(&image::DynamicImage::ImageRgb8(out), &path)?;
    tracing::debug!(wallpaper = %key.wallpaper_id, effect = key.kind.stem(), "derived effect artifact");
    Ok(path)
}

fn render_effect(wallpaper: &RgbImage, kind: EffectKind, strategy: BlurStrategy) -> RgbImage {
    match kind {
        EffectKind::Blurred => blurred(wallpaper, strategy),
        EffectKind::BlurredDark => ops::brightness(&blurred(wallpaper, strategy), DARK_FACTOR),
        EffectKind::BlurredDarker => ops::brightness(&blurred(wallpaper, strategy), DARKER_FACTOR),
        EffectKind::Brightened => ops::brightness(wallpaper, BRIGHTEN_FACTOR),
        EffectKind::Negated => ops::invert(wallpaper),
        EffectKind::Flipped => ops::flip_vertical(wallpaper),
        EffectKind::Pixelated => pixelated(wallpaper),
    }
}

fn blurred(wallpaper: &RgbImage, strategy: BlurStrategy) -> RgbImage {
    match strategy {
        BlurStrategy::FullResolution => ops::gaussian_blur(wallpaper, EFFECT_BLUR_RADIUS),
        BlurStrategy::DownscaleApprox => {
            let (w, h) = wallpaper.dimensions();
            let small = ops::resize(wallpaper, w / 4, h / 4, FilterType::CatmullRom);
            let small = ops::gaussian_blur(&small, EFFECT_BLUR_RADIUS / 4);
            ops::resize(&small, w, h, FilterType::CatmullRom)
        }
    }
}

/// Downscale to ~1% linear size with bicubic filtering, darken, and upscale
/// back with nearest-neighbor for the blocky mosaic look.
fn pixelated(wallpaper: &RgbImage) -> RgbImage {
    let (w, h) = wallpaper.dimensions();
    let sw = ((f64::from(w) * PIXELATE_LINEAR_SCALE) as u32).max(1);
    let sh = ((f64::from(h) * PIXELATE_LINEAR_SCALE) as u32).max(1);
    let small = ops::resize(wallpaper, sw, sh, FilterType::CatmullRom);
    let dark = ops::brightness(&small, PIXELATE_DARKEN);
    ops::resize(&dark, w, h, FilterType::Nearest)
}
