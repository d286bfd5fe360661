//! Mask rasterization cache: SVG → (stencil, shadow, full-chroma logo) at an
//! exact output size, persisted under shared temp keys with skip-if-exists
//! semantics. At-most-once production is a planning responsibility: the
//! pipeline schedules each (mask, size) key once, and a racing duplicate
//! would only waste work, never corrupt it, because production is
//! deterministic.

use std::path::PathBuf;

use image::RgbImage;

use crate::{
    error::{WallmaskError, WallmaskResult},
    inputs::MaskRef,
    naming::MaskKey,
    ops,
    store::ArtifactStore,
};

/// Blur radius for the shadow (blurred white-background mask rendering).
const SHADOW_BLUR_RADIUS: u32 = 100;

/// Paths of the three per-(mask, size) artifacts.
#[derive(Clone, Debug)]
pub struct MaskArtifact {
    pub stencil: PathBuf,
    pub shadow: PathBuf,
    pub logo: PathBuf,
}

impl MaskArtifact {
    pub fn paths_for(store: &dyn ArtifactStore, key: &MaskKey) -> Self {
        Self {
            stencil: store.path_for(&key.stencil_stem()),
            shadow: store.path_for(&key.shadow_stem()),
            logo: store.path_for(&key.logo_stem()),
        }
    }
}

/// Produce (or reuse) the mask artifacts for one (mask, size) key.
pub fn rasterize_mask(
    store: &dyn ArtifactStore,
    mask: &MaskRef,
    key: &MaskKey,
) -> WallmaskResult<MaskArtifact> {
    let artifact = MaskArtifact::paths_for(store, key);
    if store.contains(&key.stencil_stem())
        && store.contains(&key.shadow_stem())
        && store.contains(&key.logo_stem())
    {
        return Ok(artifact);
    }

    let logo = render_svg(mask, key.width, key.height)?;
    let stencil = ops::alpha_stencil(&logo);

    // Shadow: logo pasted onto white through its own alpha, heavily blurred.
    let logo_rgb: RgbImage = image::DynamicImage::ImageRgba8(logo.clone()).to_rgb8();
    let mut shadow = RgbImage::from_pixel(key.width, key.height, image::Rgb([255, 255, 255]));
    ops::paste_masked(&mut shadow, &logo_rgb, &stencil)?;
    let shadow = ops::gaussian_blur(&shadow, SHADOW_BLUR_RADIUS);

    ops::save_png(&image::DynamicImage::ImageLuma8(stencil), &artifact.stencil)?;
    ops::save_png(&image::DynamicImage::ImageRgb8(shadow), &artifact.shadow)?;
    ops::save_png(&image::DynamicImage::ImageRgba8(logo), &artifact.logo)?;

    tracing::debug!(mask = %mask.id, width = key.width, height = key.height, "rasterized mask");
    Ok(artifact)
}

/// Rasterize the SVG at exactly (width, height), returning straight-alpha
/// RGBA at full chroma.
fn render_svg(mask: &MaskRef, width: u32, height: u32) -> WallmaskResult<image::RgbaImage> {
    let data = std::fs::read(&mask.path).map_err(|e| {
        WallmaskError::artifact(format!("read svg '{}': {e}", mask.path.display()))
    })?;
    let tree = usvg::Tree::from_data(&data, &usvg::Options::default()).map_err(|e| {
        WallmaskError::artifact(format!("parse svg '{}': {e}", mask.path.display()))
    })?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| WallmaskError::artifact("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);
    resvg::render(&tree, xform, &mut pixmap.as_mut());

    let mut rgba = pixmap.data().to_vec();
    unpremultiply_rgba8_in_place(&mut rgba);
    image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| WallmaskError::artifact("svg pixmap size mismatch"))
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in 0..3 {
            px[c] = ((px[c] as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
