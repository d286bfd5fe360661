//! Final composition: one pure rule per style, dispatched by a single
//! exhaustive match. Every call opens its own handles on the cached
//! artifacts and writes a brand-new image; shared artifacts are never
//! mutated. A missing artifact surfaces as a cache-inconsistency error so
//! the caller can regenerate and retry instead of aborting.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use image::{GrayImage, Rgb, RgbImage};

use crate::{
    error::{WallmaskError, WallmaskResult},
    ops,
    raster::MaskArtifact,
    style::{EffectKind, Style},
};

/// ColorThrough alpha floor: mask pixels more transparent than 50% are
/// composited at exactly 50%.
const THROUGH_ALPHA_FLOOR: u8 = 128;

/// Compose one final bitmap from the wallpaper and its cached artifacts.
pub fn compose(
    style: &Style,
    wallpaper: &RgbImage,
    mask: &MaskArtifact,
    effects: &BTreeMap<EffectKind, PathBuf>,
) -> WallmaskResult<RgbImage> {
    let stencil = ops::load_gray(&mask.stencil)?;
    let effect = |kind: EffectKind| -> WallmaskResult<RgbImage> {
        let path = effects.get(&kind).ok_or_else(|| {
            WallmaskError::cache(format!("effect '{}' was not planned for this output", kind.stem()))
        })?;
        ops::load_rgb(path)
    };
    let shaded_base = |base: &RgbImage| -> WallmaskResult<RgbImage> {
        let shadow = ops::load_rgb(&mask.shadow)?;
        ops::multiply(base, &shadow)
    };

    match style {
        Style::ThroughBlack => {
            let (w, h) = wallpaper.dimensions();
            let mut out = RgbImage::from_pixel(w, h, Rgb([0, 0, 0]));
            ops::paste_masked(&mut out, wallpaper, &stencil)?;
            Ok(out)
        }
        Style::Blur => {
            let mut out = shaded_base(&effect(EffectKind::BlurredDark)?)?;
            ops::paste_masked(&mut out, &effect(EffectKind::Brightened)?, &stencil)?;
            Ok(out)
        }
        Style::InverseBlur => {
            let mut out = shaded_base(wallpaper)?;
            ops::paste_masked(&mut out, &effect(EffectKind::BlurredDark)?, &stencil)?;
            Ok(out)
        }
        Style::InverseBlurDarker => {
            let mut out = shaded_base(wallpaper)?;
            ops::paste_masked(&mut out, &effect(EffectKind::BlurredDarker)?, &stencil)?;
            Ok(out)
        }
        Style::Negate => {
            let mut out = wallpaper.clone();
            ops::paste_masked(&mut out, &effect(EffectKind::Negated)?, &stencil)?;
            Ok(out)
        }
        Style::InverseNegate => {
            let mut out = effect(EffectKind::Negated)?;
            ops::paste_masked(&mut out, wallpaper, &stencil)?;
            Ok(out)
        }
        Style::Flip => {
            let mut out = shaded_base(wallpaper)?;
            ops::paste_masked(&mut out, &effect(EffectKind::Flipped)?, &stencil)?;
            Ok(out)
        }
        Style::Pixelate => {
            let mut out = effect(EffectKind::Pixelated)?;
            ops::paste_masked(&mut out, wallpaper, &stencil)?;
            Ok(out)
        }
        Style::InversePixelate => {
            let mut out = wallpaper.clone();
            ops::paste_masked(&mut out, &effect(EffectKind::Pixelated)?, &stencil)?;
            Ok(out)
        }
        Style::ColorOverlay(c) => {
            let mut out = shaded_base(wallpaper)?;
            ops::paste_solid(&mut out, c.rgb, &stencil)?;
            Ok(out)
        }
        Style::ColorOverlayBlur(c) => {
            let mut out = shaded_base(&effect(EffectKind::Blurred)?)?;
            ops::paste_solid(&mut out, c.rgb, &stencil)?;
            Ok(out)
        }
        Style::ColorThrough(c) => {
            // The logo keeps its own alpha channel; luminance is irrelevant.
            let logo = ops::load_rgba(&mask.logo)?;
            let alpha: GrayImage = ops::alpha_stencil(&logo);
            ops::alpha_floor_over(wallpaper, &alpha, c.rgb, THROUGH_ALPHA_FLOOR)
        }
    }
}

/// Write the composed image to its final path, skipping if it already exists.
///
/// The image is encoded to a sibling temp file and renamed into place, so a
/// final output path only ever holds a fully-written file. Returns `true`
/// when this call produced the output.
pub fn save_final(img: &RgbImage, out_path: &Path, jpeg_quality: u8) -> WallmaskResult<bool> {
    if out_path.exists() {
        return Ok(false);
    }
    let parent = out_path
        .parent()
        .ok_or_else(|| WallmaskError::artifact("output path has no parent directory"))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create output dir '{}'", parent.display()))?;

    let tmp = out_path.with_extension(format!("jpg.tmp.{}", std::process::id()));
    ops::save_jpeg(img, &tmp, jpeg_quality)?;
    std::fs::rename(&tmp, out_path)
        .with_context(|| format!("publish output '{}'", out_path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        naming::MaskKey,
        palette::color_by_name,
        store::{ArtifactStore, TempStore},
    };
    use image::Luma;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 31 % 256) as u8, (y * 17 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    /// Write synthetic mask artifacts: a uniform stencil at `alpha`, a white
    /// shadow, and a red logo whose alpha matches the stencil.
    fn mask_fixture(store: &TempStore, w: u32, h: u32, alpha: u8) -> MaskArtifact {
        let key = MaskKey {
            mask_id: "t".into(),
            width: w,
            height: h,
        };
        let artifact = MaskArtifact::paths_for(store, &key);
        let stencil = GrayImage::from_pixel(w, h, Luma([alpha]));
        let shadow = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
        let logo = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, alpha]));
        ops::save_png(&image::DynamicImage::ImageLuma8(stencil), &artifact.stencil).unwrap();
        ops::save_png(&image::DynamicImage::ImageRgb8(shadow), &artifact.shadow).unwrap();
        ops::save_png(&image::DynamicImage::ImageRgba8(logo), &artifact.logo).unwrap();
        artifact
    }

    fn effect_fixture(
        store: &TempStore,
        kind: EffectKind,
        img: &RgbImage,
    ) -> (EffectKind, PathBuf) {
        let path = store.path_for(&format!("{}_t.png", kind.stem()));
        ops::save_png(&image::DynamicImage::ImageRgb8(img.clone()), &path).unwrap();
        (kind, path)
    }

    #[test]
    fn through_black_with_opaque_mask_is_the_wallpaper() {
        let store = TempStore::create().unwrap();
        let wal = gradient(6, 4);
        let mask = mask_fixture(&store, 6, 4, 255);
        let out = compose(&Style::ThroughBlack, &wal, &mask, &BTreeMap::new()).unwrap();
        assert_eq!(out, wal);
    }

    #[test]
    fn through_black_with_transparent_mask_is_black() {
        let store = TempStore::create().unwrap();
        let wal = gradient(6, 4);
        let mask = mask_fixture(&store, 6, 4, 0);
        let out = compose(&Style::ThroughBlack, &wal, &mask, &BTreeMap::new()).unwrap();
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn color_overlay_black_and_white_are_exact_at_opaque_pixels() {
        let store = TempStore::create().unwrap();
        let wal = gradient(6, 4);
        let mask = mask_fixture(&store, 6, 4, 255);

        let black = color_by_name("Black").unwrap();
        let out = compose(&Style::ColorOverlay(black), &wal, &mask, &BTreeMap::new()).unwrap();
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0]));

        let white = color_by_name("White").unwrap();
        let out = compose(&Style::ColorOverlay(white), &wal, &mask, &BTreeMap::new()).unwrap();
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn negate_swaps_regions_with_inverse_negate() {
        let store = TempStore::create().unwrap();
        let wal = gradient(4, 4);
        let negated = ops::invert(&wal);
        let mask = mask_fixture(&store, 4, 4, 255);
        let effects = BTreeMap::from([effect_fixture(&store, EffectKind::Negated, &negated)]);

        // Fully-opaque mask: Negate shows the negated image everywhere,
        // InverseNegate shows the wallpaper everywhere.
        let neg = compose(&Style::Negate, &wal, &mask, &effects).unwrap();
        assert_eq!(neg, negated);
        let inv = compose(&Style::InverseNegate, &wal, &mask, &effects).unwrap();
        assert_eq!(inv, wal);
    }

    #[test]
    fn color_through_floors_background_alpha_at_half() {
        let store = TempStore::create().unwrap();
        let wal = RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]));
        let mask = mask_fixture(&store, 2, 2, 0);
        let black = color_by_name("Black").unwrap();
        let out = compose(&Style::ColorThrough(black), &wal, &mask, &BTreeMap::new()).unwrap();
        let px = out.get_pixel(0, 0).0;
        assert!(px[0] >= 100 && px[0] <= 101, "got {px:?}");
    }

    #[test]
    fn missing_effect_artifact_is_a_cache_error() {
        let store = TempStore::create().unwrap();
        let wal = gradient(4, 4);
        let mask = mask_fixture(&store, 4, 4, 255);
        let err = compose(&Style::Negate, &wal, &mask, &BTreeMap::new()).unwrap_err();
        assert!(err.is_cache_miss());
    }

    #[test]
    fn save_final_skips_existing_and_leaves_no_temp_files() {
        let store = TempStore::create().unwrap();
        let out_path = store.path_for("out/m/w/ThroughBlack.jpg");
        let img = gradient(4, 4);

        assert!(save_final(&img, &out_path, 90).unwrap());
        assert!(!save_final(&img, &out_path, 90).unwrap());

        let siblings: Vec<_> = std::fs::read_dir(out_path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(siblings.len(), 1);
    }
}
