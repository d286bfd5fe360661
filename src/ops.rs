//! Pixel-operation half of the image capability.
//!
//! Geometry, codecs and Gaussian blur are delegated to the `image` crate;
//! this module only adds the blend primitives it lacks (channel multiply,
//! multiplicative brightness, masked paste, alpha-floor compositing), all in
//! `+127 / 255` rounded integer arithmetic.

use std::path::Path;

use anyhow::Context as _;
use image::{GrayImage, Rgb, RgbImage, RgbaImage, imageops};

use crate::error::{WallmaskError, WallmaskResult};

/// Gaussian blur with the fixed radius→sigma mapping `sigma = radius / 2`.
pub fn gaussian_blur(img: &RgbImage, radius: u32) -> RgbImage {
    if radius == 0 {
        return img.clone();
    }
    imageops::blur(img, radius as f32 / 2.0)
}

/// Multiplicative brightness: each channel scaled by `factor`, saturating.
pub fn brightness(img: &RgbImage, factor: f32) -> RgbImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = ((f32::from(*c) * factor).round()).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

pub fn invert(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    imageops::invert(&mut out);
    out
}

pub fn flip_vertical(img: &RgbImage) -> RgbImage {
    imageops::flip_vertical(img)
}

pub fn resize(img: &RgbImage, width: u32, height: u32, filter: imageops::FilterType) -> RgbImage {
    imageops::resize(img, width.max(1), height.max(1), filter)
}

/// Per-channel multiply blend: `out = a * b / 255`.
pub fn multiply(a: &RgbImage, b: &RgbImage) -> WallmaskResult<RgbImage> {
    check_dims("multiply", a.dimensions(), b.dimensions())?;
    let mut out = a.clone();
    for (dst, src) in out.pixels_mut().zip(b.pixels()) {
        for c in 0..3 {
            dst.0[c] = mul_div255(dst.0[c], src.0[c]);
        }
    }
    Ok(out)
}

/// Paste `src` into `dst` through `mask`: per-pixel linear interpolation by
/// the mask value (255 = fully src, 0 = dst untouched).
pub fn paste_masked(dst: &mut RgbImage, src: &RgbImage, mask: &GrayImage) -> WallmaskResult<()> {
    check_dims("paste_masked src", dst.dimensions(), src.dimensions())?;
    check_dims("paste_masked mask", dst.dimensions(), mask.dimensions())?;
    for ((d, s), m) in dst.pixels_mut().zip(src.pixels()).zip(mask.pixels()) {
        let a = m.0[0];
        for c in 0..3 {
            d.0[c] = lerp_u8(d.0[c], s.0[c], a);
        }
    }
    Ok(())
}

/// Paste a solid color into `dst` through `mask`.
pub fn paste_solid(dst: &mut RgbImage, rgb: [u8; 3], mask: &GrayImage) -> WallmaskResult<()> {
    check_dims("paste_solid mask", dst.dimensions(), mask.dimensions())?;
    for (d, m) in dst.pixels_mut().zip(mask.pixels()) {
        let a = m.0[0];
        for c in 0..3 {
            d.0[c] = lerp_u8(d.0[c], rgb[c], a);
        }
    }
    Ok(())
}

/// Composite `src` over a solid-color canvas using `alpha`, with every alpha
/// value below `floor` raised to `floor` first.
pub fn alpha_floor_over(
    src: &RgbImage,
    alpha: &GrayImage,
    canvas_rgb: [u8; 3],
    floor: u8,
) -> WallmaskResult<RgbImage> {
    check_dims("alpha_floor_over", src.dimensions(), alpha.dimensions())?;
    let (w, h) = src.dimensions();
    let mut out = RgbImage::from_pixel(w, h, Rgb(canvas_rgb));
    for ((d, s), m) in out.pixels_mut().zip(src.pixels()).zip(alpha.pixels()) {
        let a = m.0[0].max(floor);
        for c in 0..3 {
            d.0[c] = lerp_u8(d.0[c], s.0[c], a);
        }
    }
    Ok(out)
}

/// Extract the alpha channel of an RGBA raster as a grayscale stencil.
pub fn alpha_stencil(img: &RgbaImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    for (d, s) in out.pixels_mut().zip(img.pixels()) {
        d.0[0] = s.0[3];
    }
    out
}

pub fn save_png(img: &image::DynamicImage, path: &Path) -> WallmaskResult<()> {
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

pub fn save_jpeg(img: &RgbImage, path: &Path, quality: u8) -> WallmaskResult<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("create '{}'", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality);
    img.write_with_encoder(encoder)
        .with_context(|| format!("encode jpeg '{}'", path.display()))?;
    Ok(())
}

/// Decode a source wallpaper. Unlike the artifact loaders below, a failure
/// here is an [`WallmaskError::Artifact`]: the input itself is unreadable and
/// there is nothing cached to regenerate.
pub fn load_source_rgb(path: &Path) -> WallmaskResult<RgbImage> {
    let img = image::open(path).map_err(|e| {
        WallmaskError::artifact(format!("open wallpaper '{}': {e}", path.display()))
    })?;
    Ok(img.to_rgb8())
}

pub fn load_rgb(path: &Path) -> WallmaskResult<RgbImage> {
    let img = image::open(path).map_err(|e| {
        WallmaskError::cache(format!("open image '{}': {e}", path.display()))
    })?;
    Ok(img.to_rgb8())
}

pub fn load_rgba(path: &Path) -> WallmaskResult<RgbaImage> {
    let img = image::open(path).map_err(|e| {
        WallmaskError::cache(format!("open image '{}': {e}", path.display()))
    })?;
    Ok(img.to_rgba8())
}

pub fn load_gray(path: &Path) -> WallmaskResult<GrayImage> {
    let img = image::open(path).map_err(|e| {
        WallmaskError::cache(format!("open stencil '{}': {e}", path.display()))
    })?;
    Ok(img.to_luma8())
}

fn check_dims(op: &str, a: (u32, u32), b: (u32, u32)) -> WallmaskResult<()> {
    if a != b {
        return Err(WallmaskError::artifact(format!(
            "{op} expects matching dimensions, got {}x{} vs {}x{}",
            a.0, a.1, b.0, b.1
        )));
    }
    Ok(())
}

fn mul_div255(x: u8, y: u8) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn lerp_u8(dst: u8, src: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    (((u32::from(src) * a + u32::from(dst) * (255 - a)) + 127) / 255) as u8
}
