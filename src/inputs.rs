use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::Context as _;

use crate::error::{WallmaskError, WallmaskResult};

/// A vector mask definition. Identity is the file stem; rasterization is
/// parameterized by output size, so a `MaskRef` alone is not a cache key.
#[derive(Clone, Debug)]
pub struct MaskRef {
    pub id: String,
    pub path: PathBuf,
}

/// A source wallpaper. Identity is the file stem. Pixel dimensions are read
/// lazily from the image header, once, and are immutable for the run.
#[derive(Debug)]
pub struct WallpaperRef {
    pub id: String,
    pub path: PathBuf,
    dimensions: OnceLock<(u32, u32)>,
}

impl WallpaperRef {
    pub fn new(id: String, path: PathBuf) -> Self {
        Self {
            id,
            path,
            dimensions: OnceLock::new(),
        }
    }

    /// Header-only probe; does not decode pixel data.
    pub fn dimensions(&self) -> WallmaskResult<(u32, u32)> {
        if let Some(&dims) = self.dimensions.get() {
            return Ok(dims);
        }
        let dims = image::image_dimensions(&self.path)
            .with_context(|| format!("read dimensions of '{}'", self.path.display()))?;
        Ok(*self.dimensions.get_or_init(|| dims))
    }
}

const WALLPAPER_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Scan the masks directory for `.svg` files, sorted by id. Empty or
/// unreadable directories are planning errors: nothing has been spawned yet
/// and there is no useful partial run.
pub fn scan_masks(dir: &Path) -> WallmaskResult<Vec<MaskRef>> {
    let entries = sorted_files(dir)?;
    let masks: Vec<MaskRef> = entries
        .into_iter()
        .filter(|p| has_ext(p, &["svg"]))
        .filter_map(|path| {
            let id = file_stem(&path)?;
            Some(MaskRef { id, path })
        })
        .collect();
    if masks.is_empty() {
        return Err(WallmaskError::planning(format!(
            "no .svg masks found in '{}'",
            dir.display()
        )));
    }
    Ok(masks)
}

pub fn scan_wallpapers(dir: &Path) -> WallmaskResult<Vec<WallpaperRef>> {
    let entries = sorted_files(dir)?;
    let wallpapers: Vec<WallpaperRef> = entries
        .into_iter()
        .filter(|p| has_ext(p, WALLPAPER_EXTS))
        .filter_map(|path| {
            let id = file_stem(&path)?;
            Some(WallpaperRef::new(id, path))
        })
        .collect();
    if wallpapers.is_empty() {
        return Err(WallmaskError::planning(format!(
            "no wallpapers found in '{}'",
            dir.display()
        )));
    }
    Ok(wallpapers)
}

fn sorted_files(dir: &Path) -> WallmaskResult<Vec<PathBuf>> {
    let rd = std::fs::read_dir(dir)
        .map_err(|e| WallmaskError::planning(format!("read directory '{}': {e}", dir.display())))?;
    let mut files = Vec::new();
    for entry in rd {
        let entry =
            entry.map_err(|e| WallmaskError::planning(format!("list '{}': {e}", dir.display())))?;
        let path = entry.path();
        if path.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "wallmask_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn empty_mask_dir_is_planning_error() {
        let tmp = temp_dir("inputs_empty");
        std::fs::create_dir_all(&tmp).unwrap();
        let err = scan_masks(&tmp).unwrap_err();
        assert!(err.to_string().contains("planning error:"));
        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn missing_dir_is_planning_error() {
        let tmp = temp_dir("inputs_missing");
        assert!(scan_wallpapers(&tmp).is_err());
    }

    #[test]
    fn scan_is_sorted_and_filters_extensions() {
        let tmp = temp_dir("inputs_scan");
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("b.svg"), "<svg/>").unwrap();
        std::fs::write(tmp.join("a.svg"), "<svg/>").unwrap();
        std::fs::write(tmp.join("notes.txt"), "x").unwrap();
        std::fs::write(tmp.join(".hidden.svg"), "<svg/>").unwrap();

        let masks = scan_masks(&tmp).unwrap();
        let ids: Vec<&str> = masks.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn wallpaper_dimensions_are_cached() {
        let tmp = temp_dir("inputs_dims");
        std::fs::create_dir_all(&tmp).unwrap();
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]));
        let path = tmp.join("w.png");
        img.save(&path).unwrap();

        let wal = WallpaperRef::new("w".into(), path.clone());
        assert_eq!(wal.dimensions().unwrap(), (3, 2));
        // A second read must come from the cached value, not the file.
        std::fs::remove_file(&path).unwrap();
        assert_eq!(wal.dimensions().unwrap(), (3, 2));
        std::fs::remove_dir_all(&tmp).ok();
    }
}
