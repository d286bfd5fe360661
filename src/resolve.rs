use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use crate::{
    error::WallmaskResult,
    inputs::{MaskRef, WallpaperRef},
    naming,
    style::Style,
};

/// The set of (wallpaper, mask, style) outputs not yet present on disk, built
/// once per run by [`resolve_missing`] and never mutated afterwards. The
/// reduced sets exist for progress reporting only.
#[derive(Clone, Debug, Default)]
pub struct WorkIndex {
    pub missing: BTreeMap<String, BTreeMap<String, BTreeSet<Style>>>,
    pub missing_total: u64,
    pub wallpapers_needed: BTreeSet<String>,
    pub masks_needed: BTreeSet<String>,
    pub styles_needed: BTreeSet<Style>,
}

impl WorkIndex {
    pub fn is_empty(&self) -> bool {
        self.missing_total == 0
    }
}

/// Single linear scan over the full cross product: one metadata probe per
/// triple, no directory listings. A nonexistent output root simply means
/// everything is missing; a probe error on one key is logged and the key
/// treated as missing, since recomputing is always safe and skipping is not.
pub fn resolve_missing(
    wallpapers: &[WallpaperRef],
    masks: &[MaskRef],
    styles: &[Style],
    out_root: &Path,
) -> WallmaskResult<WorkIndex> {
    let mut index = WorkIndex::default();

    for wal in wallpapers {
        for mask in masks {
            for style in styles {
                let path = naming::output_path(out_root, &mask.id, &wal.id, style);
                if output_exists(&path) {
                    continue;
                }
                index
                    .missing
                    .entry(wal.id.clone())
                    .or_default()
                    .entry(mask.id.clone())
                    .or_default()
                    .insert(*style);
                index.missing_total += 1;
                index.wallpapers_needed.insert(wal.id.clone());
                index.masks_needed.insert(mask.id.clone());
                index.styles_needed.insert(*style);
            }
        }
    }

    Ok(index)
}

fn output_exists(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "existence probe failed; treating output as missing");
            false
        }
    }
}
