//! Run orchestration: missing-work resolution, task planning, and the three
//! sequential parallel stages (rasterize masks, derive effects, composite).
//!
//! Workers share no mutable memory; all cross-task communication is file
//! paths derived from collision-free keys, so "create if absent" substitutes
//! for locking. Stages never overlap: stage N+1 only starts after stage N's
//! task list is exhausted, which is the entire ordering guarantee.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use rayon::prelude::*;

use crate::{
    compose,
    config::RunConfig,
    effects,
    error::{WallmaskError, WallmaskResult},
    inputs::{self, MaskRef, WallpaperRef},
    naming::{self, EffectKey, MaskKey},
    ops,
    raster::{self, MaskArtifact},
    resolve::{self, WorkIndex},
    source_cache::SourceCache,
    store::{ArtifactStore, TempStore},
    style::{EffectKind, Style},
};

/// One deduplicated (mask, size) rasterization task.
#[derive(Clone, Debug)]
pub struct RasterTask {
    pub mask: MaskRef,
    pub key: MaskKey,
}

/// One final output to composite.
#[derive(Clone, Debug)]
pub struct CompositeTask {
    pub mask: MaskRef,
    pub mask_key: MaskKey,
    pub style: Style,
}

/// Work planned for a single wallpaper: the minimal effect set it needs and
/// the composites that consume those artifacts.
#[derive(Clone, Debug)]
pub struct WallpaperPlan {
    pub id: String,
    pub path: PathBuf,
    pub effects: BTreeSet<EffectKind>,
    pub composites: Vec<CompositeTask>,
}

/// The full task graph for a run, derived from a [`WorkIndex`].
#[derive(Clone, Debug, Default)]
pub struct RunPlan {
    pub raster_tasks: Vec<RasterTask>,
    pub wallpapers: Vec<WallpaperPlan>,
    /// Keys that failed before any stage ran (e.g. unreadable dimensions).
    pub planning_failures: Vec<String>,
}

/// End-of-run summary.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub missing_before: u64,
    pub produced: u64,
    pub skipped: u64,
    pub failed_keys: Vec<String>,
}

impl RunReport {
    pub fn failed(&self) -> u64 {
        self.failed_keys.len() as u64
    }
}

/// Reduce the work index to the minimal task graph.
///
/// Each (mask, size) pair appears in `raster_tasks` exactly once, no matter
/// how many wallpapers share that resolution, and every wallpaper's effect
/// set is the union over its missing styles only. A wallpaper whose
/// dimensions cannot be read is dropped from the plan with all its keys
/// recorded as failures; its siblings proceed.
pub fn plan_run(index: &WorkIndex, wallpapers: &[WallpaperRef], masks: &[MaskRef]) -> RunPlan {
    let mask_by_id: BTreeMap<&str, &MaskRef> = masks.iter().map(|m| (m.id.as_str(), m)).collect();
    let mut plan = RunPlan::default();
    let mut raster_seen = BTreeSet::<MaskKey>::new();

    for wal in wallpapers {
        let Some(per_mask) = index.missing.get(&wal.id) else {
            continue;
        };

        let (width, height) = match wal.dimensions() {
            Ok(dims) => dims,
            Err(e) => {
                tracing::error!(wallpaper = %wal.id, error = %e, "skipping wallpaper; dimensions unreadable");
                for (mask_id, styles) in per_mask {
                    for style in styles {
                        plan.planning_failures
                            .push(format!("{mask_id}/{}/{}", wal.id, style.name()));
                    }
                }
                continue;
            }
        };

        let mut wal_plan = WallpaperPlan {
            id: wal.id.clone(),
            path: wal.path.clone(),
            effects: BTreeSet::new(),
            composites: Vec::new(),
        };

        for (mask_id, styles) in per_mask {
            let Some(mask) = mask_by_id.get(mask_id.as_str()) else {
                continue;
            };
            let mask_key = MaskKey {
                mask_id: mask_id.clone(),
                width,
                height,
            };
            if raster_seen.insert(mask_key.clone()) {
                plan.raster_tasks.push(RasterTask {
                    mask: (*mask).clone(),
                    key: mask_key.clone(),
                });
            }
            for style in styles {
                wal_plan.effects.extend(style.required_effects());
                wal_plan.composites.push(CompositeTask {
                    mask: (*mask).clone(),
                    mask_key: mask_key.clone(),
                    style: *style,
                });
            }
        }

        plan.wallpapers.push(wal_plan);
    }

    plan
}

/// Execute a full incremental run.
pub fn run(cfg: &RunConfig) -> WallmaskResult<RunReport> {
    let masks = inputs::scan_masks(&cfg.masks_dir)?;
    let wallpapers = localize_sources(cfg, inputs::scan_wallpapers(&cfg.wallpapers_dir)?)?;

    let index = resolve::resolve_missing(&wallpapers, &masks, &cfg.styles, &cfg.out_root)?;
    tracing::info!(
        missing = index.missing_total,
        wallpapers = index.wallpapers_needed.len(),
        masks = index.masks_needed.len(),
        styles = index.styles_needed.len(),
        "resolved missing work"
    );
    if index.is_empty() {
        return Ok(RunReport::default());
    }

    let plan = plan_run(&index, &wallpapers, &masks);
    let mut report = RunReport {
        missing_before: index.missing_total,
        ..RunReport::default()
    };
    report.failed_keys.extend(plan.planning_failures.clone());

    // The temp store is removed on every exit path, including the error
    // returns below, by its Drop impl.
    let store = TempStore::create()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.effective_workers())
        .build()
        .map_err(|e| WallmaskError::planning(format!("failed to build worker pool: {e}")))?;
    let chunk = cfg.effective_chunk_size();

    // Stage 1: rasterize all distinct (mask, size) pairs.
    let raster_failures: Vec<String> = pool.install(|| {
        plan.raster_tasks
            .par_chunks(chunk)
            .flat_map_iter(|tasks| {
                tasks.iter().filter_map(|task| {
                    match raster::rasterize_mask(&store, &task.mask, &task.key) {
                        Ok(_) => None,
                        Err(e) => {
                            tracing::error!(mask = %task.key.mask_id, error = %e, "mask rasterization failed");
                            Some(format!(
                                "raster:{}@{}x{}",
                                task.key.mask_id, task.key.width, task.key.height
                            ))
                        }
                    }
                })
            })
            .collect()
    });
    report.failed_keys.extend(raster_failures);
    tracing::info!(tasks = plan.raster_tasks.len(), "mask raster stage complete");

    // Stage 2: derive all required effect artifacts. Batched per wallpaper
    // so each source image is decoded once per dispatch.
    let effect_failures: Vec<String> = pool.install(|| {
        plan.wallpapers
            .par_chunks(1.max(chunk / 4))
            .flat_map_iter(|plans| {
                plans
                    .iter()
                    .flat_map(|wal| derive_wallpaper_effects(&store, wal, cfg))
            })
            .collect()
    });
    report.failed_keys.extend(effect_failures);
    tracing::info!(wallpapers = plan.wallpapers.len(), "effect stage complete");

    // Stage 3: composite, one wallpaper at a time so its temp artifacts can
    // be evicted as soon as no remaining work needs them. Mask artifacts are
    // shared across same-size wallpapers and released by refcount.
    let mut mask_holders = BTreeMap::<MaskKey, usize>::new();
    for wal in &plan.wallpapers {
        let distinct: BTreeSet<&MaskKey> = wal.composites.iter().map(|c| &c.mask_key).collect();
        for key in distinct {
            *mask_holders.entry(key.clone()).or_default() += 1;
        }
    }

    for wal in &plan.wallpapers {
        composite_wallpaper(&store, wal, cfg, &pool, chunk, &mut report);

        for &kind in &wal.effects {
            store.remove(
                &EffectKey {
                    wallpaper_id: wal.id.clone(),
                    kind,
                }
                .stem(),
            );
        }
        let distinct: BTreeSet<MaskKey> =
            wal.composites.iter().map(|c| c.mask_key.clone()).collect();
        for key in distinct {
            if let Some(count) = mask_holders.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    store.remove(&key.stencil_stem());
                    store.remove(&key.shadow_stem());
                    store.remove(&key.logo_stem());
                }
            }
        }
    }

    tracing::info!(
        produced = report.produced,
        skipped = report.skipped,
        failed = report.failed(),
        "run complete"
    );
    Ok(report)
}

/// Route source wallpapers through the persistent cache when configured.
/// A per-file cache failure falls back to the original path: reading the
/// source directly is always correct, just slower.
fn localize_sources(
    cfg: &RunConfig,
    wallpapers: Vec<WallpaperRef>,
) -> WallmaskResult<Vec<WallpaperRef>> {
    let Some(cache_dir) = &cfg.cache_dir else {
        return Ok(wallpapers);
    };
    let mut cache = SourceCache::open(cache_dir)?;
    Ok(wallpapers
        .into_iter()
        .map(|wal| match cache.get_local(&wal.path) {
            Ok(local) => WallpaperRef::new(wal.id, local),
            Err(e) => {
                tracing::warn!(wallpaper = %wal.id, error = %e, "source cache fallback to direct read");
                wal
            }
        })
        .collect())
}

/// Derive every effect one wallpaper needs, returning failed keys.
fn derive_wallpaper_effects(store: &TempStore, wal: &WallpaperPlan, cfg: &RunConfig) -> Vec<String> {
    if wal.effects.is_empty() {
        return Vec::new();
    }
    let image = match ops::load_source_rgb(&wal.path) {
        Ok(img) => img,
        Err(e) => {
            tracing::error!(wallpaper = %wal.id, error = %e, "wallpaper unreadable; effects skipped");
            return wal
                .effects
                .iter()
                .map(|kind| format!("effect:{}:{}", wal.id, kind.stem()))
                .collect();
        }
    };

    let mut failures = Vec::new();
    for &kind in &wal.effects {
        let key = EffectKey {
            wallpaper_id: wal.id.clone(),
            kind,
        };
        if let Err(e) = effects::derive_effect(store, &image, &key, cfg.blur_strategy) {
            tracing::error!(wallpaper = %wal.id, effect = kind.stem(), error = %e, "effect derivation failed");
            failures.push(format!("effect:{}:{}", wal.id, kind.stem()));
        }
    }
    failures
}

/// Run one wallpaper's composite tasks on the pool, updating the report.
fn composite_wallpaper(
    store: &TempStore,
    wal: &WallpaperPlan,
    cfg: &RunConfig,
    pool: &rayon::ThreadPool,
    chunk: usize,
    report: &mut RunReport,
) {
    let image = match ops::load_source_rgb(&wal.path) {
        Ok(img) => img,
        Err(e) => {
            tracing::error!(wallpaper = %wal.id, error = %e, "wallpaper unreadable; composites skipped");
            for task in &wal.composites {
                report.failed_keys.push(format!(
                    "{}/{}/{}",
                    task.mask_key.mask_id,
                    wal.id,
                    task.style.name()
                ));
            }
            return;
        }
    };

    let outcomes: Vec<Result<bool, String>> = pool.install(|| {
        wal.composites
            .par_chunks(chunk)
            .flat_map_iter(|tasks| {
                tasks.iter().map(|task| {
                    composite_one(store, wal, task, &image, cfg).map_err(|e| {
                        tracing::error!(
                            mask = %task.mask_key.mask_id,
                            wallpaper = %wal.id,
                            style = %task.style.name(),
                            error = %e,
                            "composite failed"
                        );
                        format!("{}/{}/{}", task.mask_key.mask_id, wal.id, task.style.name())
                    })
                })
            })
            .collect()
    });

    for outcome in outcomes {
        match outcome {
            Ok(true) => report.produced += 1,
            Ok(false) => report.skipped += 1,
            Err(key) => report.failed_keys.push(key),
        }
    }
}

/// Compose and publish one output. A cache-inconsistency error (an artifact
/// referenced but missing, e.g. failed upstream or deleted between stages)
/// triggers one regeneration of this task's inputs before the compose is
/// retried.
fn composite_one(
    store: &TempStore,
    wal: &WallpaperPlan,
    task: &CompositeTask,
    image: &image::RgbImage,
    cfg: &RunConfig,
) -> WallmaskResult<bool> {
    let out_path = naming::output_path(&cfg.out_root, &task.mask_key.mask_id, &wal.id, &task.style);
    if out_path.exists() {
        return Ok(false);
    }

    let mask_artifact = MaskArtifact::paths_for(store, &task.mask_key);
    let effect_paths: BTreeMap<EffectKind, PathBuf> = task
        .style
        .required_effects()
        .iter()
        .map(|&kind| {
            let key = EffectKey {
                wallpaper_id: wal.id.clone(),
                kind,
            };
            (kind, store.path_for(&key.stem()))
        })
        .collect();

    let composed = match compose::compose(&task.style, image, &mask_artifact, &effect_paths) {
        Ok(img) => img,
        Err(e) if e.is_cache_miss() => {
            tracing::warn!(
                mask = %task.mask_key.mask_id,
                wallpaper = %wal.id,
                style = %task.style.name(),
                "artifact missing at compose time; regenerating"
            );
            raster::rasterize_mask(store, &task.mask, &task.mask_key)?;
            for &kind in task.style.required_effects() {
                let key = EffectKey {
                    wallpaper_id: wal.id.clone(),
                    kind,
                };
                effects::derive_effect(store, image, &key, cfg.blur_strategy)?;
            }
            compose::compose(&task.style, image, &mask_artifact, &effect_paths)?
        }
        Err(e) => return Err(e),
    };

    compose::save_final(&composed, &out_path, cfg.jpeg_quality)
}
