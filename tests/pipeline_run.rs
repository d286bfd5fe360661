use std::path::{Path, PathBuf};

use wallmask::{RunConfig, Style, color_by_name, naming};

fn temp_root(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "wallmask_it_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

const RECT_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><rect x="0" y="0" width="4" height="8" fill="#ffffff"/></svg>"##;
const CIRCLE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><circle cx="4" cy="4" r="3" fill="#2266ff"/></svg>"##;

struct Fixture {
    root: PathBuf,
    cfg: RunConfig,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

fn fixture(name: &str, styles: Vec<Style>) -> Fixture {
    let root = temp_root(name);
    let masks = root.join("masks");
    let wals = root.join("wallpapers");
    std::fs::create_dir_all(&masks).unwrap();
    std::fs::create_dir_all(&wals).unwrap();

    std::fs::write(masks.join("rect.svg"), RECT_SVG).unwrap();
    std::fs::write(masks.join("circle.svg"), CIRCLE_SVG).unwrap();

    image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 200]))
        .save(wals.join("alpha.png"))
        .unwrap();
    image::RgbImage::from_pixel(6, 6, image::Rgb([120, 60, 30]))
        .save(wals.join("beta.png"))
        .unwrap();

    let mut cfg = RunConfig::new(&masks, &wals, root.join("render"), styles);
    cfg.workers = Some(2);
    Fixture { root, cfg }
}

fn count_outputs(out_root: &Path) -> usize {
    fn walk(dir: &Path, acc: &mut usize) {
        let Ok(rd) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in rd.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, acc);
            } else if path.extension().is_some_and(|e| e == "jpg") {
                *acc += 1;
            }
        }
    }
    let mut n = 0;
    walk(out_root, &mut n);
    n
}

#[test]
fn full_run_produces_the_entire_matrix() {
    let black = color_by_name("Black").unwrap();
    let styles = vec![
        Style::ThroughBlack,
        Style::Flip,
        Style::Negate,
        Style::ColorOverlay(black),
    ];
    let fx = fixture("matrix", styles);

    let report = wallmask::run(&fx.cfg).unwrap();
    assert_eq!(report.missing_before, (2 * 2 * 4) as u64);
    assert_eq!(report.produced, 16);
    assert!(report.failed_keys.is_empty(), "{:?}", report.failed_keys);
    assert_eq!(count_outputs(&fx.cfg.out_root), 16);

    // The canonical layout is <out>/<mask>/<wallpaper>/<style>.jpg.
    let sample = naming::output_path(&fx.cfg.out_root, "rect", "alpha", &Style::ThroughBlack);
    assert!(sample.is_file(), "missing {}", sample.display());
}

#[test]
fn second_run_is_a_no_op() {
    let styles = vec![Style::ThroughBlack, Style::Pixelate];
    let fx = fixture("idempotent", styles);

    let first = wallmask::run(&fx.cfg).unwrap();
    assert_eq!(first.produced, 8);

    let mtime = |p: &Path| std::fs::metadata(p).unwrap().modified().unwrap();
    let sample = naming::output_path(&fx.cfg.out_root, "circle", "beta", &Style::Pixelate);
    let before = mtime(&sample);

    let second = wallmask::run(&fx.cfg).unwrap();
    assert_eq!(second.missing_before, 0);
    assert_eq!(second.produced, 0);
    assert_eq!(second.failed(), 0);
    assert_eq!(mtime(&sample), before);
}

#[test]
fn partially_rendered_library_only_fills_the_gaps() {
    let styles = vec![Style::ThroughBlack, Style::Flip];
    let fx = fixture("partial", styles);

    // Pre-existing output with sentinel bytes must never be recomputed.
    let keep = naming::output_path(&fx.cfg.out_root, "rect", "alpha", &Style::Flip);
    std::fs::create_dir_all(keep.parent().unwrap()).unwrap();
    std::fs::write(&keep, b"sentinel").unwrap();

    let report = wallmask::run(&fx.cfg).unwrap();
    assert_eq!(report.missing_before, (2 * 2 * 2 - 1) as u64);
    assert_eq!(report.produced, 7);
    assert_eq!(std::fs::read(&keep).unwrap(), b"sentinel");
}

#[test]
fn corrupt_wallpaper_fails_its_keys_without_stopping_the_run() {
    let styles = vec![Style::ThroughBlack, Style::Negate];
    let fx = fixture("contained", styles);
    std::fs::write(fx.cfg.wallpapers_dir.join("broken.png"), b"not an image").unwrap();

    let report = wallmask::run(&fx.cfg).unwrap();
    // 3 wallpapers x 2 masks x 2 styles missing; the broken one fails.
    assert_eq!(report.missing_before, 12);
    assert_eq!(report.produced, 8);
    assert_eq!(report.failed(), 4);
    assert!(report.failed_keys.iter().all(|k| k.contains("broken")));

    let good = naming::output_path(&fx.cfg.out_root, "rect", "alpha", &Style::Negate);
    assert!(good.is_file());
}

#[test]
fn source_cache_is_populated_and_consulted() {
    let styles = vec![Style::ThroughBlack];
    let mut fx = fixture("srccache", styles);
    let cache_dir = fx.root.join("cache");
    fx.cfg.cache_dir = Some(cache_dir.clone());

    wallmask::run(&fx.cfg).unwrap();
    assert!(cache_dir.join("alpha.png").is_file());
    assert!(cache_dir.join("beta.png").is_file());
    assert!(cache_dir.join("manifest.json").is_file());

    // A second run revalidates against the same manifest without error.
    let report = wallmask::run(&fx.cfg).unwrap();
    assert_eq!(report.produced, 0);
}
