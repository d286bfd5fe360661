use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use wallmask::{BlurStrategy, RunConfig, Style, WallmaskError};

#[derive(Parser, Debug)]
#[command(name = "wallmask", version)]
#[command(about = "Generate a matrix of masked desktop wallpapers, incrementally")]
struct Cli {
    /// SVG masks directory.
    #[arg(short = 'm', long = "masks", default_value = "Svgs")]
    masks_dir: PathBuf,

    /// Input wallpapers directory.
    #[arg(short = 'i', long = "images", default_value = "Wallpapers")]
    wallpapers_dir: PathBuf,

    /// Output root directory.
    #[arg(short = 'o', long = "out", default_value = "Render")]
    out_root: PathBuf,

    /// Persistent source-wallpaper cache directory (off when omitted).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Comma-separated style families to generate (default: all).
    #[arg(long, value_delimiter = ',')]
    styles: Vec<String>,

    /// Comma-separated palette colors for the color families (default: all).
    #[arg(long, value_delimiter = ',')]
    colors: Vec<String>,

    /// Worker threads (default: available units minus one).
    #[arg(long)]
    workers: Option<usize>,

    /// Tasks per worker dispatch within a stage.
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,

    /// Blur artifact strategy.
    #[arg(long, value_enum, default_value_t = BlurChoice::Full)]
    blur_strategy: BlurChoice,

    /// JPEG quality for final outputs.
    #[arg(long, default_value_t = 90)]
    jpeg_quality: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlurChoice {
    /// Full-resolution Gaussian blur.
    Full,
    /// Quarter-resolution blur, scaled back up (faster, approximate).
    Downscale,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = build_config(&cli)?;

    let report = wallmask::run(&cfg)?;

    eprintln!(
        "missing {} -> produced {}, skipped {}, failed {}",
        report.missing_before,
        report.produced,
        report.skipped,
        report.failed()
    );
    for key in &report.failed_keys {
        eprintln!("  failed: {key}");
    }
    // Per-key failures are best-effort losses, not a setup problem; the run
    // itself still completed.
    Ok(())
}

fn build_config(cli: &Cli) -> Result<RunConfig, WallmaskError> {
    let colors = if cli.colors.is_empty() {
        wallmask::all_colors()
    } else {
        cli.colors
            .iter()
            .map(|name| wallmask::color_by_name(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut styles = Style::enumerate(&colors);
    if !cli.styles.is_empty() {
        for requested in &cli.styles {
            let known = Style::BASE_FAMILIES
                .iter()
                .chain(Style::COLOR_FAMILIES)
                .any(|f| f.eq_ignore_ascii_case(requested));
            if !known {
                return Err(WallmaskError::planning(format!(
                    "unknown style family '{requested}'"
                )));
            }
        }
        styles.retain(|s| {
            cli.styles
                .iter()
                .any(|f| f.eq_ignore_ascii_case(s.family()))
        });
    }

    let mut cfg = RunConfig::new(
        &cli.masks_dir,
        &cli.wallpapers_dir,
        &cli.out_root,
        styles,
    );
    cfg.cache_dir = cli.cache_dir.clone();
    cfg.workers = cli.workers;
    cfg.chunk_size = cli.chunk_size;
    cfg.blur_strategy = match cli.blur_strategy {
        BlurChoice::Full => BlurStrategy::FullResolution,
        BlurChoice::Downscale => BlurStrategy::DownscaleApprox,
    };
    cfg.jpeg_quality = cli.jpeg_quality;
    Ok(cfg)
}
