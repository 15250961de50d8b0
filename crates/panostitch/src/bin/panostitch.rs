//! panostitch CLI: stitch overlapping photos into one panorama.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use log::info;
use panostitch::{io, AlignmentStore, BlendMode, DetectorKind, StitchConfig, Stitcher};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "panostitch")]
#[command(about = "Stitch overlapping photographs into a single panorama")]
#[command(version)]
struct Cli {
    /// Input images, in order; position is the image index.
    #[arg(required = true, num_args = 2..)]
    inputs: Vec<PathBuf>,

    /// Output panorama (format from the extension, PNG by default).
    #[arg(long)]
    out: PathBuf,

    /// JSON run configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the alignment store (JSON) for later re-blending.
    #[arg(long)]
    store_out: Option<PathBuf>,

    /// Re-blend using a previously written alignment store; skips matching.
    #[arg(long, conflicts_with = "store_out")]
    store_in: Option<PathBuf>,

    /// Diagnostics JSON path [default: output path with a .json extension].
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    #[arg(long, value_enum)]
    detector: Option<DetectorArg>,

    /// Lowe ratio test threshold in (0, 1].
    #[arg(long)]
    ratio_threshold: Option<f32>,

    /// RANSAC reprojection threshold in pixels.
    #[arg(long)]
    ransac_threshold: Option<f64>,

    #[arg(long)]
    min_inliers: Option<usize>,

    /// Reference image index (default: the best-connected image).
    #[arg(long)]
    reference: Option<usize>,

    /// Enable linear exposure compensation against the reference.
    #[arg(long)]
    exposure: bool,

    #[arg(long, value_enum)]
    blend_mode: Option<BlendModeArg>,

    /// Tile edge length in pixels.
    #[arg(long)]
    tile_size: Option<usize>,

    /// Keep at most this many images per tile (largest overlap first).
    #[arg(long)]
    max_images_per_tile: Option<usize>,

    #[arg(long)]
    pyramid_levels: Option<usize>,

    /// Blend at 1/N resolution for a quick preview; matching stays at full size.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    downsample: Option<u32>,

    /// Worker threads; 0 uses all cores.
    #[arg(long)]
    workers: Option<usize>,

    /// Log level (off, error, warn, info, debug, trace) [default: $PANOSTITCH_LOG or info].
    /// With the `tracing` feature, full filter directives are accepted too.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines (requires the `tracing` feature).
    #[arg(long)]
    json_logs: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DetectorArg {
    Fast,
    Accurate,
}

impl From<DetectorArg> for DetectorKind {
    fn from(arg: DetectorArg) -> Self {
        match arg {
            DetectorArg::Fast => DetectorKind::Fast,
            DetectorArg::Accurate => DetectorKind::Accurate,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlendModeArg {
    Distance,
    Multiband,
}

impl From<BlendModeArg> for BlendMode {
    fn from(arg: BlendModeArg) -> Self {
        match arg {
            BlendModeArg::Distance => BlendMode::Distance,
            BlendModeArg::Multiband => BlendMode::Multiband,
        }
    }
}

impl Cli {
    fn build_config(&self) -> CliResult<StitchConfig> {
        let mut config = match &self.config {
            Some(path) => StitchConfig::load_json(path)?,
            None => StitchConfig::default(),
        };
        if let Some(d) = self.detector {
            config.matching.detector = d.into();
        }
        if let Some(r) = self.ratio_threshold {
            config.matching.ratio_threshold = r;
        }
        if let Some(t) = self.ransac_threshold {
            config.matching.ransac.threshold = t;
        }
        if let Some(m) = self.min_inliers {
            config.matching.min_inliers = m;
        }
        if self.reference.is_some() {
            config.reference_index = self.reference;
        }
        if self.exposure {
            config.exposure.enabled = true;
        }
        if let Some(mode) = self.blend_mode {
            config.blend.mode = mode.into();
        }
        if let Some(t) = self.tile_size {
            config.blend.tile_size = t;
        }
        if self.max_images_per_tile.is_some() {
            config.blend.max_images_per_tile = self.max_images_per_tile;
        }
        if let Some(l) = self.pyramid_levels {
            config.blend.pyramid_levels = l;
        }
        if let Some(d) = self.downsample {
            config.downsample = d as usize;
        }
        if let Some(w) = self.workers {
            config.worker_count = w;
        }
        Ok(config)
    }

    fn diagnostics_path(&self) -> PathBuf {
        self.diagnostics
            .clone()
            .unwrap_or_else(|| self.out.with_extension("json"))
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) {
    let _ = tracing_log::LogTracer::init();
    panostitch::core::init_tracing(cli.json_logs, cli.log_level.as_deref());
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    use log::LevelFilter;
    let _ = match cli.log_level.as_deref() {
        Some(level) => {
            panostitch::core::init_with_level(panostitch::core::parse_level(Some(level), LevelFilter::Info))
        }
        None => panostitch::core::init_from_env(),
    };
    if cli.json_logs {
        log::warn!("--json-logs needs the `tracing` feature; using plain logs");
    }
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = cli.build_config()?;
    let stitcher = Stitcher::new(config)?;

    info!("loading {} images", cli.inputs.len());
    let images = io::load_images(&cli.inputs)?;

    let output = match &cli.store_in {
        Some(path) => {
            let store = AlignmentStore::load_json(path)?;
            stitcher.blend_from_store(&images, &store)?
        }
        None => stitcher.run(&images)?,
    };

    io::save_image(&output.canvas, &cli.out)?;
    if let Some(path) = &cli.store_out {
        output.store.write_json(path)?;
        info!("alignment store written to {}", path.display());
    }
    let diag_path = cli.diagnostics_path();
    output.diagnostics.write_json(&diag_path)?;

    print_summary(&cli.out, &diag_path, &output.diagnostics);
    Ok(())
}

fn print_summary(out: &Path, diag_path: &Path, diag: &panostitch::Diagnostics) {
    if let Some(canvas) = diag.canvas {
        println!("canvas: {}x{} -> {}", canvas.width, canvas.height, out.display());
    }
    println!("reference: {}", diag.reference);
    println!("registered: {:?}", diag.registered);
    if !diag.unregistered.is_empty() {
        println!("unregistered: {:?}", diag.unregistered);
    }
    println!("diagnostics: {}", diag_path.display());
}
