//! gridsplit CLI - Split tall images for multi-image post grids, or merge images into one strip

use clap::{Parser, Subcommand, ValueEnum};
use gridsplit::tweet::{extract_tweet_id, lookup_images, syndication_url};
use gridsplit::{
    merge_images, preview_info, Color, DimensionConfig, DisplayMode, GapFill, GridsplitError,
    MergeOptions, Splitter,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridsplit", about = "Split images across a post grid, or merge images into one")]
struct Args {
    /// Log geometry and per-segment regions (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Mobile,
    Desktop,
}

impl From<Mode> for DisplayMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mobile => DisplayMode::Mobile,
            Mode::Desktop => DisplayMode::Desktop,
        }
    }
}

#[derive(clap::Args)]
struct Dimensions {
    /// Number of segments
    #[arg(short, long, default_value = "4")]
    segments: u32,
    /// Display preset
    #[arg(short, long, value_enum, default_value = "mobile")]
    mode: Mode,
    /// JSON dimension config file (overrides --mode)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Custom segment width in pixels (overrides --mode)
    #[arg(long)]
    custom_width: Option<u32>,
    /// Custom segment heights, comma separated
    #[arg(long, value_delimiter = ',', requires = "custom_width")]
    heights: Vec<u32>,
    /// Custom gap in pixels
    #[arg(long, default_value = "0", requires = "custom_width")]
    gap: u32,
}

impl Dimensions {
    fn load(&self) -> Result<DimensionConfig, GridsplitError> {
        if let Some(path) = &self.config {
            return Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?);
        }
        Ok(match self.custom_width {
            Some(width) => DimensionConfig::custom(width, self.heights.clone(), self.gap),
            None => DimensionConfig::preset(self.mode.into()),
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// Split one image into grid segments
    Split {
        /// Input image file
        input: PathBuf,
        #[command(flatten)]
        dimensions: Dimensions,
        /// Zoom factor over the fitted crop (1.0 - 5.0)
        #[arg(long, default_value = "1.0")]
        zoom: f64,
        /// Horizontal pan of the crop center, as a fraction of image width
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        pan_x: f64,
        /// Vertical pan of the crop center, as a fraction of image height
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        pan_y: f64,
        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Merge images top to bottom into one
    Merge {
        /// Images in stacking order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,
        /// Gap fill: none, blur or solid
        #[arg(long, default_value = "none")]
        gap_fill: GapFill,
        /// Gap height in pixels
        #[arg(long, default_value = "0")]
        gap_size: u32,
        /// Solid gap color
        #[arg(long, default_value = "#ffffff")]
        color: Color,
        /// Output width (defaults to the widest input)
        #[arg(short, long)]
        width: Option<u32>,
    },
    /// Print target geometry and the fitted crop for an image
    Info {
        /// Input image file
        input: PathBuf,
        #[command(flatten)]
        dimensions: Dimensions,
    },
    /// Print the post id and lookup URL for a status link
    Tweet {
        /// Status URL
        url: String,
        /// Saved lookup response; prints the image URLs it contains
        #[arg(long)]
        payload: Option<PathBuf>,
        /// HTTP status the saved response came back with
        #[arg(long, default_value = "200", requires = "payload")]
        status: u16,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "gridsplit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn segment_paths(input: &Path, output_dir: Option<&Path>, count: usize) -> Vec<PathBuf> {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    (1..=count).map(|i| dir.join(format!("{stem}-{i}.png"))).collect()
}

fn main() -> Result<(), GridsplitError> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Split { input, dimensions, zoom, pan_x, pan_y, output_dir } => {
            let image = image::open(&input)?;
            let splitter = Splitter::new(dimensions.load()?)
                .with_segments(dimensions.segments)
                .with_zoom(zoom)
                .with_pan(pan_x, pan_y);
            let result = splitter.split(&image)?;

            if let Some(dir) = &output_dir {
                std::fs::create_dir_all(dir)?;
            }
            let paths = segment_paths(&input, output_dir.as_deref(), result.segments.len());
            for ((segment, path), height) in
                result.segments.iter().zip(&paths).zip(&result.segment_heights)
            {
                std::fs::write(path, &segment.bytes)?;
                info!(path = %path.display(), width = result.segment_width, height, "wrote segment");
                println!("{}", path.display());
            }
        }
        Command::Merge { inputs, output, gap_fill, gap_size, color, width } => {
            let images = inputs
                .par_iter()
                .map(image::open)
                .collect::<Result<Vec<_>, _>>()?;
            let options = MergeOptions { gap_fill, gap_size, solid_color: color, output_width: width };
            let result = merge_images(&images, &options)?;
            std::fs::write(&output, &result.image.bytes)?;
            println!("{} ({}x{})", output.display(), result.width, result.height);
        }
        Command::Info { input, dimensions } => {
            let (width, height) = image::image_dimensions(&input)?;
            let info = preview_info(width, height, dimensions.segments, &dimensions.load()?)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Tweet { url, payload, status } => {
            let id = extract_tweet_id(&url)
                .ok_or_else(|| GridsplitError::InvalidInput(format!("not a status URL: {url}")))?;
            println!("{id}");
            println!("{}", syndication_url(&id));

            if let Some(path) = payload {
                for image in lookup_images(status, &std::fs::read_to_string(&path)?)? {
                    println!("{image}");
                }
            }
        }
    }

    Ok(())
}
