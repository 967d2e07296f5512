//! Gap-aware image splitting and merging for multi-image post grids.

pub mod crop;
pub mod crop_state;
pub mod dimensions;
pub mod merge;
pub mod raster;
pub mod request;
pub mod split;
pub mod tweet;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use crop::{calculate_fit_crop, preview_info, NormalizedRect, PreviewInfo};
pub use crop_state::{CropControls, CropKey, CropSession, CropView, PanZoom};
pub use dimensions::{
    compute_target_dimensions, CustomDimensions, DimensionConfig, DisplayMode, TargetDimensions,
};
pub use merge::{merge_images, Color, GapFill, MergeOptions, MergeResult};
pub use raster::{EncodedImage, ImageBackend, RasterBackend};
pub use request::{RequestGate, RequestToken};
pub use split::{split_image, split_image_with, SplitResult};

use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridsplitError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Raster backend error: {0}")]
    Backend(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Fetch error: {0}")]
    Fetch(String),
}

pub type Result<T> = std::result::Result<T, GridsplitError>;

/// Splits images for a fixed segment count and dimension config
pub struct Splitter {
    segments: u32,
    config: DimensionConfig,
    pan_zoom: PanZoom,
}

impl Splitter {
    pub fn new(config: DimensionConfig) -> Self {
        Self { segments: 4, config, pan_zoom: PanZoom::IDENTITY }
    }

    pub fn with_segments(mut self, segments: u32) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.pan_zoom.zoom = zoom;
        self
    }

    pub fn with_pan(mut self, pan_x: f64, pan_y: f64) -> Self {
        self.pan_zoom.pan_x = pan_x;
        self.pan_zoom.pan_y = pan_y;
        self
    }

    pub fn target(&self) -> Result<TargetDimensions> {
        compute_target_dimensions(self.segments, &self.config)
    }

    /// Effective crop for an image after applying zoom and pan through the crop controls,
    /// so out-of-range values are clamped exactly as interactive input would be.
    pub fn crop_for(&self, image: &DynamicImage) -> Result<NormalizedRect> {
        let PanZoom { pan_x, pan_y, zoom } = self.pan_zoom;
        if !(zoom.is_finite() && pan_x.is_finite() && pan_y.is_finite()) {
            return Err(GridsplitError::InvalidInput(format!(
                "zoom and pan must be finite (zoom {zoom}, pan {pan_x},{pan_y})"
            )));
        }
        let key_source = format!("{}x{}", image.width(), image.height());
        let mut controls = CropControls::new(
            key_source,
            image.width(),
            image.height(),
            self.segments,
            self.config.clone(),
        )?;
        controls.zoom_to(zoom);
        controls.pan(pan_x, pan_y);
        Ok(controls.crop())
    }

    pub fn split(&self, image: &DynamicImage) -> Result<SplitResult> {
        let target = self.target()?;
        let crop = self.crop_for(image)?;
        split_image(image, self.segments, &target, crop)
    }
}
