//! Segment splitting: projects each segment of the cropped virtual canvas onto
//! its own output surface, skipping the source rows that fall under a gap.

use crate::crop::NormalizedRect;
use crate::dimensions::TargetDimensions;
use crate::raster::{EncodedImage, ImageBackend, PixelRect, RasterBackend, SourceRegion};
use crate::{GridsplitError, Result};
use image::DynamicImage;
use tracing::{debug, debug_span};

#[derive(Debug, Clone)]
pub struct SplitResult {
    pub segments: Vec<EncodedImage>,
    pub segment_width: u32,
    pub segment_heights: Vec<u32>,
}

pub fn split_image(
    image: &DynamicImage,
    segment_count: u32,
    target: &TargetDimensions,
    crop: NormalizedRect,
) -> Result<SplitResult> {
    split_image_with(&ImageBackend::default(), image, segment_count, target, crop)
}

pub fn split_image_with<B: RasterBackend>(
    backend: &B,
    image: &DynamicImage,
    segment_count: u32,
    target: &TargetDimensions,
    crop: NormalizedRect,
) -> Result<SplitResult> {
    if segment_count as usize != target.segment_heights.len() {
        return Err(GridsplitError::InvalidInput(format!(
            "segment count {segment_count} does not match {} target heights",
            target.segment_heights.len()
        )));
    }

    let source = image.to_rgba8();
    let (source_width, source_height) = source.dimensions();

    let crop_x = (crop.x * source_width as f64).floor();
    let crop_y = (crop.y * source_height as f64).floor();
    let crop_w = (crop.width * source_width as f64).floor();
    let crop_h = (crop.height * source_height as f64).floor();
    if crop_w <= 0.0 || crop_h <= 0.0 {
        return Err(GridsplitError::InvalidInput(format!(
            "crop covers no pixels of a {source_width}x{source_height} image"
        )));
    }

    let _span = debug_span!("split", segments = segment_count, crop_w, crop_h).entered();

    // Source pixels per target pixel; the crop already has the target aspect ratio.
    let scale = crop_h / target.total_height as f64;
    let source_gap = target.gap as f64 * scale;
    debug!(scale, source_gap, crop_x, crop_y, "projecting segments");

    // Every surface is drawn before anything is encoded, so a backend failure leaves no partial output.
    let mut surfaces = Vec::with_capacity(target.segment_heights.len());
    let mut source_y = crop_y;
    for (i, &height) in target.segment_heights.iter().enumerate() {
        let source_segment_height = height as f64 * scale;
        let mut surface = backend.create_surface(target.width, height)?;
        let region = SourceRegion {
            x: crop_x,
            y: source_y,
            width: crop_w,
            height: source_segment_height,
        };
        debug!(segment = i, y = region.y, height = region.height, "segment source region");
        backend.draw_region(
            &source,
            region,
            &mut surface,
            PixelRect { x: 0, y: 0, width: target.width, height },
        );
        surfaces.push(surface);

        source_y += source_segment_height;
        if i + 1 < target.segment_heights.len() {
            source_y += source_gap;
        }
    }

    let segments = surfaces
        .iter()
        .map(|surface| backend.encode(surface))
        .collect::<Result<Vec<_>>>()?;

    Ok(SplitResult {
        segments,
        segment_width: target.width,
        segment_heights: target.segment_heights.clone(),
    })
}
