//! Fit-crop: the centered crop that brings a source image to a target aspect ratio.

use crate::dimensions::{compute_target_dimensions, DimensionConfig, TargetDimensions};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Sub-rectangle of an image in fractional (0..=1) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub const FULL: NormalizedRect = NormalizedRect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_within_unit_square(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0 + 1e-9
            && self.y + self.height <= 1.0 + 1e-9
    }
}

/// Center-crops `source_width × source_height` to `target_aspect_ratio`.
///
/// The non-cropped axis keeps its full extent. Dimensions must be positive.
pub fn calculate_fit_crop(
    source_width: u32,
    source_height: u32,
    target_aspect_ratio: f64,
) -> NormalizedRect {
    debug_assert!(source_width > 0 && source_height > 0 && target_aspect_ratio > 0.0);

    let (sw, sh) = (source_width as f64, source_height as f64);
    let source_aspect_ratio = sw / sh;

    if source_aspect_ratio > target_aspect_ratio {
        let width = ((sh * target_aspect_ratio) / sw).min(1.0);
        NormalizedRect { x: (1.0 - width) / 2.0, y: 0.0, width, height: 1.0 }
    } else {
        let height = ((sw / target_aspect_ratio) / sh).min(1.0);
        NormalizedRect { x: 0.0, y: (1.0 - height) / 2.0, width: 1.0, height }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInfo {
    pub target: TargetDimensions,
    pub crop: NormalizedRect,
    pub source_aspect_ratio: f64,
    pub target_aspect_ratio: f64,
    pub will_crop_width: bool,
    pub will_crop_height: bool,
}

pub fn preview_info(
    source_width: u32,
    source_height: u32,
    segments: u32,
    config: &DimensionConfig,
) -> Result<PreviewInfo> {
    let target = compute_target_dimensions(segments, config)?;
    let crop = calculate_fit_crop(source_width, source_height, target.aspect_ratio);
    let source_aspect_ratio = source_width as f64 / source_height as f64;
    let target_aspect_ratio = target.aspect_ratio;

    Ok(PreviewInfo {
        target,
        crop,
        source_aspect_ratio,
        target_aspect_ratio,
        will_crop_width: source_aspect_ratio > target_aspect_ratio,
        will_crop_height: source_aspect_ratio < target_aspect_ratio,
    })
}
