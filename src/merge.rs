//! Merging: stacks images into one strip at a shared width, optionally
//! synthesizing the gaps between them.

use crate::raster::{EncodedImage, ImageBackend, PixelRect, RasterBackend, SourceRegion};
use crate::{GridsplitError, Result};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, debug_span, warn};

/// Upper bound on the strip sampled from each neighbour for a blurred gap
const BLUR_STRIP_MAX: u32 = 40;
const BLUR_RADIUS_MIN: f32 = 8.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapFill {
    #[default]
    None,
    Blur,
    Solid,
}

impl FromStr for GapFill {
    type Err = GridsplitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(GapFill::None),
            "blur" => Ok(GapFill::Blur),
            "solid" => Ok(GapFill::Solid),
            other => Err(GridsplitError::InvalidInput(format!("unknown gap fill '{other}'"))),
        }
    }
}

/// RGBA color written and parsed as CSS hex (`#rgb`, `#rrggbb`, `#rrggbbaa`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub Rgba<u8>);

impl Color {
    pub const WHITE: Color = Color(Rgba([255, 255, 255, 255]));
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl FromStr for Color {
    type Err = GridsplitError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GridsplitError::InvalidInput(format!("invalid color '{s}'"));
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize, len: usize| -> Result<u8> {
            let digits = hex.get(i * len..(i + 1) * len).ok_or_else(invalid)?;
            let value = u8::from_str_radix(digits, 16).map_err(|_| invalid())?;
            Ok(if len == 1 { value * 17 } else { value })
        };
        let rgba = match hex.len() {
            3 => [channel(0, 1)?, channel(1, 1)?, channel(2, 1)?, 255],
            6 => [channel(0, 2)?, channel(1, 2)?, channel(2, 2)?, 255],
            8 => [channel(0, 2)?, channel(1, 2)?, channel(2, 2)?, channel(3, 2)?],
            _ => return Err(invalid()),
        };
        Ok(Color(Rgba(rgba)))
    }
}

impl TryFrom<String> for Color {
    type Error = GridsplitError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0 .0;
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeOptions {
    pub gap_fill: GapFill,
    pub gap_size: u32,
    pub solid_color: Color,
    /// Defaults to the widest input
    pub output_width: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    pub image: EncodedImage,
    pub width: u32,
    pub height: u32,
}

/// Rows an image occupies on the merged surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    y: u32,
    height: u32,
}

/// Stacks the scaled images top to bottom with `gap` rows between them.
fn layout(images: &[DynamicImage], width: u32, gap: u32) -> Result<Vec<Placement>> {
    let too_tall = || GridsplitError::InvalidInput("merged height overflows u32".into());
    let mut placements = Vec::with_capacity(images.len());
    let mut y = 0u32;
    for (i, img) in images.iter().enumerate() {
        let scaled = (img.height() as f64 * width as f64 / img.width() as f64).round();
        if scaled > u32::MAX as f64 {
            return Err(too_tall());
        }
        let height = (scaled as u32).max(1);
        if i > 0 {
            y = y.checked_add(gap).ok_or_else(too_tall)?;
        }
        placements.push(Placement { y, height });
        y = y.checked_add(height).ok_or_else(too_tall)?;
    }
    Ok(placements)
}

pub fn merge_images(images: &[DynamicImage], options: &MergeOptions) -> Result<MergeResult> {
    merge_images_with(&ImageBackend::default(), images, options)
}

pub fn merge_images_with<B: RasterBackend>(
    backend: &B,
    images: &[DynamicImage],
    options: &MergeOptions,
) -> Result<MergeResult> {
    if images.is_empty() {
        return Err(GridsplitError::InvalidInput("no images to merge".into()));
    }
    let empty = images.iter().enumerate().find(|(_, img)| img.width() == 0 || img.height() == 0);
    if let Some((i, img)) = empty {
        return Err(GridsplitError::InvalidInput(format!(
            "image {i} has no area ({}x{})",
            img.width(),
            img.height()
        )));
    }

    let width = match options.output_width {
        Some(0) => return Err(GridsplitError::InvalidInput("output width must be positive".into())),
        Some(w) => w,
        None => images.iter().map(|img| img.width()).max().unwrap_or(0),
    };
    let gap = match options.gap_fill {
        GapFill::None => 0,
        _ => options.gap_size,
    };

    let placements = layout(images, width, gap)?;
    let height = placements.last().map(|p| p.y + p.height).unwrap_or(0);

    let _span = debug_span!("merge", images = images.len(), width, height, gap).entered();

    let mut surface = backend.create_surface(width, height)?;

    for (img, placement) in images.iter().zip(&placements) {
        let source = img.to_rgba8();
        let region = SourceRegion {
            x: 0.0,
            y: 0.0,
            width: source.width() as f64,
            height: source.height() as f64,
        };
        let dest = PixelRect { x: 0, y: placement.y, width, height: placement.height };
        backend.draw_region(&source, region, &mut surface, dest);
    }

    if gap > 0 {
        for pair in placements.windows(2) {
            let (upper, lower) = (pair[0], pair[1]);
            let rect = PixelRect { x: 0, y: upper.y + upper.height, width, height: gap };
            match options.gap_fill {
                GapFill::Solid => backend.fill_rect(&mut surface, rect, options.solid_color.0),
                GapFill::Blur => blend_gap(backend, &mut surface, rect, upper, lower)?,
                GapFill::None => {}
            }
        }
    }

    debug!(width, height, "merged");
    let image = backend.encode(&surface)?;
    Ok(MergeResult { image, width, height })
}

/// Cross-fades blurred edge strips of the neighbouring images across `rect`.
fn blend_gap<B: RasterBackend>(
    backend: &B,
    surface: &mut RgbaImage,
    rect: PixelRect,
    upper: Placement,
    lower: Placement,
) -> Result<()> {
    let gap = rect.height;
    let wanted = gap.saturating_mul(2).min(BLUR_STRIP_MAX);
    let strip_h = wanted.min(upper.height).min(lower.height);
    if strip_h < wanted {
        warn!(wanted, strip_h, "neighbouring image too short, using a thinner blur strip");
    }
    let radius = BLUR_RADIUS_MIN.max(gap as f32 / 3.0);

    let upper_top = upper.y + upper.height - strip_h;
    let upper_strip = imageops::crop_imm(&*surface, 0, upper_top, rect.width, strip_h).to_image();
    let lower_strip = imageops::crop_imm(&*surface, 0, lower.y, rect.width, strip_h).to_image();

    let stretch = |strip: &RgbaImage| -> Result<RgbaImage> {
        let blurred = backend.blur(strip, radius);
        let mut out = backend.create_surface(rect.width, gap)?;
        let region = SourceRegion {
            x: 0.0,
            y: 0.0,
            width: blurred.width() as f64,
            height: blurred.height() as f64,
        };
        let dest = PixelRect { x: 0, y: 0, width: rect.width, height: gap };
        backend.draw_region(&blurred, region, &mut out, dest);
        Ok(out)
    };
    let upper_fill = stretch(&upper_strip)?;
    let lower_fill = stretch(&lower_strip)?;

    for gy in 0..gap {
        let t = gy as f32 / gap as f32;
        for x in 0..rect.width {
            let a = upper_fill.get_pixel(x, gy).0;
            let b = lower_fill.get_pixel(x, gy).0;
            let mut out = [0u8; 4];
            for (c, value) in out.iter_mut().enumerate() {
                let v = a[c] as f32 * (1.0 - t) + b[c] as f32 * t;
                *value = v.round().clamp(0.0, 255.0) as u8;
            }
            surface.put_pixel(rect.x + x, rect.y + gy, Rgba(out));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!("#ff0000".parse::<Color>().unwrap(), Color(Rgba([255, 0, 0, 255])));
        assert_eq!("#0f0".parse::<Color>().unwrap(), Color(Rgba([0, 255, 0, 255])));
        assert_eq!("#00000080".parse::<Color>().unwrap(), Color(Rgba([0, 0, 0, 128])));
        assert!("ff0000".parse::<Color>().is_err());
        assert!("#ff00".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert_eq!(Color(Rgba([18, 52, 86, 255])).to_string(), "#123456");
    }

    #[test]
    fn options_deserialize_from_json() {
        let json = r##"{"gapFill":"solid","gapSize":12,"solidColor":"#ff0000"}"##;
        let options: MergeOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.gap_fill, GapFill::Solid);
        assert_eq!(options.gap_size, 12);
        assert_eq!(options.solid_color, Color(Rgba([255, 0, 0, 255])));
        assert_eq!(options.output_width, None);
    }

    #[test]
    fn empty_list_fails_fast() {
        let err = merge_images(&[], &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, GridsplitError::InvalidInput(_)));
    }

    #[test]
    fn none_fill_ignores_gap_size() {
        let images = [solid(1000, 500, [0, 0, 255, 255]), solid(1000, 300, [0, 255, 0, 255])];
        let options = MergeOptions { gap_fill: GapFill::None, gap_size: 20, ..Default::default() };
        let result = merge_images(&images, &options).unwrap();
        assert_eq!((result.width, result.height), (1000, 800));
    }

    #[test]
    fn solid_gap_is_painted() {
        let images = [solid(1000, 500, [0, 0, 255, 255]), solid(1000, 300, [0, 255, 0, 255])];
        let options = MergeOptions {
            gap_fill: GapFill::Solid,
            gap_size: 20,
            solid_color: "#ff0000".parse().unwrap(),
            output_width: None,
        };
        let result = merge_images(&images, &options).unwrap();
        assert_eq!((result.width, result.height), (1000, 820));

        let decoded = result.image.decode().unwrap().to_rgba8();
        for y in 500..520 {
            for x in 0..1000 {
                assert_eq!(*decoded.get_pixel(x, y), Rgba([255, 0, 0, 255]));
            }
        }
        assert_eq!(*decoded.get_pixel(0, 499), Rgba([0, 0, 255, 255]));
        assert_eq!(*decoded.get_pixel(0, 520), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn images_scale_to_widest() {
        let images = [solid(400, 200, [10, 10, 10, 255]), solid(800, 100, [20, 20, 20, 255])];
        let result = merge_images(&images, &MergeOptions::default()).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 400 + 100);

        let narrow = MergeOptions { output_width: Some(200), ..Default::default() };
        let result = merge_images(&images, &narrow).unwrap();
        assert_eq!((result.width, result.height), (200, 100 + 25));
    }

    #[test]
    fn layout_stacks_with_gaps() {
        let images = [solid(100, 50, [0; 4]), solid(200, 100, [0; 4]), solid(100, 10, [0; 4])];
        let placements = layout(&images, 100, 7).unwrap();
        assert_eq!(
            placements,
            vec![
                Placement { y: 0, height: 50 },
                Placement { y: 57, height: 50 },
                Placement { y: 114, height: 10 },
            ]
        );
    }

    #[test]
    fn oversized_merge_is_rejected() {
        let images = [solid(10, 10, [0, 0, 0, 255]), solid(10, 10, [0, 0, 0, 255])];
        let options = MergeOptions {
            gap_fill: GapFill::Solid,
            gap_size: u32::MAX,
            ..Default::default()
        };
        let err = merge_images(&images, &options).unwrap_err();
        assert!(matches!(err, GridsplitError::InvalidInput(_)));

        let sliver = [solid(1, 10, [0, 0, 0, 255])];
        let huge = MergeOptions { output_width: Some(u32::MAX), ..Default::default() };
        let err = merge_images(&sliver, &huge).unwrap_err();
        assert!(matches!(err, GridsplitError::InvalidInput(_)));
    }

    #[test]
    fn blur_strip_shrinks_to_short_neighbour() {
        // Upper image is 5 rows, thinner than the 40-row strip a 20-row gap asks for.
        let images = [solid(120, 5, [255, 255, 255, 255]), solid(120, 100, [0, 0, 0, 255])];
        let options = MergeOptions { gap_fill: GapFill::Blur, gap_size: 20, ..Default::default() };
        let result = merge_images(&images, &options).unwrap();
        assert_eq!((result.width, result.height), (120, 125));

        let decoded = result.image.decode().unwrap().to_rgba8();
        assert_eq!(*decoded.get_pixel(60, 2), Rgba([255, 255, 255, 255]));
        assert_eq!(*decoded.get_pixel(60, 124), Rgba([0, 0, 0, 255]));
        let first = decoded.get_pixel(60, 5).0[0] as i32;
        let last = decoded.get_pixel(60, 24).0[0] as i32;
        assert!(first - last > 100, "{first} vs {last}");
    }

    #[test]
    fn blur_gap_fades_from_upper_to_lower() {
        let images = [solid(120, 100, [255, 255, 255, 255]), solid(120, 100, [0, 0, 0, 255])];
        let options = MergeOptions { gap_fill: GapFill::Blur, gap_size: 20, ..Default::default() };
        let result = merge_images(&images, &options).unwrap();
        assert_eq!(result.height, 220);

        let decoded = result.image.decode().unwrap().to_rgba8();
        let first = decoded.get_pixel(60, 100).0[0] as i32;
        let middle = decoded.get_pixel(60, 110).0[0] as i32;
        let last = decoded.get_pixel(60, 119).0[0] as i32;
        assert!(first > middle && middle > last);
        assert!(first - last > 100);
    }
}
