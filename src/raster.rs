//! Raster capability layer: surfaces, scaled blits, blur and PNG encoding.

use crate::{GridsplitError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Largest surface the default backend will allocate (16384 × 16384)
pub const DEFAULT_MAX_PIXELS: u64 = 16_384 * 16_384;

/// Rectangle in source pixel space; may be fractional
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle on a destination surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// PNG bytes plus the same bytes as a `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data_uri: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn from_png(bytes: Vec<u8>) -> Self {
        let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&bytes));
        Self { data_uri, bytes }
    }

    pub fn decode(&self) -> Result<DynamicImage> {
        Ok(image::load_from_memory_with_format(&self.bytes, ImageFormat::Png)?)
    }
}

/// Drawing primitives the splitter and merger need from a 2D raster library.
pub trait RasterBackend {
    fn create_surface(&self, width: u32, height: u32) -> Result<RgbaImage>;

    /// Resamples `region` of `source` into `dest` on `surface`.
    fn draw_region(
        &self,
        source: &RgbaImage,
        region: SourceRegion,
        surface: &mut RgbaImage,
        dest: PixelRect,
    );

    fn blur(&self, surface: &RgbaImage, radius: f32) -> RgbaImage;

    fn encode(&self, surface: &RgbaImage) -> Result<EncodedImage>;

    fn fill_rect(&self, surface: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
        let x_end = (rect.x + rect.width).min(surface.width());
        let y_end = (rect.y + rect.height).min(surface.height());
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                surface.put_pixel(x, y, color);
            }
        }
    }
}

/// Backend built on the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct ImageBackend {
    max_pixels: u64,
}

impl Default for ImageBackend {
    fn default() -> Self {
        Self { max_pixels: DEFAULT_MAX_PIXELS }
    }
}

impl ImageBackend {
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }
}

impl RasterBackend for ImageBackend {
    fn create_surface(&self, width: u32, height: u32) -> Result<RgbaImage> {
        let area = width as u64 * height as u64;
        if area == 0 || area > self.max_pixels {
            return Err(GridsplitError::Backend(format!(
                "cannot allocate a {width}x{height} surface"
            )));
        }
        Ok(RgbaImage::new(width, height))
    }

    fn draw_region(
        &self,
        source: &RgbaImage,
        region: SourceRegion,
        surface: &mut RgbaImage,
        dest: PixelRect,
    ) {
        if dest.width == 0 || dest.height == 0 || source.width() == 0 || source.height() == 0 {
            return;
        }

        // Samples never leave the source region, so neighbouring content cannot bleed in.
        let bounds = RegionBounds::new(source, &region);
        let step_x = region.width / dest.width as f64;
        let step_y = region.height / dest.height as f64;

        for dy in 0..dest.height {
            let ty = dest.y + dy;
            if ty >= surface.height() {
                break;
            }
            let sy = region.y + (dy as f64 + 0.5) * step_y - 0.5;
            for dx in 0..dest.width {
                let tx = dest.x + dx;
                if tx >= surface.width() {
                    break;
                }
                let sx = region.x + (dx as f64 + 0.5) * step_x - 0.5;
                surface.put_pixel(tx, ty, sample_bilinear(source, sx, sy, &bounds));
            }
        }
    }

    fn blur(&self, surface: &RgbaImage, radius: f32) -> RgbaImage {
        imageops::blur(surface, radius)
    }

    fn encode(&self, surface: &RgbaImage) -> Result<EncodedImage> {
        let mut bytes = Vec::new();
        surface.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(EncodedImage::from_png(bytes))
    }
}

/// Inclusive pixel bounds of a source region, clipped to the image
struct RegionBounds {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl RegionBounds {
    fn new(source: &RgbaImage, region: &SourceRegion) -> Self {
        let max_x = source.width() as i64 - 1;
        let max_y = source.height() as i64 - 1;
        let x0 = (region.x.floor() as i64).clamp(0, max_x);
        let y0 = (region.y.floor() as i64).clamp(0, max_y);
        let x1 = ((region.x + region.width).ceil() as i64 - 1).clamp(x0, max_x);
        let y1 = ((region.y + region.height).ceil() as i64 - 1).clamp(y0, max_y);
        Self { x0, y0, x1, y1 }
    }
}

fn sample_bilinear(img: &RgbaImage, x: f64, y: f64, bounds: &RegionBounds) -> Rgba<u8> {
    let x = x.clamp(bounds.x0 as f64, bounds.x1 as f64);
    let y = y.clamp(bounds.y0 as f64, bounds.y1 as f64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let sample = |sx: i64, sy: i64| -> [f64; 4] {
        let cx = sx.clamp(bounds.x0, bounds.x1) as u32;
        let cy = sy.clamp(bounds.y0, bounds.y1) as u32;
        img.get_pixel(cx, cy).0.map(|c| c as f64)
    };

    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1, y0);
    let p01 = sample(x0, y0 + 1);
    let p11 = sample(x0 + 1, y0 + 1);

    let w00 = (1.0 - fx) * (1.0 - fy);
    let w10 = fx * (1.0 - fy);
    let w01 = (1.0 - fx) * fy;
    let w11 = fx * fy;

    let mut out = [0u8; 4];
    for (c, value) in out.iter_mut().enumerate() {
        let v = p00[c] * w00 + p10[c] * w10 + p01[c] * w01 + p11[c] * w11;
        *value = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_empty_and_oversized_surfaces() {
        let backend = ImageBackend::default().with_max_pixels(100);
        assert!(matches!(backend.create_surface(0, 10), Err(GridsplitError::Backend(_))));
        assert!(matches!(backend.create_surface(11, 10), Err(GridsplitError::Backend(_))));
        assert_eq!(backend.create_surface(10, 10).unwrap().dimensions(), (10, 10));
    }

    #[test]
    fn draw_region_stays_inside_region() {
        let mut source = RgbaImage::from_pixel(4, 8, Rgba([255, 0, 0, 255]));
        for y in 4..8 {
            for x in 0..4 {
                source.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let backend = ImageBackend::default();
        let mut surface = backend.create_surface(2, 3).unwrap();
        let region = SourceRegion { x: 0.0, y: 0.0, width: 4.0, height: 4.0 };
        let dest = PixelRect { x: 0, y: 0, width: 2, height: 3 };
        backend.draw_region(&source, region, &mut surface, dest);
        assert!(surface.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn identity_blit_copies_pixels() {
        let mut source = RgbaImage::new(3, 2);
        for (i, p) in source.pixels_mut().enumerate() {
            *p = Rgba([i as u8 * 40, 10, 20, 255]);
        }
        let backend = ImageBackend::default();
        let mut surface = backend.create_surface(3, 2).unwrap();
        let region = SourceRegion { x: 0.0, y: 0.0, width: 3.0, height: 2.0 };
        backend.draw_region(&source, region, &mut surface, PixelRect { x: 0, y: 0, width: 3, height: 2 });
        assert_eq!(surface, source);
    }

    #[test]
    fn encoded_image_carries_png_data_uri() {
        let backend = ImageBackend::default();
        let surface = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let encoded = backend.encode(&surface).unwrap();
        assert!(encoded.data_uri.starts_with("data:image/png;base64,"));
        assert_eq!(&encoded.bytes[1..4], b"PNG");
        assert_eq!(encoded.decode().unwrap().to_rgba8(), surface);
    }
}
