//! Interactive crop window: pan and zoom layered over the fit-crop baseline.
//!
//! Pan/zoom state is stored together with the key of the configuration it was
//! made under. Every read and every mutation first resolves the state against
//! the current key, so a configuration change is observed as the identity
//! state until the next commit persists it.

use crate::crop::{calculate_fit_crop, NormalizedRect};
use crate::dimensions::{compute_target_dimensions, DimensionConfig};
use crate::{GridsplitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 5.0;
const MODIFIED_EPSILON: f64 = 1e-3;

/// User adjustment relative to the base crop. Pan moves the crop center in
/// normalized image units; zoom divides the base crop size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanZoom {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl PanZoom {
    pub const IDENTITY: PanZoom = PanZoom { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 };

    pub fn is_modified(&self) -> bool {
        self.pan_x.abs() > MODIFIED_EPSILON
            || self.pan_y.abs() > MODIFIED_EPSILON
            || (self.zoom - 1.0).abs() > MODIFIED_EPSILON
    }
}

impl Default for PanZoom {
    fn default() -> Self {
        PanZoom::IDENTITY
    }
}

/// Identity of the (image, segment count, dimension config) a crop belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CropKey(String);

impl CropKey {
    pub fn new(
        source_id: &str,
        source_width: u32,
        source_height: u32,
        segments: u32,
        config: &DimensionConfig,
    ) -> Self {
        CropKey(format!(
            "{source_id}-{source_width}-{source_height}-{segments}-{}",
            config.cache_key()
        ))
    }
}

impl fmt::Display for CropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pan/zoom state tagged with the key it was committed under.
#[derive(Debug, Clone, Default)]
pub struct CropSession {
    key: Option<CropKey>,
    pan_zoom: PanZoom,
}

impl CropSession {
    /// State as seen under `key`: the stored state if the key matches, identity otherwise.
    pub fn resolve(&self, key: &CropKey) -> PanZoom {
        if self.key.as_ref() == Some(key) {
            self.pan_zoom
        } else {
            PanZoom::IDENTITY
        }
    }

    pub fn commit(&mut self, key: CropKey, pan_zoom: PanZoom) {
        self.key = Some(key);
        self.pan_zoom = pan_zoom;
    }

    pub fn is_stale(&self, key: &CropKey) -> bool {
        self.key.as_ref() != Some(key)
    }
}

/// Allowed pan range per axis for a given zoom: the crop center may move until
/// the zoomed window touches an image edge.
fn pan_bounds(base: &NormalizedRect, zoom: f64) -> ((f64, f64), (f64, f64)) {
    let width = base.width / zoom;
    let height = base.height / zoom;
    let (cx, cy) = base.center();
    (
        (width / 2.0 - cx, 1.0 - width / 2.0 - cx),
        (height / 2.0 - cy, 1.0 - height / 2.0 - cy),
    )
}

fn clamp_pan_zoom(base: &NormalizedRect, pan_zoom: PanZoom) -> PanZoom {
    let zoom = pan_zoom.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    let ((min_x, max_x), (min_y, max_y)) = pan_bounds(base, zoom);
    PanZoom {
        pan_x: pan_zoom.pan_x.clamp(min_x, max_x.max(min_x)),
        pan_y: pan_zoom.pan_y.clamp(min_y, max_y.max(min_y)),
        zoom,
    }
}

/// Effective crop for a base crop and a pan/zoom state, clamped to the image.
pub fn effective_crop(base: &NormalizedRect, pan_zoom: &PanZoom) -> NormalizedRect {
    let width = base.width / pan_zoom.zoom;
    let height = base.height / pan_zoom.zoom;
    // Offset from the base corner keeps the identity state bit-exact with the base crop.
    let x = base.x + (base.width - width) / 2.0 + pan_zoom.pan_x;
    let y = base.y + (base.height - height) / 2.0 + pan_zoom.pan_y;
    NormalizedRect {
        x: x.clamp(0.0, (1.0 - width).max(0.0)),
        y: y.clamp(0.0, (1.0 - height).max(0.0)),
        width,
        height,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropView {
    pub rect: NormalizedRect,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub can_zoom_in: bool,
    pub can_zoom_out: bool,
    pub is_modified: bool,
}

/// Crop controls for one image, segment count and dimension config.
#[derive(Debug, Clone)]
pub struct CropControls {
    source_id: String,
    source_width: u32,
    source_height: u32,
    segments: u32,
    config: DimensionConfig,
    key: CropKey,
    base: NormalizedRect,
    session: CropSession,
}

fn derive_base(
    source_id: &str,
    source_width: u32,
    source_height: u32,
    segments: u32,
    config: &DimensionConfig,
) -> Result<(CropKey, NormalizedRect)> {
    if source_width == 0 || source_height == 0 {
        return Err(GridsplitError::InvalidInput(format!(
            "source image has no area ({source_width}x{source_height})"
        )));
    }
    let target = compute_target_dimensions(segments, config)?;
    let base = calculate_fit_crop(source_width, source_height, target.aspect_ratio);
    let key = CropKey::new(source_id, source_width, source_height, segments, config);
    Ok((key, base))
}

impl CropControls {
    pub fn new(
        source_id: impl Into<String>,
        source_width: u32,
        source_height: u32,
        segments: u32,
        config: DimensionConfig,
    ) -> Result<Self> {
        let source_id = source_id.into();
        let (key, base) = derive_base(&source_id, source_width, source_height, segments, &config)?;
        let mut session = CropSession::default();
        session.commit(key.clone(), PanZoom::IDENTITY);
        Ok(Self { source_id, source_width, source_height, segments, config, key, base, session })
    }

    pub fn set_source(
        &mut self,
        source_id: impl Into<String>,
        source_width: u32,
        source_height: u32,
    ) -> Result<()> {
        let source_id = source_id.into();
        let (key, base) =
            derive_base(&source_id, source_width, source_height, self.segments, &self.config)?;
        self.source_id = source_id;
        self.source_width = source_width;
        self.source_height = source_height;
        self.key = key;
        self.base = base;
        Ok(())
    }

    pub fn set_segments(&mut self, segments: u32) -> Result<()> {
        let (key, base) = derive_base(
            &self.source_id,
            self.source_width,
            self.source_height,
            segments,
            &self.config,
        )?;
        self.segments = segments;
        self.key = key;
        self.base = base;
        Ok(())
    }

    pub fn set_config(&mut self, config: DimensionConfig) -> Result<()> {
        let (key, base) = derive_base(
            &self.source_id,
            self.source_width,
            self.source_height,
            self.segments,
            &config,
        )?;
        self.config = config;
        self.key = key;
        self.base = base;
        Ok(())
    }

    pub fn key(&self) -> &CropKey {
        &self.key
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    pub fn config(&self) -> &DimensionConfig {
        &self.config
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    /// Fails unless `width`x`height` matches the registered source, since the
    /// crop is only meaningful for the image it was fitted to.
    pub fn check_source(&self, width: u32, height: u32) -> Result<()> {
        if (width, height) != (self.source_width, self.source_height) {
            return Err(GridsplitError::InvalidInput(format!(
                "image is {width}x{height} but the crop was fitted to {}x{}",
                self.source_width, self.source_height
            )));
        }
        Ok(())
    }

    pub fn base_crop(&self) -> NormalizedRect {
        self.base
    }

    pub fn pan_zoom(&self) -> PanZoom {
        self.session.resolve(&self.key)
    }

    pub fn zoom(&self) -> f64 {
        self.pan_zoom().zoom
    }

    pub fn crop(&self) -> NormalizedRect {
        effective_crop(&self.base, &self.pan_zoom())
    }

    pub fn is_modified(&self) -> bool {
        self.pan_zoom().is_modified()
    }

    pub fn can_zoom_in(&self) -> bool {
        self.zoom() < MAX_ZOOM
    }

    pub fn can_zoom_out(&self) -> bool {
        self.zoom() > MIN_ZOOM
    }

    /// Snapshot of the current crop. Persists a pending reset if the
    /// configuration changed since the last commit.
    pub fn view(&mut self) -> CropView {
        let pan_zoom = self.sync();
        CropView {
            rect: effective_crop(&self.base, &pan_zoom),
            zoom: pan_zoom.zoom,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            can_zoom_in: pan_zoom.zoom < MAX_ZOOM,
            can_zoom_out: pan_zoom.zoom > MIN_ZOOM,
            is_modified: pan_zoom.is_modified(),
        }
    }

    /// Shifts the crop center by fractional deltas, clamped to the pan range of the current zoom.
    /// Non-finite deltas are ignored.
    pub fn pan(&mut self, delta_x: f64, delta_y: f64) {
        if !delta_x.is_finite() || !delta_y.is_finite() {
            warn!(delta_x, delta_y, "ignoring non-finite pan");
            return;
        }
        let current = self.sync();
        let next = PanZoom {
            pan_x: current.pan_x + delta_x,
            pan_y: current.pan_y + delta_y,
            zoom: current.zoom,
        };
        self.session.commit(self.key.clone(), clamp_pan_zoom(&self.base, next));
    }

    /// Non-finite zoom levels are ignored.
    pub fn zoom_to(&mut self, zoom: f64) {
        if !zoom.is_finite() {
            warn!(zoom, "ignoring non-finite zoom");
            return;
        }
        let current = self.sync();
        let next = PanZoom { zoom, ..current };
        self.session.commit(self.key.clone(), clamp_pan_zoom(&self.base, next));
    }

    /// Multiplicative zoom step; positive deltas zoom in.
    pub fn zoom_by(&mut self, delta: f64) {
        let zoom = self.sync().zoom;
        self.zoom_to(zoom * (1.0 + delta));
    }

    pub fn reset(&mut self) {
        self.session.commit(self.key.clone(), PanZoom::IDENTITY);
    }

    fn sync(&mut self) -> PanZoom {
        if self.session.is_stale(&self.key) {
            debug!(key = %self.key, "configuration changed, resetting crop");
            self.session.commit(self.key.clone(), PanZoom::IDENTITY);
        }
        self.session.resolve(&self.key)
    }
}
