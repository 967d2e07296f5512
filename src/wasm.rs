//! WebAssembly bindings for gridsplit

use crate::{
    compute_target_dimensions, merge_images, split_image, CropControls, DimensionConfig,
    DisplayMode, GridsplitError, MergeOptions, RequestGate, RequestToken,
};
use image::DynamicImage;
use wasm_bindgen::prelude::*;

fn to_js(err: GridsplitError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct WasmSplitter {
    segments: u32,
    config: DimensionConfig,
    controls: Option<CropControls>,
    requests: RequestGate,
}

#[wasm_bindgen]
impl WasmSplitter {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmSplitter {
        WasmSplitter {
            segments: 4,
            config: DimensionConfig::default(),
            controls: None,
            requests: RequestGate::new(),
        }
    }

    #[wasm_bindgen]
    pub fn set_segments(&mut self, segments: u32) -> Result<(), JsValue> {
        compute_target_dimensions(segments, &self.config).map_err(to_js)?;
        if let Some(controls) = &mut self.controls {
            controls.set_segments(segments).map_err(to_js)?;
        }
        self.segments = segments;
        Ok(())
    }

    /// "mobile" / "desktop" (or "compact" / "wide")
    #[wasm_bindgen]
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode = match mode {
            "mobile" | "compact" => DisplayMode::Mobile,
            "desktop" | "wide" => DisplayMode::Desktop,
            other => return Err(JsValue::from_str(&format!("unknown display mode '{other}'"))),
        };
        self.apply_config(DimensionConfig::preset(mode))
    }

    /// Dimension config as JSON, e.g. `{"preset":"custom","custom":{...}}`
    #[wasm_bindgen]
    pub fn set_config_json(&mut self, json: &str) -> Result<(), JsValue> {
        let config: DimensionConfig =
            serde_json::from_str(json).map_err(|e| to_js(GridsplitError::Config(e)))?;
        self.apply_config(config)
    }

    /// Registers the image the crop controls act on. `id` identifies the image
    /// so that loading a different one resets pan and zoom.
    #[wasm_bindgen]
    pub fn set_source(&mut self, id: &str, width: u32, height: u32) -> Result<(), JsValue> {
        match &mut self.controls {
            Some(controls) => controls.set_source(id, width, height).map_err(to_js),
            None => {
                let controls =
                    CropControls::new(id, width, height, self.segments, self.config.clone())
                        .map_err(to_js)?;
                self.controls = Some(controls);
                Ok(())
            }
        }
    }

    #[wasm_bindgen]
    pub fn pan(&mut self, delta_x: f64, delta_y: f64) {
        if let Some(controls) = &mut self.controls {
            controls.pan(delta_x, delta_y);
        }
    }

    #[wasm_bindgen]
    pub fn zoom_to(&mut self, zoom: f64) {
        if let Some(controls) = &mut self.controls {
            controls.zoom_to(zoom);
        }
    }

    #[wasm_bindgen]
    pub fn zoom_by(&mut self, delta: f64) {
        if let Some(controls) = &mut self.controls {
            controls.zoom_by(delta);
        }
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        if let Some(controls) = &mut self.controls {
            controls.reset();
        }
    }

    /// Current crop view as `{rect, zoom, minZoom, maxZoom, canZoomIn, canZoomOut, isModified}`
    #[wasm_bindgen]
    pub fn view(&mut self) -> Result<JsValue, JsValue> {
        let controls = self
            .controls
            .as_mut()
            .ok_or_else(|| JsValue::from_str("no source image"))?;
        let json = serde_json::to_string(&controls.view())
            .map_err(|e| to_js(GridsplitError::Config(e)))?;
        js_sys::JSON::parse(&json)
    }

    /// Starts a request; results for older tokens should be discarded.
    #[wasm_bindgen]
    pub fn begin_request(&self) -> f64 {
        self.requests.begin().id() as f64
    }

    #[wasm_bindgen]
    pub fn is_current(&self, token: f64) -> bool {
        self.requests.is_current(RequestToken::from_id(token as u64))
    }

    /// Splits an RGBA buffer with the current crop. Returns an array of PNG byte arrays.
    /// The buffer must have the dimensions passed to `set_source`.
    #[wasm_bindgen]
    pub fn split(&mut self, image_data: &[u8], width: u32, height: u32) -> Result<js_sys::Array, JsValue> {
        let img = image::RgbaImage::from_raw(width, height, image_data.to_vec())
            .ok_or_else(|| JsValue::from_str("Invalid image dimensions"))?;
        let controls = self
            .controls
            .as_mut()
            .ok_or_else(|| JsValue::from_str("no source image"))?;
        controls.check_source(width, height).map_err(to_js)?;
        let crop = controls.view().rect;

        let target = compute_target_dimensions(self.segments, &self.config).map_err(to_js)?;
        let result = split_image(&DynamicImage::ImageRgba8(img), self.segments, &target, crop)
            .map_err(to_js)?;

        let segments = js_sys::Array::new();
        for segment in &result.segments {
            segments.push(&js_sys::Uint8Array::from(&segment.bytes[..]));
        }
        Ok(segments)
    }

    fn apply_config(&mut self, config: DimensionConfig) -> Result<(), JsValue> {
        compute_target_dimensions(self.segments, &config).map_err(to_js)?;
        if let Some(controls) = &mut self.controls {
            controls.set_config(config.clone()).map_err(to_js)?;
        }
        self.config = config;
        Ok(())
    }
}

impl Default for WasmSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges encoded images (array of byte arrays) top to bottom.
/// `options_json` follows `{"gapFill":"blur","gapSize":16,"solidColor":"#ffffff"}`.
#[wasm_bindgen]
pub fn merge_encoded(images: js_sys::Array, options_json: &str) -> Result<js_sys::Uint8Array, JsValue> {
    let options: MergeOptions =
        serde_json::from_str(options_json).map_err(|e| to_js(GridsplitError::Config(e)))?;
    let decoded = images
        .iter()
        .map(|value| {
            let bytes = js_sys::Uint8Array::new(&value).to_vec();
            image::load_from_memory(&bytes).map_err(|e| to_js(e.into()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let result = merge_images(&decoded, &options).map_err(to_js)?;
    Ok(js_sys::Uint8Array::from(&result.image.bytes[..]))
}
