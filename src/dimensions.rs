//! Target geometry: segment heights plus the gaps the host grid inserts between them.

use crate::{GridsplitError, Result};
use serde::{Deserialize, Serialize};

/// Height used when a custom config supplies no segment heights at all
pub const DEFAULT_SEGMENT_HEIGHT: u32 = 253;

/// Width, segment height and gap as measured on the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u32,
    pub segment_height: u32,
    pub gap: u32,
}

static TWITTER_DISPLAY: [(DisplayMode, DisplayConfig); 2] = [
    (DisplayMode::Mobile, DisplayConfig { width: 556, segment_height: 253, gap: 16 }),
    (DisplayMode::Desktop, DisplayConfig { width: 556, segment_height: 253, gap: 57 }),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    #[serde(alias = "compact")]
    Mobile,
    #[serde(alias = "wide")]
    Desktop,
}

impl DisplayMode {
    pub fn display_config(self) -> DisplayConfig {
        TWITTER_DISPLAY
            .iter()
            .find(|(mode, _)| *mode == self)
            .map(|(_, config)| *config)
            .unwrap_or(TWITTER_DISPLAY[0].1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Mobile => "mobile",
            DisplayMode::Desktop => "desktop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDimensions {
    pub width: u32,
    pub segment_heights: Vec<u32>,
    pub gap: u32,
}

/// Preset or user-supplied geometry.
///
/// Serialized as `{"preset":"twitter","mode":"mobile"}` or
/// `{"preset":"custom","custom":{"width":..,"segmentHeights":[..],"gap":..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "preset", rename_all = "lowercase")]
pub enum DimensionConfig {
    Twitter {
        #[serde(default)]
        mode: DisplayMode,
    },
    Custom {
        custom: CustomDimensions,
    },
}

impl Default for DimensionConfig {
    fn default() -> Self {
        DimensionConfig::Twitter { mode: DisplayMode::Mobile }
    }
}

impl DimensionConfig {
    pub fn preset(mode: DisplayMode) -> Self {
        DimensionConfig::Twitter { mode }
    }

    pub fn custom(width: u32, segment_heights: Vec<u32>, gap: u32) -> Self {
        DimensionConfig::Custom { custom: CustomDimensions { width, segment_heights, gap } }
    }

    /// Stable string identifying this config, part of the crop state key
    pub fn cache_key(&self) -> String {
        match self {
            DimensionConfig::Twitter { mode } => format!("twitter-{}", mode.as_str()),
            DimensionConfig::Custom { custom } => {
                let heights: Vec<String> =
                    custom.segment_heights.iter().map(|h| h.to_string()).collect();
                format!("custom-{}-{}-{}", custom.width, heights.join(","), custom.gap)
            }
        }
    }
}

/// The virtual canvas: segment content plus inter-segment gaps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDimensions {
    pub width: u32,
    pub total_height: u32,
    pub content_height: u32,
    pub segment_heights: Vec<u32>,
    pub gap: u32,
    pub gap_count: u32,
    pub aspect_ratio: f64,
}

impl TargetDimensions {
    pub fn segments(&self) -> usize {
        self.segment_heights.len()
    }
}

/// Pads with the last height (or [`DEFAULT_SEGMENT_HEIGHT`]) or truncates so
/// exactly `count` heights come back.
fn reconcile_heights(heights: &[u32], count: usize) -> Vec<u32> {
    let fill = heights.last().copied().unwrap_or(DEFAULT_SEGMENT_HEIGHT);
    heights.iter().copied().chain(std::iter::repeat(fill)).take(count).collect()
}

pub fn compute_target_dimensions(
    segment_count: u32,
    config: &DimensionConfig,
) -> Result<TargetDimensions> {
    if segment_count == 0 {
        return Err(GridsplitError::InvalidInput("segment count must be at least 1".into()));
    }
    let count = segment_count as usize;

    let (width, segment_heights, gap) = match config {
        DimensionConfig::Twitter { mode } => {
            let display = mode.display_config();
            (display.width, vec![display.segment_height; count], display.gap)
        }
        DimensionConfig::Custom { custom } => {
            if custom.width == 0 {
                return Err(GridsplitError::InvalidInput("custom width must be positive".into()));
            }
            if custom.segment_heights.contains(&0) {
                return Err(GridsplitError::InvalidInput(
                    "custom segment heights must be positive".into(),
                ));
            }
            (custom.width, reconcile_heights(&custom.segment_heights, count), custom.gap)
        }
    };

    let too_tall = || GridsplitError::InvalidInput("total canvas height overflows u32".into());
    let gap_count = segment_count - 1;
    let content_height = segment_heights
        .iter()
        .try_fold(0u32, |sum, &h| sum.checked_add(h))
        .ok_or_else(too_tall)?;
    let total_height = gap
        .checked_mul(gap_count)
        .and_then(|gaps| content_height.checked_add(gaps))
        .ok_or_else(too_tall)?;

    Ok(TargetDimensions {
        width,
        total_height,
        content_height,
        segment_heights,
        gap,
        gap_count,
        aspect_ratio: width as f64 / total_height as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_preset_four_segments() {
        let target = compute_target_dimensions(4, &DimensionConfig::preset(DisplayMode::Mobile))
            .unwrap();
        assert_eq!(target.width, 556);
        assert_eq!(target.segment_heights, vec![253, 253, 253, 253]);
        assert_eq!(target.gap, 16);
        assert_eq!(target.gap_count, 3);
        assert_eq!(target.content_height, 1012);
        assert_eq!(target.total_height, 1060);
        assert!((target.aspect_ratio - 556.0 / 1060.0).abs() < 1e-12);
    }

    #[test]
    fn desktop_preset_uses_wide_gap() {
        let target = compute_target_dimensions(2, &DimensionConfig::preset(DisplayMode::Desktop))
            .unwrap();
        assert_eq!(target.gap, 57);
        assert_eq!(target.total_height, 253 * 2 + 57);
    }

    #[test]
    fn custom_heights_are_padded_with_last() {
        let config = DimensionConfig::custom(600, vec![200, 300], 10);
        let target = compute_target_dimensions(4, &config).unwrap();
        assert_eq!(target.segment_heights, vec![200, 300, 300, 300]);
        assert_eq!(target.total_height, 1100 + 30);
    }

    #[test]
    fn custom_heights_are_truncated() {
        let config = DimensionConfig::custom(600, vec![100, 200, 300, 400], 5);
        let target = compute_target_dimensions(2, &config).unwrap();
        assert_eq!(target.segment_heights, vec![100, 200]);
    }

    #[test]
    fn empty_custom_heights_use_default() {
        let config = DimensionConfig::custom(600, vec![], 0);
        let target = compute_target_dimensions(3, &config).unwrap();
        assert_eq!(target.segment_heights, vec![DEFAULT_SEGMENT_HEIGHT; 3]);
        assert_eq!(target.total_height, DEFAULT_SEGMENT_HEIGHT * 3);
    }

    #[test]
    fn rejects_degenerate_input() {
        let preset = DimensionConfig::default();
        assert!(matches!(
            compute_target_dimensions(0, &preset),
            Err(GridsplitError::InvalidInput(_))
        ));
        assert!(compute_target_dimensions(2, &DimensionConfig::custom(0, vec![10], 1)).is_err());
        assert!(compute_target_dimensions(2, &DimensionConfig::custom(10, vec![10, 0], 1)).is_err());
    }

    #[test]
    fn oversized_geometry_is_rejected() {
        let tall = DimensionConfig::custom(556, vec![3_000_000_000; 2], 16);
        assert!(matches!(
            compute_target_dimensions(2, &tall),
            Err(GridsplitError::InvalidInput(_))
        ));
        let wide_gaps = DimensionConfig::custom(556, vec![10], u32::MAX / 2);
        assert!(matches!(
            compute_target_dimensions(3, &wide_gaps),
            Err(GridsplitError::InvalidInput(_))
        ));
        let edge = DimensionConfig::custom(556, vec![u32::MAX - 1], 0);
        assert_eq!(compute_target_dimensions(1, &edge).unwrap().total_height, u32::MAX - 1);
    }

    #[test]
    fn config_round_trips_through_json() {
        let json = r#"{"preset":"twitter","mode":"desktop"}"#;
        let config: DimensionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, DimensionConfig::preset(DisplayMode::Desktop));

        let json = r#"{"preset":"twitter"}"#;
        let config: DimensionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, DimensionConfig::preset(DisplayMode::Mobile));

        let json = r#"{"preset":"twitter","mode":"wide"}"#;
        let config: DimensionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, DimensionConfig::preset(DisplayMode::Desktop));

        let json = r#"{"preset":"custom","custom":{"width":500,"segmentHeights":[100,120],"gap":8}}"#;
        let config: DimensionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, DimensionConfig::custom(500, vec![100, 120], 8));
    }

    #[test]
    fn cache_key_distinguishes_configs() {
        assert_eq!(DimensionConfig::preset(DisplayMode::Mobile).cache_key(), "twitter-mobile");
        assert_eq!(
            DimensionConfig::custom(500, vec![100, 120], 8).cache_key(),
            "custom-500-100,120-8"
        );
    }
}
