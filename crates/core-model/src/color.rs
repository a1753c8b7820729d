use crate::tool::ToolId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One logical material channel as observed over the whole print.
///
/// Created by the statistics finalizer; after that, only the merge engine
/// produces new `Color` values (it never patches one in place). The
/// `total_layers` context is carried so percentage derivation needs no
/// external lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub id: ToolId,
    /// Human-facing name; falls back to the hex triplet or the raw handle
    /// when no lookup matched.
    pub name: String,
    /// Normalized `#RRGGBB` when known.
    pub hex: Option<String>,
    pub first_layer: u32,
    pub last_layer: u32,
    /// Layers on which this color was deposited.
    pub layers_used: BTreeSet<u32>,
    /// Layers on which the color appeared alongside others only.
    pub partial_layers: BTreeSet<u32>,
    pub total_layers: u32,
}

impl Color {
    pub fn layer_count(&self) -> usize {
        self.layers_used.len()
    }

    pub fn usage_percent(&self) -> f64 {
        if self.total_layers == 0 {
            return 0.0;
        }
        self.layers_used.len() as f64 / self.total_layers as f64 * 100.0
    }

    /// Number of disjoint contiguous runs inside `layers_used`. A perfectly
    /// continuous color reports 1; a zero-usage entry reports 0.
    pub fn segment_count(&self) -> usize {
        let mut segments = 0usize;
        let mut prev: Option<u32> = None;
        for &layer in &self.layers_used {
            if prev.is_none_or(|p| layer != p + 1) {
                segments += 1;
            }
            prev = Some(layer);
        }
        segments
    }
}

/// Contiguous layer interval on which a color appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub color: ToolId,
    pub start_layer: u32,
    pub end_layer: u32,
    /// True when the color appears on every layer of the interval.
    pub continuous: bool,
}

impl ColorRange {
    /// Construct a range normalizing ordering so that start <= end.
    pub fn new(color: ToolId, start_layer: u32, end_layer: u32, continuous: bool) -> Self {
        let (start_layer, end_layer) = if start_layer <= end_layer {
            (start_layer, end_layer)
        } else {
            (end_layer, start_layer)
        };
        Self {
            color,
            start_layer,
            end_layer,
            continuous,
        }
    }

    pub fn len(&self) -> u32 {
        self.end_layer - self.start_layer + 1
    }

    /// Maximal contiguous runs over a sorted layer set. Each run is
    /// gapless, so `continuous` holds; a color with gaps yields several
    /// ranges.
    pub fn runs(color: &ToolId, layers: &BTreeSet<u32>) -> Vec<ColorRange> {
        let mut ranges = Vec::new();
        let mut run: Option<(u32, u32)> = None;
        for &layer in layers {
            run = match run {
                Some((start, end)) if layer == end + 1 => Some((start, layer)),
                Some((start, end)) => {
                    ranges.push(ColorRange::new(color.clone(), start, end, true));
                    Some((layer, layer))
                }
                None => Some((layer, layer)),
            };
        }
        if let Some((start, end)) = run {
            ranges.push(ColorRange::new(color.clone(), start, end, true));
        }
        ranges
    }
}

/// Normalize a color triplet to canonical `#RRGGBB` (uppercase). Accepts
/// `#RRGGBB`, `RRGGBB`, and the shorthand `#RGB`. Returns `None` for
/// anything else (named colors are resolved upstream by the palette).
pub fn normalize_hex(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('#');
    let expanded = match trimmed.len() {
        6 => trimmed.to_string(),
        3 => trimmed.chars().flat_map(|c| [c, c]).collect(),
        _ => return None,
    };
    if !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", expanded.to_ascii_uppercase()))
}

/// Split a normalized `#RRGGBB` triplet into channel bytes.
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let h = hex.strip_prefix('#')?;
    if h.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&h[0..2], 16).ok()?;
    let g = u8::from_str_radix(&h[2..4], 16).ok()?;
    let b = u8::from_str_radix(&h[4..6], 16).ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_with_layers(layers: &[u32], total: u32) -> Color {
        Color {
            id: ToolId::from_index(0),
            name: "test".into(),
            hex: None,
            first_layer: layers.first().copied().unwrap_or(0),
            last_layer: layers.last().copied().unwrap_or(0),
            layers_used: layers.iter().copied().collect(),
            partial_layers: BTreeSet::new(),
            total_layers: total,
        }
    }

    #[test]
    fn usage_percent_over_total() {
        let c = color_with_layers(&[0, 1, 2, 3, 4], 10);
        assert!((c.usage_percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn segment_count_detects_gaps() {
        assert_eq!(color_with_layers(&[0, 1, 2], 3).segment_count(), 1);
        assert_eq!(color_with_layers(&[0, 1, 5, 6, 9], 10).segment_count(), 3);
        assert_eq!(color_with_layers(&[], 10).segment_count(), 0);
    }

    #[test]
    fn range_normalizes_ordering() {
        let r = ColorRange::new(ToolId::from_index(1), 9, 3, true);
        assert_eq!((r.start_layer, r.end_layer), (3, 9));
        assert_eq!(r.len(), 7);
    }

    #[test]
    fn hex_normalization() {
        assert_eq!(normalize_hex("#ffaa00").as_deref(), Some("#FFAA00"));
        assert_eq!(normalize_hex("ffaa00").as_deref(), Some("#FFAA00"));
        assert_eq!(normalize_hex("#fa0").as_deref(), Some("#FFAA00"));
        assert_eq!(normalize_hex("red"), None);
        assert_eq!(normalize_hex("#ggaa00"), None);
    }

    #[test]
    fn hex_to_rgb_round_trip() {
        assert_eq!(hex_to_rgb("#FFAA00"), Some((0xFF, 0xAA, 0x00)));
        assert_eq!(hex_to_rgb("FFAA00"), None);
    }
}
