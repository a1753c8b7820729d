use crate::color::{Color, ColorRange};
use crate::tool::ToolId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tool activation event at a precise point in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolChange {
    pub from: ToolId,
    pub to: ToolId,
    /// 0-based internal layer index.
    pub layer: u32,
    /// 1-based line number in the source file.
    pub line: usize,
    /// Z height at the change, when a move preceded it.
    pub z: Option<f64>,
}

/// Per-layer record derived by the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDetail {
    pub layer: u32,
    /// Colors active on this layer, in activation order.
    pub colors: Vec<ToolId>,
    /// The tool selected when the layer ended.
    pub primary: ToolId,
    pub tool_change_count: usize,
    pub tool_changes: Vec<ToolChange>,
    /// First Z observed within the layer, when any move carried one.
    #[serde(default)]
    pub z: Option<f64>,
}

/// Slicer identity and raw color definitions lifted from comments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlicerInfo {
    pub software: Option<String>,
    pub version: Option<String>,
    /// Raw semicolon-separated definitions, positional by tool index.
    pub color_defs: Vec<String>,
}

/// Per-tool filament estimate as declared by the slicer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentEstimate {
    pub tool: ToolId,
    pub length_mm: Option<f64>,
    pub weight_g: Option<f64>,
}

/// Aggregate filament usage breakdown (`T (M+S)` slicer comment form plus
/// flushed / wipe-tower lines).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub total_g: Option<f64>,
    pub model_g: Option<f64>,
    pub support_g: Option<f64>,
    pub flushed_g: Option<f64>,
    pub tower_g: Option<f64>,
}

/// Outcome of hex-equality deduplication: which ids were redirected where,
/// and which entries disappeared from the final color list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationInfo {
    /// Redirections applied to the layer map and tool changes.
    pub replaced: BTreeMap<ToolId, ToolId>,
    /// Tools freed by deduplication (the non-surviving group members).
    pub freed: Vec<ToolId>,
    /// Defined-but-unused colors filtered from the final list.
    pub dropped_unused: Vec<ToolId>,
}

/// Object bounding box entry from a bundle manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxObject {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bbox: Vec<f64>,
}

/// Slicer metadata carried inside a ZIP-packaged print.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(default)]
    pub filament_colors: Vec<String>,
    #[serde(default)]
    pub filament_ids: Vec<i64>,
    #[serde(default)]
    pub bed_type: Option<String>,
    #[serde(default)]
    pub nozzle_diameter: Option<f64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub is_seq_print: Option<bool>,
    #[serde(default)]
    pub bbox_objects: Vec<BoundingBoxObject>,
}

/// The parser's output aggregate.
///
/// A stats value exclusively owns its colors, ranges, details, and layer
/// map; consumers clone what they need. `layer_color_map` keys are always
/// 0-based after parsing regardless of the numbering scheme the file used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcodeStats {
    pub file_name: String,
    pub file_size: u64,
    pub total_layers: u32,
    /// Maximum Z reached by any move.
    pub total_height: f64,
    /// Order-stable by first appearance in the print.
    pub colors: Vec<Color>,
    /// Ordered by file line.
    pub tool_changes: Vec<ToolChange>,
    /// Layer index → tools active on that layer, in activation order.
    pub layer_color_map: BTreeMap<u32, Vec<ToolId>>,
    pub color_usage_ranges: Vec<ColorRange>,
    pub layer_details: Vec<LayerDetail>,
    #[serde(default)]
    pub slicer: Option<SlicerInfo>,
    #[serde(default)]
    pub filament_estimates: Vec<FilamentEstimate>,
    #[serde(default)]
    pub usage: Option<UsageBreakdown>,
    #[serde(default)]
    pub print_time: Option<String>,
    #[serde(default)]
    pub print_time_seconds: Option<u64>,
    #[serde(default)]
    pub print_cost: Option<f64>,
    #[serde(default)]
    pub bundle: Option<BundleManifest>,
    #[serde(default)]
    pub is_bundle: bool,
    #[serde(default)]
    pub deduplication: Option<DeduplicationInfo>,
    #[serde(default)]
    pub parser_warnings: Vec<String>,
    #[serde(default)]
    pub parse_time_ms: Option<u64>,
    /// Raw file text; never populated by the parser itself, downstream
    /// consumers may fill it lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

impl GcodeStats {
    pub fn color(&self, id: &ToolId) -> Option<&Color> {
        self.colors.iter().find(|c| &c.id == id)
    }

    /// Largest simultaneous color count over all layers.
    pub fn max_simultaneous_colors(&self) -> usize {
        self.layer_color_map
            .values()
            .map(|tools| tools.len())
            .max()
            .unwrap_or(0)
    }

    /// Panics when a cross-crate invariant is broken. Exercised by tests
    /// and debug assertions, never in release paths.
    pub fn assert_invariants(&self) {
        if let Some(max_key) = self.layer_color_map.keys().next_back() {
            // Equality unless slicer metadata declared a higher bound.
            assert!(
                self.total_layers >= max_key + 1,
                "total_layers below 1 + max layer key"
            );
        }
        for color in &self.colors {
            assert!(
                color.first_layer <= color.last_layer,
                "{}: first_layer > last_layer",
                color.id
            );
            assert!(
                !color.layers_used.is_empty(),
                "{}: final colors must appear on at least one layer",
                color.id
            );
            assert!(
                color.layers_used.iter().all(|&l| l < self.total_layers),
                "{}: layers_used outside [0, total_layers)",
                color.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_map_round_trips_through_json() {
        let mut stats = GcodeStats {
            total_layers: 2,
            ..Default::default()
        };
        stats
            .layer_color_map
            .insert(0, vec![ToolId::from_index(0)]);
        stats
            .layer_color_map
            .insert(1, vec![ToolId::from_index(0), ToolId::from_index(1)]);
        let json = serde_json::to_string(&stats).unwrap();
        let back: GcodeStats = serde_json::from_str(&json).unwrap();
        assert_eq!(stats, back);
    }

    #[test]
    fn raw_content_is_omitted_when_absent() {
        let stats = GcodeStats::default();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("raw_content"));
    }
}
