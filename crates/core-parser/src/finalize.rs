//! Statistics finalizer: raw machine output → populated [`GcodeStats`].
//!
//! Steps run in a fixed order: total-layer determination, hex resolution,
//! hex-equality deduplication (rewriting the layer map and tool changes
//! through the survivor mapping), color entity construction, name
//! enhancement, zero-usage bookkeeping, layer details, and contiguous
//! range extraction. Deduplication is idempotent: a second pass over
//! already-deduplicated stats finds every hex unique and changes nothing.

use crate::palette::ColorNamer;
use crate::state::RawParse;
use core_model::{
    Color, ColorRange, DeduplicationInfo, FilamentEstimate, GcodeStats, LayerDetail, SlicerInfo,
    ToolChange, ToolId,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub struct FinalizeArgs<'a> {
    pub file_name: &'a str,
    pub file_size: u64,
    pub namer: &'a dyn ColorNamer,
    pub parse_time_ms: u64,
}

pub fn build_stats(raw: RawParse, args: FinalizeArgs<'_>) -> GcodeStats {
    let RawParse {
        mut layer_color_map,
        mut tool_changes,
        mut layer_changes,
        mut layer_primary,
        first_seen,
        last_seen: _,
        layer_z,
        total_height,
        numbering_base: _,
        meta,
        warnings,
        lines: _,
    } = raw;

    // Step 1: total layers. Keys are already 0-based (layer 0 is seeded),
    // so the span is max+1; a larger declared bound from metadata wins.
    let max_key = layer_color_map.keys().next_back().copied().unwrap_or(0);
    let mut total_layers = max_key + 1;
    if let Some(declared) = meta.declared_total_layers {
        total_layers = total_layers.max(declared);
    }

    // Resolve raw color definitions to hex, positional by tool index.
    let def_hex: Vec<Option<String>> = meta
        .color_defs
        .iter()
        .map(|def| args.namer.hex_for(def))
        .collect();
    let hex_of = |tool: &ToolId| -> Option<String> {
        let index = tool.index()? as usize;
        def_hex.get(index).cloned().flatten()
    };

    // Step 2: hex-equality deduplication over observed tools. Within a
    // group the first-appearing tool survives; the rest are redirected.
    let mut replaced: BTreeMap<ToolId, ToolId> = BTreeMap::new();
    let mut groups: BTreeMap<String, ToolId> = BTreeMap::new();
    for (tool, _) in &first_seen {
        if let Some(hex) = hex_of(tool) {
            if let Some(keeper) = groups.get(&hex).cloned() {
                if &keeper != tool {
                    debug!(target: "parser", dropped = %tool, kept = %keeper, hex = %hex, "dedupe_merge");
                    replaced.insert(tool.clone(), keeper);
                }
            } else {
                groups.insert(hex, tool.clone());
            }
        }
    }
    let freed: Vec<ToolId> = replaced.keys().cloned().collect();
    if !replaced.is_empty() {
        let redirect = |tool: &ToolId| replaced.get(tool).unwrap_or(tool).clone();
        for list in layer_color_map.values_mut() {
            let mut rewritten: Vec<ToolId> = Vec::with_capacity(list.len());
            for tool in list.iter() {
                let target = redirect(tool);
                if !rewritten.contains(&target) {
                    rewritten.push(target);
                }
            }
            *list = rewritten;
        }
        let rewrite_change = |change: &mut ToolChange| {
            change.from = redirect(&change.from);
            change.to = redirect(&change.to);
        };
        tool_changes.iter_mut().for_each(rewrite_change);
        for changes in layer_changes.values_mut() {
            changes.iter_mut().for_each(rewrite_change);
        }
        for primary in layer_primary.values_mut() {
            *primary = redirect(primary);
        }
    }

    // Steps 3 + 4: color entities from the (rewritten) layer map, names
    // through the injected lookup.
    let survivors: Vec<(ToolId, u32)> = first_seen
        .iter()
        .filter(|(tool, _)| !replaced.contains_key(tool))
        .cloned()
        .collect();
    let mut colors = Vec::with_capacity(survivors.len());
    for (tool, _) in &survivors {
        let layers_used: BTreeSet<u32> = layer_color_map
            .iter()
            .filter(|(_, tools)| tools.contains(tool))
            .map(|(&layer, _)| layer)
            .collect();
        let partial_layers: BTreeSet<u32> = layers_used
            .iter()
            .copied()
            .filter(|layer| layer_color_map[layer].len() > 1)
            .collect();
        let hex = hex_of(tool);
        let name = hex
            .as_deref()
            .and_then(|h| args.namer.name_for(h))
            .or_else(|| hex.clone())
            .unwrap_or_else(|| tool.to_string());
        let first_layer = layers_used.iter().next().copied().unwrap_or(0);
        let last_layer = layers_used.iter().next_back().copied().unwrap_or(first_layer);
        colors.push(Color {
            id: tool.clone(),
            name,
            hex,
            first_layer,
            last_layer,
            layers_used,
            partial_layers,
            total_layers,
        });
    }

    // Defined-but-unused colors: definitions beyond the observed tools are
    // recorded for the dedup report, never in the final list.
    let mut dropped_unused: Vec<ToolId> = Vec::new();
    for (index, hex) in def_hex.iter().enumerate() {
        if hex.is_some() {
            let tool = ToolId::from_index(index as u32);
            let observed = first_seen.iter().any(|(t, _)| t == &tool);
            if !observed {
                dropped_unused.push(tool);
            }
        }
    }

    // Step 6: zero-usage filtering (a survivor can still be unused when a
    // declared total exceeds the observed span; never here, but the map
    // is authoritative).
    colors.retain(|color| {
        if color.layers_used.is_empty() {
            dropped_unused.push(color.id.clone());
            false
        } else {
            true
        }
    });

    let deduplication = if replaced.is_empty() && dropped_unused.is_empty() {
        None
    } else {
        Some(DeduplicationInfo {
            replaced,
            freed,
            dropped_unused,
        })
    };

    // Layer details from the rewritten structures.
    let layer_details: Vec<LayerDetail> = layer_color_map
        .iter()
        .map(|(&layer, tools)| {
            let changes = layer_changes.remove(&layer).unwrap_or_default();
            let primary = layer_primary
                .get(&layer)
                .cloned()
                .unwrap_or_else(|| tools.first().cloned().unwrap_or_else(|| ToolId::from_index(0)));
            LayerDetail {
                layer,
                colors: tools.clone(),
                primary,
                tool_change_count: changes.len(),
                tool_changes: changes,
                z: layer_z.get(&layer).copied(),
            }
        })
        .collect();

    // Step 5: contiguous run-length ranges per final color.
    let mut color_usage_ranges = Vec::new();
    for color in &colors {
        color_usage_ranges.extend(ColorRange::runs(&color.id, &color.layers_used));
    }

    let slicer = if meta.slicer_software.is_some() || !meta.color_defs.is_empty() {
        Some(SlicerInfo {
            software: meta.slicer_software,
            version: meta.slicer_version,
            color_defs: meta.color_defs,
        })
    } else {
        None
    };

    let tool_count = meta
        .weights_per_tool
        .len()
        .max(meta.lengths_per_tool.len());
    let filament_estimates: Vec<FilamentEstimate> = (0..tool_count)
        .map(|index| FilamentEstimate {
            tool: ToolId::from_index(index as u32),
            length_mm: meta.lengths_per_tool.get(index).copied(),
            weight_g: meta.weights_per_tool.get(index).copied(),
        })
        .collect();

    let mut usage = meta.usage;
    if usage.total_g.is_none() && !meta.weights_per_tool.is_empty() {
        usage.total_g = Some(meta.weights_per_tool.iter().sum());
    }
    let usage = if usage == Default::default() {
        None
    } else {
        Some(usage)
    };

    let print_cost = if meta.costs.is_empty() {
        None
    } else {
        Some(meta.costs.iter().sum())
    };

    GcodeStats {
        file_name: args.file_name.to_string(),
        file_size: args.file_size,
        total_layers,
        total_height,
        colors,
        tool_changes,
        layer_color_map,
        color_usage_ranges,
        layer_details,
        slicer,
        filament_estimates,
        usage,
        print_time: meta.print_time_raw,
        print_time_seconds: meta.print_time_seconds,
        print_cost,
        bundle: None,
        is_bundle: false,
        deduplication,
        parser_warnings: warnings,
        parse_time_ms: Some(args.parse_time_ms),
        raw_content: None,
    }
}
