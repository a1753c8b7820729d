//! Color merging: fold source colors into a target and re-derive the
//! layer map.
//!
//! `merge_colors` is pure: the input stats value is never touched; a new
//! stats value comes back alongside a [`MergeInfo`] record. Every failure
//! mode checks before any work happens, so an `Err` guarantees nothing
//! changed anywhere. The caller (the session coordinator) re-runs the
//! optimizer and the constraint validator on the merged stats.

use core_model::{ColorRange, GcodeStats, MergeInfo, ToolChange, ToolId};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("unknown merge target {0}")]
    UnknownTarget(ToolId),
    #[error("unknown merge source {0}")]
    UnknownSource(ToolId),
    #[error("merge target {0} cannot also be a source")]
    TargetEqualsSource(ToolId),
    #[error("merge with no sources is a no-op")]
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub stats: GcodeStats,
    pub info: MergeInfo,
}

/// Fold every source color into `target`, preserving per-layer order and
/// collapsing duplicates.
pub fn merge_colors(
    stats: &GcodeStats,
    target: &ToolId,
    sources: &[ToolId],
) -> Result<MergeOutcome, MergeError> {
    if sources.is_empty() {
        return Err(MergeError::Noop);
    }
    if stats.color(target).is_none() {
        return Err(MergeError::UnknownTarget(target.clone()));
    }
    for source in sources {
        if source == target {
            return Err(MergeError::TargetEqualsSource(target.clone()));
        }
        if stats.color(source).is_none() {
            return Err(MergeError::UnknownSource(source.clone()));
        }
    }

    let mut merged = stats.clone();
    let redirect = |tool: &ToolId| -> ToolId {
        if sources.contains(tool) {
            target.clone()
        } else {
            tool.clone()
        }
    };

    // Layer map: rewrite ids, collapse duplicates, keep order.
    for tools in merged.layer_color_map.values_mut() {
        let mut rewritten: Vec<ToolId> = Vec::with_capacity(tools.len());
        for tool in tools.iter() {
            let mapped = redirect(tool);
            if !rewritten.contains(&mapped) {
                rewritten.push(mapped);
            }
        }
        *tools = rewritten;
    }

    let rewrite_change = |change: &mut ToolChange| {
        change.from = redirect(&change.from);
        change.to = redirect(&change.to);
    };
    merged.tool_changes.iter_mut().for_each(rewrite_change);
    for detail in &mut merged.layer_details {
        let mut rewritten: Vec<ToolId> = Vec::with_capacity(detail.colors.len());
        for tool in &detail.colors {
            let mapped = redirect(tool);
            if !rewritten.contains(&mapped) {
                rewritten.push(mapped);
            }
        }
        detail.colors = rewritten;
        detail.primary = redirect(&detail.primary);
        detail.tool_changes.iter_mut().for_each(rewrite_change);
    }

    // Color entities: target absorbs the union, sources disappear.
    merged.colors.retain(|color| !sources.contains(&color.id));
    let target_entry = merged
        .colors
        .iter_mut()
        .find(|color| &color.id == target)
        .expect("target color survives retain");
    target_entry.layers_used = merged
        .layer_color_map
        .iter()
        .filter(|(_, tools)| tools.contains(target))
        .map(|(&layer, _)| layer)
        .collect();
    target_entry.partial_layers = target_entry
        .layers_used
        .iter()
        .copied()
        .filter(|layer| merged.layer_color_map[layer].len() > 1)
        .collect();
    target_entry.first_layer = target_entry.layers_used.iter().next().copied().unwrap_or(0);
    target_entry.last_layer = target_entry
        .layers_used
        .iter()
        .next_back()
        .copied()
        .unwrap_or(target_entry.first_layer);
    let target_layers = target_entry.layers_used.clone();

    // Usage ranges: drop everything touching the merged ids, re-extract
    // the target's runs from the merged map.
    merged.color_usage_ranges.retain(|range| {
        range.color != *target && !sources.contains(&range.color)
    });
    merged
        .color_usage_ranges
        .extend(ColorRange::runs(target, &target_layers));

    let info = MergeInfo {
        target: target.clone(),
        sources: sources.to_vec(),
        freed_slots: sources.to_vec(),
        description: format!(
            "merged {} into {}",
            sources
                .iter()
                .map(ToolId::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            target
        ),
    };
    info!(
        target: "merge",
        merge_target = %target,
        sources = info.sources.len(),
        layers = target_layers.len(),
        "colors_merged"
    );
    Ok(MergeOutcome {
        stats: merged,
        info,
    })
}
