//! Canonical greedy slot assignment.
//!
//! Ranking pins the highest-priority colors to permanent slots and folds
//! the remainder into the last slot as a manually-swapped sequence.
//! Priority combines layer coverage, contiguity (fewer disjoint runs
//! preferred), and total span; ties resolve to first-appearance order via
//! the stable sort.

use crate::OptimizationStrategy;
use core_model::{
    Color, GcodeStats, ManualSwap, OptimizationResult, SharedPair, SlotAssignment,
    SwapConfidence, SystemConfiguration,
};
use tracing::debug;

pub const DEFAULT_SECONDS_PER_SWAP: u64 = 120;

/// Flexibility points per layer of swap-window width.
const FLEXIBILITY_PER_LAYER: u32 = 5;

pub struct GreedyStrategy {
    seconds_per_swap: u64,
}

impl GreedyStrategy {
    pub fn new(seconds_per_swap: u64) -> Self {
        Self { seconds_per_swap }
    }
}

impl Default for GreedyStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_SECONDS_PER_SWAP)
    }
}

fn priority(color: &Color) -> f64 {
    let coverage = color.usage_percent();
    let contiguity = 100.0 / color.segment_count().max(1) as f64;
    let span = if color.total_layers == 0 {
        0.0
    } else {
        (color.last_layer - color.first_layer + 1) as f64 / color.total_layers as f64 * 100.0
    };
    coverage + contiguity + span
}

fn layer_z(stats: &GcodeStats, layer: u32) -> Option<f64> {
    stats
        .layer_details
        .iter()
        .find(|detail| detail.layer == layer)
        .and_then(|detail| detail.z)
}

/// Pairs of colors whose `[first, last]` spans never overlap; such pairs
/// could share one slot with a single swap between them.
fn shareable_pairs(colors: &[Color]) -> Vec<SharedPair> {
    let mut pairs = Vec::new();
    for (i, a) in colors.iter().enumerate() {
        for b in &colors[i + 1..] {
            let disjoint = a.last_layer < b.first_layer || b.last_layer < a.first_layer;
            if disjoint {
                pairs.push(SharedPair {
                    first: a.id.clone(),
                    second: b.id.clone(),
                });
            }
        }
    }
    pairs
}

impl OptimizationStrategy for GreedyStrategy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn optimize(&self, stats: &GcodeStats, config: &SystemConfiguration) -> OptimizationResult {
        let total_slots = config.total_slots();
        let colors = &stats.colors;
        if colors.is_empty() || total_slots == 0 {
            return OptimizationResult::empty(*config);
        }

        let required_slots = (colors.len() as u32).min(total_slots);
        let shared_pairs = shareable_pairs(colors);

        // Everything fits: one permanent slot per color, no swaps.
        if colors.len() as u32 <= total_slots {
            let assignments = colors
                .iter()
                .enumerate()
                .map(|(flat, color)| {
                    let (unit, slot) = config.locate(flat as u32);
                    SlotAssignment::permanent(unit, slot, color.id.clone())
                })
                .collect();
            return OptimizationResult {
                assignments,
                swaps: Vec::new(),
                total_slots,
                required_slots,
                estimated_time_saved_secs: 0,
                shared_pairs,
                configuration: *config,
            };
        }

        // Rank by priority; the stable sort preserves first-appearance
        // order between ties.
        let mut ranked: Vec<usize> = (0..colors.len()).collect();
        ranked.sort_by(|&a, &b| {
            priority(&colors[b])
                .partial_cmp(&priority(&colors[a]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let permanent_count = total_slots.saturating_sub(1) as usize;
        let permanent: Vec<usize> = ranked[..permanent_count].to_vec();

        // Shared colors keep first-appearance order (the order of `colors`).
        let shared: Vec<&Color> = colors
            .iter()
            .enumerate()
            .filter(|(index, _)| !permanent.contains(index))
            .map(|(_, color)| color)
            .collect();

        let mut assignments: Vec<SlotAssignment> = permanent
            .iter()
            .enumerate()
            .map(|(flat, &index)| {
                let (unit, slot) = config.locate(flat as u32);
                SlotAssignment::permanent(unit, slot, colors[index].id.clone())
            })
            .collect();
        let (shared_unit, shared_slot) = config.locate(total_slots - 1);
        assignments.push(SlotAssignment::shared(
            shared_unit,
            shared_slot,
            shared.iter().map(|c| c.id.clone()).collect(),
        ));

        let mut swaps = Vec::new();
        for pair in shared.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let optimal = to.first_layer;
            // The window opens when the outgoing color finishes; an
            // overlapping pair collapses the window to the optimal layer.
            let earliest = (from.last_layer + 1).min(optimal);
            let latest = optimal;
            let window = latest - earliest;
            let flexibility =
                (window.saturating_mul(FLEXIBILITY_PER_LAYER)).min(100) as u8;
            let swap = ManualSwap {
                unit: shared_unit,
                slot: shared_slot,
                from: from.id.clone(),
                to: to.id.clone(),
                at_layer: optimal,
                earliest_layer: earliest,
                latest_layer: latest,
                pause_start: optimal.saturating_sub(1),
                pause_end: optimal,
                z: layer_z(stats, optimal),
                reason: format!("color {} starts at layer {}", to.id, optimal),
                flexibility,
                confidence: SwapConfidence {
                    timing: 50 + flexibility / 2,
                    necessity: 100,
                    user_control: flexibility,
                },
            };
            debug!(
                target: "optimizer",
                from = %swap.from,
                to = %swap.to,
                at = swap.at_layer,
                window,
                "manual_swap"
            );
            swaps.push(swap);
        }
        swaps.sort_by_key(|swap| swap.at_layer);

        let estimated_time_saved_secs = swaps.len() as u64 * self.seconds_per_swap;
        OptimizationResult {
            assignments,
            swaps,
            total_slots,
            required_slots,
            estimated_time_saved_secs,
            shared_pairs,
            configuration: *config,
        }
    }
}
