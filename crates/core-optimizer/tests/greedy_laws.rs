//! Optimization totals and constraint completeness over synthetic stats.

use core_model::{
    Color, GcodeStats, SystemConfiguration, ToolId,
};
use core_optimizer::{GreedyStrategy, OptimizationStrategy, analyze, validate};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn color(index: u32, first: u32, last: u32, total: u32) -> Color {
    let layers: BTreeSet<u32> = (first..=last).collect();
    Color {
        id: ToolId::from_index(index),
        name: format!("T{index}"),
        hex: None,
        first_layer: first,
        last_layer: last,
        layers_used: layers,
        partial_layers: BTreeSet::new(),
        total_layers: total,
    }
}

/// Synthetic stats whose layer map mirrors the colors' used layers.
fn stats_from_colors(colors: Vec<Color>, total: u32) -> GcodeStats {
    let mut layer_color_map: BTreeMap<u32, Vec<ToolId>> = BTreeMap::new();
    for layer in 0..total {
        let mut tools = Vec::new();
        for c in &colors {
            if c.layers_used.contains(&layer) {
                tools.push(c.id.clone());
            }
        }
        if !tools.is_empty() {
            layer_color_map.insert(layer, tools);
        }
    }
    GcodeStats {
        file_name: "synthetic.gcode".into(),
        total_layers: total,
        colors,
        layer_color_map,
        ..Default::default()
    }
}

fn six_colors_on_hundred_layers() -> GcodeStats {
    stats_from_colors(
        vec![
            color(0, 0, 99, 100),
            color(1, 0, 99, 100),
            color(2, 0, 89, 100),
            color(3, 10, 29, 100),
            color(4, 40, 59, 100),
            color(5, 70, 95, 100),
        ],
        100,
    )
}

#[test]
fn six_colors_four_slots_three_permanent_one_shared() {
    let stats = six_colors_on_hundred_layers();
    let config = SystemConfiguration::magazine(1, 4);
    let result = GreedyStrategy::default().optimize(&stats, &config);

    assert_eq!(result.total_slots, 4);
    assert_eq!(result.required_slots, 4);
    assert_eq!(result.assignments.len(), 4);

    let permanent: Vec<_> = result
        .assignments
        .iter()
        .filter(|a| a.is_permanent)
        .collect();
    assert_eq!(permanent.len(), 3);
    let permanent_ids: BTreeSet<_> = permanent
        .iter()
        .flat_map(|a| a.colors.iter().cloned())
        .collect();
    assert!(permanent_ids.contains(&ToolId::from_index(0)));
    assert!(permanent_ids.contains(&ToolId::from_index(1)));
    assert!(permanent_ids.contains(&ToolId::from_index(2)));

    let shared = result
        .assignments
        .iter()
        .find(|a| !a.is_permanent)
        .expect("one shared slot");
    assert_eq!(
        shared.colors,
        vec![
            ToolId::from_index(3),
            ToolId::from_index(4),
            ToolId::from_index(5)
        ],
        "shared sequence keeps first-appearance order"
    );

    assert_eq!(result.swaps.len(), 2);
    let first = &result.swaps[0];
    assert_eq!(first.at_layer, 40);
    assert_eq!(first.earliest_layer, 30, "opens after T3 finishes at 29");
    assert_eq!(first.latest_layer, 40);
    let second = &result.swaps[1];
    assert_eq!(second.at_layer, 70);
    assert_eq!(second.earliest_layer, 60);
    assert!(first.earliest_layer <= first.at_layer && first.at_layer <= first.latest_layer);
    assert_eq!(result.estimated_time_saved_secs, 2 * 120);
}

#[test]
fn everything_fits_means_no_swaps() {
    let stats = stats_from_colors(
        vec![color(0, 0, 9, 10), color(1, 2, 9, 10)],
        10,
    );
    let config = SystemConfiguration::magazine(1, 4);
    let result = GreedyStrategy::default().optimize(&stats, &config);
    assert_eq!(result.assignments.len(), 2);
    assert!(result.assignments.iter().all(|a| a.is_permanent));
    assert!(result.swaps.is_empty());
    assert_eq!(result.estimated_time_saved_secs, 0);
    assert_eq!(result.required_slots, 2);
}

#[test]
fn single_slot_swaps_every_following_color() {
    let stats = stats_from_colors(
        vec![color(0, 0, 9, 30), color(1, 10, 19, 30), color(2, 20, 29, 30)],
        30,
    );
    let config = SystemConfiguration::magazine(1, 1);
    let result = GreedyStrategy::default().optimize(&stats, &config);
    assert_eq!(result.assignments.len(), 1);
    assert!(!result.assignments[0].is_permanent);
    assert_eq!(result.swaps.len(), 2);
    assert_eq!(result.swaps[0].at_layer, 10);
    assert_eq!(result.swaps[1].at_layer, 20);
}

#[test]
fn overlapping_shared_colors_collapse_the_window() {
    // T4 starts before T3 ends; the window degenerates to the optimal
    // layer instead of inverting.
    let stats = stats_from_colors(
        vec![
            color(0, 0, 99, 100),
            color(1, 0, 99, 100),
            color(2, 0, 99, 100),
            color(3, 10, 50, 100),
            color(4, 40, 80, 100),
        ],
        100,
    );
    let config = SystemConfiguration::magazine(1, 4);
    let result = GreedyStrategy::default().optimize(&stats, &config);
    let swap = &result.swaps[0];
    assert_eq!(swap.at_layer, 40);
    assert_eq!(swap.earliest_layer, 40);
    assert_eq!(swap.latest_layer, 40);
    assert_eq!(swap.flexibility, 0);
    assert!(swap.earliest_layer <= swap.at_layer && swap.at_layer <= swap.latest_layer);
}

#[test]
fn toolhead_configuration_counts_units_as_slots() {
    let stats = six_colors_on_hundred_layers();
    let config = SystemConfiguration::toolhead(2);
    let result = GreedyStrategy::default().optimize(&stats, &config);
    assert_eq!(result.total_slots, 2);
    // 1 permanent + 5 shared on the second tool head.
    assert_eq!(result.swaps.len(), 4);
}

#[test]
fn shareable_pairs_require_disjoint_spans() {
    let stats = six_colors_on_hundred_layers();
    let config = SystemConfiguration::magazine(1, 4);
    let result = GreedyStrategy::default().optimize(&stats, &config);
    for pair in &result.shared_pairs {
        let a = stats.color(&pair.first).unwrap();
        let b = stats.color(&pair.second).unwrap();
        assert!(a.last_layer < b.first_layer || b.last_layer < a.first_layer);
    }
    // T3/T4, T3/T5, T4/T5 are the disjoint pairs here.
    assert_eq!(result.shared_pairs.len(), 3);
}

#[test]
fn validator_flags_exactly_the_overfull_layers() {
    let stats = stats_from_colors(
        vec![
            color(0, 0, 9, 10),
            color(1, 0, 9, 10),
            color(2, 3, 6, 10),
        ],
        10,
    );
    let validation = validate(&stats, 2);
    assert!(validation.has_violations);
    let layers: Vec<u32> = validation.violations.iter().map(|v| v.layer).collect();
    assert_eq!(layers, vec![3, 4, 5, 6]);
    let summary = validation.summary.unwrap();
    assert_eq!(summary.impossible_layers, 4);
    assert_eq!(summary.first_violation, 3);
    assert_eq!(summary.last_violation, 6);
    assert_eq!(summary.worst_simultaneous, 3);
    assert_eq!(validation.violations[0].required_merges, 1);
    assert!(!validation.violations[0].suggestions.is_empty());
}

#[test]
fn analyze_couples_result_and_validation() {
    let stats = six_colors_on_hundred_layers();
    let config = SystemConfiguration::magazine(1, 4);
    let strategy = GreedyStrategy::default();
    let (result, validation) = analyze(&stats, &config, &strategy);
    assert_eq!(result.swaps.len(), 2);
    // No layer of this fixture holds more than four simultaneous colors.
    assert!(!validation.has_violations);
}

#[test]
fn parsed_file_end_to_end() {
    // Three tools accumulate; from layer 2 on, all three are active.
    let text = "\
;LAYER:0
G1 Z0.2 E1
;LAYER:1
T1
;LAYER:2
T2
;LAYER:3
;LAYER:4
";
    let stats = core_parser::GcodeParser::default()
        .parse_str(text, "accumulate.gcode")
        .unwrap();
    let config = SystemConfiguration::magazine(1, 2);
    let strategy = GreedyStrategy::default();
    let (result, validation) = analyze(&stats, &config, &strategy);

    // Three colors on two slots: one permanent, two shared, one swap.
    assert_eq!(result.required_slots, 2);
    assert_eq!(result.swaps.len(), 1);
    // Layers 2..=4 hold three simultaneous colors against two slots.
    let layers: Vec<u32> = validation.violations.iter().map(|v| v.layer).collect();
    assert_eq!(layers, vec![2, 3, 4]);
    assert!(
        validation.violations[0]
            .suggestions
            .iter()
            .all(|s| s.combined_layers <= stats.total_layers as usize)
    );
}

proptest! {
    #[test]
    fn totals_law_holds(
        spans in prop::collection::vec((0u32..40, 1u32..20), 1..9),
        slots in 1u32..6,
    ) {
        let total = 64u32;
        let colors: Vec<Color> = spans
            .iter()
            .enumerate()
            .map(|(i, (first, len))| {
                let last = (first + len).min(total - 1);
                color(i as u32, *first, last, total)
            })
            .collect();
        let count = colors.len() as u32;
        let stats = stats_from_colors(colors, total);
        let config = SystemConfiguration::magazine(1, slots);
        let result = GreedyStrategy::default().optimize(&stats, &config);

        prop_assert_eq!(result.required_slots, count.min(slots));
        prop_assert!(result.swaps.len() as u32 >= count.saturating_sub(slots));
        for swap in &result.swaps {
            let to = stats.color(&swap.to).unwrap();
            prop_assert_eq!(swap.at_layer, to.first_layer);
            prop_assert!(swap.earliest_layer <= swap.at_layer);
            prop_assert!(swap.at_layer <= swap.latest_layer);
        }
        let permanent = result.assignments.iter().filter(|a| a.is_permanent).count() as u32;
        prop_assert!(permanent <= slots);
    }

    #[test]
    fn constraint_completeness(
        spans in prop::collection::vec((0u32..30, 1u32..30), 1..8),
        slots in 1u32..5,
    ) {
        let total = 60u32;
        let colors: Vec<Color> = spans
            .iter()
            .enumerate()
            .map(|(i, (first, len))| {
                let last = (first + len).min(total - 1);
                color(i as u32, *first, last, total)
            })
            .collect();
        let stats = stats_from_colors(colors, total);
        let validation = validate(&stats, slots);
        for (layer, tools) in &stats.layer_color_map {
            let violated = validation.violations.iter().any(|v| v.layer == *layer);
            prop_assert_eq!(
                violated,
                tools.len() > slots as usize,
                "layer {} with {} colors, {} slots",
                layer, tools.len(), slots
            );
        }
        prop_assert_eq!(validation.has_violations, !validation.violations.is_empty());
    }
}
