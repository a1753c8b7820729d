//! Layer-level simultaneity validation.
//!
//! A layer violates iff its simultaneously-active color count exceeds the
//! slot count. Suggestions pair the violating layer's colors by smallest
//! combined coverage, since folding two rarely-used colors costs the least
//! visual fidelity.

use core_model::{
    ConstraintValidation, ConstraintViolation, GcodeStats, MergeSuggestion, ValidationSummary,
};
use tracing::debug;

/// Suggestions emitted per violating layer.
const MAX_SUGGESTIONS: usize = 3;

pub fn validate(stats: &GcodeStats, total_slots: u32) -> ConstraintValidation {
    let mut violations = Vec::new();
    for (&layer, tools) in &stats.layer_color_map {
        let simultaneous = tools.len();
        if simultaneous <= total_slots as usize {
            continue;
        }
        let required_merges = (simultaneous - total_slots as usize) as u32;

        let mut suggestions = Vec::new();
        for (i, a) in tools.iter().enumerate() {
            for b in &tools[i + 1..] {
                let combined = match (stats.color(a), stats.color(b)) {
                    (Some(ca), Some(cb)) => ca.layers_used.union(&cb.layers_used).count(),
                    _ => usize::MAX,
                };
                suggestions.push(MergeSuggestion {
                    first: a.clone(),
                    second: b.clone(),
                    combined_layers: combined,
                });
            }
        }
        suggestions.sort_by_key(|s| s.combined_layers);
        suggestions.truncate(MAX_SUGGESTIONS);

        debug!(
            target: "optimizer",
            layer,
            simultaneous,
            total_slots,
            required_merges,
            "constraint_violation"
        );
        violations.push(ConstraintViolation {
            layer,
            colors: tools.clone(),
            required_merges,
            suggestions,
        });
    }

    if violations.is_empty() {
        return ConstraintValidation::clean();
    }
    let summary = ValidationSummary {
        impossible_layers: violations.len() as u32,
        first_violation: violations.first().map(|v| v.layer).unwrap_or(0),
        last_violation: violations.last().map(|v| v.layer).unwrap_or(0),
        worst_simultaneous: violations
            .iter()
            .map(|v| v.colors.len() as u32)
            .max()
            .unwrap_or(0),
    };
    ConstraintValidation {
        has_violations: true,
        violations,
        summary: Some(summary),
    }
}
