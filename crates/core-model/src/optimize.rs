use crate::system::SystemConfiguration;
use crate::tool::ToolId;
use serde::{Deserialize, Serialize};

/// One hardware slot and the color(s) it will hold over the print.
///
/// A slot is either permanent (one pinned color for the whole print) or
/// shared (a sequence of colors installed one after another via manual
/// swaps). A slot holding exactly one color is always permanent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub unit: u32,
    pub slot: u32,
    /// Composite id, `u{unit}s{slot}`.
    pub id: String,
    /// Install order for shared slots; single element for permanent ones.
    pub colors: Vec<ToolId>,
    pub is_permanent: bool,
}

impl SlotAssignment {
    pub fn permanent(unit: u32, slot: u32, color: ToolId) -> Self {
        Self {
            id: Self::slot_id(unit, slot),
            unit,
            slot,
            colors: vec![color],
            is_permanent: true,
        }
    }

    pub fn shared(unit: u32, slot: u32, colors: Vec<ToolId>) -> Self {
        let is_permanent = colors.len() <= 1;
        Self {
            id: Self::slot_id(unit, slot),
            unit,
            slot,
            colors,
            is_permanent,
        }
    }

    pub fn slot_id(unit: u32, slot: u32) -> String {
        format!("u{unit}s{slot}")
    }
}

/// Operator confidence triple attached to every manual swap, each 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapConfidence {
    /// How tight the timing window is.
    pub timing: u8,
    /// Whether the swap can be avoided at all (100 for shared slots).
    pub necessity: u8,
    /// How much latitude the user has in choosing the moment.
    pub user_control: u8,
}

/// A scheduled mid-print filament change at one slot.
///
/// Window invariant: `earliest_layer <= at_layer <= latest_layer`, and the
/// window is contained in the gap between the predecessor's last layer and
/// the successor's first layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualSwap {
    pub unit: u32,
    pub slot: u32,
    pub from: ToolId,
    pub to: ToolId,
    /// Optimal execution layer (the incoming color's first layer).
    pub at_layer: u32,
    pub earliest_layer: u32,
    pub latest_layer: u32,
    pub pause_start: u32,
    pub pause_end: u32,
    /// Z height at the optimal layer, when known.
    pub z: Option<f64>,
    pub reason: String,
    /// 0–100; wider windows score higher.
    pub flexibility: u8,
    pub confidence: SwapConfidence,
}

/// Two colors whose layer ranges never overlap, meaning they could share a
/// slot without an extra swap window conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPair {
    pub first: ToolId,
    pub second: ToolId,
}

/// Output of a slot-optimization run. Always produced; infeasibility shows
/// up as constraint violations, never as an optimizer error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub assignments: Vec<SlotAssignment>,
    /// Ordered by optimal layer.
    pub swaps: Vec<ManualSwap>,
    pub total_slots: u32,
    /// `min(|colors|, total_slots)`.
    pub required_slots: u32,
    /// Heuristic: swap count × configured seconds per swap.
    pub estimated_time_saved_secs: u64,
    pub shared_pairs: Vec<SharedPair>,
    pub configuration: SystemConfiguration,
}

impl OptimizationResult {
    /// Empty result for a stats value with no colors at all.
    pub fn empty(configuration: SystemConfiguration) -> Self {
        Self {
            assignments: Vec::new(),
            swaps: Vec::new(),
            total_slots: configuration.total_slots(),
            required_slots: 0,
            estimated_time_saved_secs: 0,
            shared_pairs: Vec::new(),
            configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_color_slot_is_permanent() {
        let a = SlotAssignment::shared(0, 2, vec![ToolId::from_index(4)]);
        assert!(a.is_permanent);
        assert_eq!(a.id, "u0s2");
    }

    #[test]
    fn multi_color_slot_is_shared() {
        let a = SlotAssignment::shared(1, 3, vec![ToolId::from_index(4), ToolId::from_index(5)]);
        assert!(!a.is_permanent);
        assert_eq!(a.id, "u1s3");
    }
}
