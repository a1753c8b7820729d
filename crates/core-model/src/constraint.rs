use crate::tool::ToolId;
use serde::{Deserialize, Serialize};

/// Candidate merge that would reduce a layer's simultaneous color count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSuggestion {
    pub first: ToolId,
    pub second: ToolId,
    /// Union of the pair's used layers; smaller means less visual impact.
    pub combined_layers: usize,
}

/// A layer whose simultaneous color count exceeds the slot count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub layer: u32,
    pub colors: Vec<ToolId>,
    /// Minimum merges needed to bring this layer within the slot budget.
    pub required_merges: u32,
    pub suggestions: Vec<MergeSuggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub impossible_layers: u32,
    pub first_violation: u32,
    pub last_violation: u32,
    pub worst_simultaneous: u32,
}

/// Result of checking layer-level simultaneity against the slot budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintValidation {
    pub has_violations: bool,
    pub violations: Vec<ConstraintViolation>,
    pub summary: Option<ValidationSummary>,
}

impl ConstraintValidation {
    pub fn clean() -> Self {
        Self::default()
    }
}
