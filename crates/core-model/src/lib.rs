//! Shared data model for the analysis pipeline.
//!
//! Every other crate in the workspace consumes these types; none of them are
//! defined twice. The model is deliberately engine-free: construction and
//! mutation policies live with the components that own them (the parser
//! builds a [`GcodeStats`], the merge engine is the only mutator of
//! [`Color`] sets, the timeline exclusively owns its snapshots).
//!
//! Core invariants (must hold for every value handed across a crate
//! boundary):
//! * `Color::first_layer <= Color::last_layer` and
//!   `layers_used ⊆ [0, total_layers)`.
//! * `GcodeStats::layer_color_map` keys are 0-based; `total_layers` is
//!   `1 + max_key` (the parser normalizes 1-based inputs before the stats
//!   value exists).
//! * Every color id in `GcodeStats::colors` appears on at least one layer
//!   of `layer_color_map`.
//! * `ManualSwap::earliest_layer <= at_layer <= latest_layer`.
//! * `MergeTimeline::current < snapshots.len()` and every id in every
//!   branch list names an element of `snapshots`.
//!
//! All public documents serialize with serde; sets come out as sorted
//! arrays and the layer map as a key-sorted map. Layer indices stay
//! 0-based in the serialized form; shifting to 1-based for humans is a
//! presentation concern.

mod algorithm;
mod color;
mod constraint;
mod optimize;
mod snapshot;
mod stats;
mod system;
mod tool;

pub use algorithm::ParserAlgorithm;
pub use color::{Color, ColorRange, hex_to_rgb, normalize_hex};
pub use constraint::{
    ConstraintValidation, ConstraintViolation, MergeSuggestion, ValidationSummary,
};
pub use optimize::{
    ManualSwap, OptimizationResult, SharedPair, SlotAssignment, SwapConfidence,
};
pub use snapshot::{MergeInfo, MergeTimeline, SnapshotId, StateSnapshot};
pub use stats::{
    BoundingBoxObject, BundleManifest, DeduplicationInfo, FilamentEstimate, GcodeStats,
    LayerDetail, SlicerInfo, ToolChange, UsageBreakdown,
};
pub use system::{SystemConfiguration, SystemKind};
pub use tool::ToolId;
