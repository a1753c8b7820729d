//! Layer/tool state machine.
//!
//! At all times the machine tracks the current layer (0-based internal),
//! the current tool, the maximum Z, and the ordered set of active tools.
//! The load-bearing rule is accumulation: a tool that deposited material
//! on a layer and was never explicitly removed contributes to every
//! subsequent layer until the end of the print. On every layer transition
//! the whole active set is carried forward into the new layer's color
//! list, preserving activation order.
//!
//! Invariants:
//! * layer 0 exists before any input is consumed, seeded with `T0`
//!   (one-layer fallback for files without markers);
//! * `active_tools` only grows;
//! * `layer_color_map` lists hold no duplicates and preserve activation
//!   order;
//! * the numbering base is decided exactly once, at the first marker seen
//!   (`1` ⇒ 1-based, anything else ⇒ 0-based).
//!
//! The `T0` seed is provisional: a file that opens with `T3` never
//! deposited `T0` material, so the first explicit tool select replaces the
//! seed iff it happens while still on layer 0 and `T0` was not confirmed
//! by an explicit `T0` or an extruding move. After the first layer
//! transition the seed is permanent.

use crate::metadata::MetaEvent;
use crate::tokenizer::{LineEvent, MarkerEvent, classify};
use core_model::{ToolChange, ToolId, UsageBreakdown};
use std::collections::BTreeMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberingBase {
    ZeroBased,
    OneBased,
}

/// Metadata accumulated while scanning; folded into the stats by the
/// finalizer.
#[derive(Debug, Clone, Default)]
pub struct MetadataAcc {
    pub slicer_software: Option<String>,
    pub slicer_version: Option<String>,
    pub color_defs: Vec<String>,
    pub declared_total_layers: Option<u32>,
    pub print_time_raw: Option<String>,
    pub print_time_seconds: Option<u64>,
    pub costs: Vec<f64>,
    pub weights_per_tool: Vec<f64>,
    pub lengths_per_tool: Vec<f64>,
    pub usage: UsageBreakdown,
}

impl MetadataAcc {
    fn absorb(&mut self, event: MetaEvent) {
        match event {
            MetaEvent::ColorDefs(defs) => {
                debug!(target: "parser.meta", count = defs.len(), "color_definitions");
                self.color_defs = defs;
            }
            MetaEvent::Banner { software, version } => {
                debug!(target: "parser.meta", software = %software, "slicer_banner");
                self.slicer_software = Some(software);
                self.slicer_version = version;
            }
            MetaEvent::PrintTime { raw, seconds } => {
                self.print_time_raw = Some(raw);
                self.print_time_seconds = seconds;
            }
            MetaEvent::Costs(costs) => self.costs = costs,
            MetaEvent::WeightsPerTool(weights) => self.weights_per_tool = weights,
            MetaEvent::LengthsPerTool(lengths) => self.lengths_per_tool = lengths,
            MetaEvent::DetailedUsage {
                total_g,
                model_g,
                support_g,
            } => {
                self.usage.total_g = Some(total_g);
                self.usage.model_g = Some(model_g);
                self.usage.support_g = Some(support_g);
            }
            MetaEvent::Flushed(g) => self.usage.flushed_g = Some(g),
            MetaEvent::WipeTower(g) => self.usage.tower_g = Some(g),
        }
    }
}

/// Raw machine output handed to the statistics finalizer.
#[derive(Debug)]
pub struct RawParse {
    pub layer_color_map: BTreeMap<u32, Vec<ToolId>>,
    pub tool_changes: Vec<ToolChange>,
    /// Finalized per-layer change lists.
    pub layer_changes: BTreeMap<u32, Vec<ToolChange>>,
    /// Tool selected when each layer ended.
    pub layer_primary: BTreeMap<u32, ToolId>,
    /// Activation order with first-seen layer.
    pub first_seen: Vec<(ToolId, u32)>,
    pub last_seen: BTreeMap<ToolId, u32>,
    /// First Z observed within each layer.
    pub layer_z: BTreeMap<u32, f64>,
    pub total_height: f64,
    pub numbering_base: NumberingBase,
    pub meta: MetadataAcc,
    pub warnings: Vec<String>,
    pub lines: usize,
}

#[derive(Debug)]
pub struct MachineState {
    line_no: usize,
    current_layer: u32,
    current_tool: ToolId,
    current_z: Option<f64>,
    active_tools: Vec<ToolId>,
    layer_color_map: BTreeMap<u32, Vec<ToolId>>,
    tool_changes: Vec<ToolChange>,
    pending_layer_changes: Vec<ToolChange>,
    layer_changes: BTreeMap<u32, Vec<ToolChange>>,
    layer_primary: BTreeMap<u32, ToolId>,
    first_seen: Vec<(ToolId, u32)>,
    last_seen: BTreeMap<ToolId, u32>,
    layer_z: BTreeMap<u32, f64>,
    base: Option<NumberingBase>,
    seed_provisional: bool,
    meta: MetadataAcc,
    warnings: Vec<String>,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineState {
    pub fn new() -> Self {
        let seed = ToolId::from_index(0);
        let mut layer_color_map = BTreeMap::new();
        layer_color_map.insert(0, vec![seed.clone()]);
        let mut last_seen = BTreeMap::new();
        last_seen.insert(seed.clone(), 0);
        Self {
            line_no: 0,
            current_layer: 0,
            current_tool: seed.clone(),
            current_z: None,
            active_tools: vec![seed.clone()],
            layer_color_map,
            tool_changes: Vec::new(),
            pending_layer_changes: Vec::new(),
            layer_changes: BTreeMap::new(),
            layer_primary: BTreeMap::new(),
            first_seen: vec![(seed, 0)],
            last_seen,
            layer_z: BTreeMap::new(),
            base: None,
            seed_provisional: true,
            meta: MetadataAcc::default(),
            warnings: Vec::new(),
        }
    }

    pub fn current_layer(&self) -> u32 {
        self.current_layer
    }

    pub fn lines_fed(&self) -> usize {
        self.line_no
    }

    /// Feed one raw line. Every line advances the line counter, matched or
    /// not, so `ToolChange::line` is stable across parser variants.
    pub fn feed_line(&mut self, raw: &str) {
        self.line_no += 1;
        if let Some(event) = classify(raw) {
            let line = self.line_no;
            self.apply_at(event, line);
        }
    }

    /// Advance the line counter for a line already known to carry no
    /// event (regex-prefiltered).
    pub fn skip_line(&mut self) {
        self.line_no += 1;
    }

    /// Apply a pre-classified event at an explicit line number. Used by the
    /// worker variant's ordered replay; `feed_line` is the single-threaded
    /// path.
    pub fn apply_at(&mut self, event: LineEvent, line: usize) {
        match event {
            LineEvent::ToolSelect(index) => self.on_tool_select(index, line),
            LineEvent::Move { z, extrudes } => self.on_move(z, extrudes),
            LineEvent::FilamentChange => {
                let warning = format!("M600 at layer {} (line {line})", self.current_layer);
                debug!(target: "parser", layer = self.current_layer, line, "m600");
                self.warnings.push(warning);
            }
            LineEvent::Marker(marker) => self.on_marker(marker),
            LineEvent::Meta(meta) => self.meta.absorb(meta),
        }
    }

    /// Bump the line counter for lines the worker variant already knows
    /// carry no event.
    pub fn set_line_count(&mut self, lines: usize) {
        self.line_no = lines;
    }

    fn on_move(&mut self, z: Option<f64>, extrudes: bool) {
        if extrudes {
            // Deposition confirms the tool currently loaded, including the
            // layer-0 seed.
            self.seed_provisional = false;
        }
        if let Some(z) = z {
            self.current_z = Some(self.current_z.map_or(z, |cur| cur.max(z)));
            self.layer_z.entry(self.current_layer).or_insert(z);
        }
    }

    fn on_tool_select(&mut self, index: u32, line: usize) {
        let tool = ToolId::from_index(index);
        if tool == self.current_tool {
            self.seed_provisional = false;
            return;
        }

        if self.seed_provisional && self.current_layer == 0 && self.tool_changes.is_empty() {
            // First identified tool of the print replaces the phantom seed.
            let seed = self.current_tool.clone();
            trace!(target: "parser", from = %seed, to = %tool, "seed_replaced");
            if let Some(list) = self.layer_color_map.get_mut(&0) {
                list.retain(|t| t != &seed);
                list.push(tool.clone());
            }
            self.active_tools = vec![tool.clone()];
            self.first_seen = vec![(tool.clone(), 0)];
            self.last_seen.remove(&seed);
            self.last_seen.insert(tool.clone(), 0);
            self.current_tool = tool;
            self.seed_provisional = false;
            return;
        }
        self.seed_provisional = false;

        let change = ToolChange {
            from: self.current_tool.clone(),
            to: tool.clone(),
            layer: self.current_layer,
            line,
            z: self.current_z,
        };
        trace!(
            target: "parser",
            from = %change.from,
            to = %change.to,
            layer = change.layer,
            line,
            "tool_change"
        );
        self.tool_changes.push(change.clone());
        self.pending_layer_changes.push(change);
        self.current_tool = tool.clone();

        if !self.active_tools.contains(&tool) {
            self.active_tools.push(tool.clone());
        }
        let list = self
            .layer_color_map
            .entry(self.current_layer)
            .or_default();
        if !list.contains(&tool) {
            list.push(tool.clone());
        }
        if !self.first_seen.iter().any(|(t, _)| t == &tool) {
            self.first_seen.push((tool.clone(), self.current_layer));
        }
        let last = self.last_seen.entry(tool).or_insert(self.current_layer);
        *last = (*last).max(self.current_layer);
    }

    fn on_marker(&mut self, marker: MarkerEvent) {
        if let Some(total) = marker.declared_total {
            let declared = self.meta.declared_total_layers.get_or_insert(total);
            *declared = (*declared).max(total);
        }

        let base = *self.base.get_or_insert_with(|| {
            let detected = if marker.raw == 1 {
                NumberingBase::OneBased
            } else {
                NumberingBase::ZeroBased
            };
            debug!(target: "parser", first_marker = marker.raw, ?detected, "numbering_base");
            detected
        });
        let internal = match base {
            NumberingBase::OneBased => marker.raw.saturating_sub(1),
            NumberingBase::ZeroBased => marker.raw,
        };
        if internal != self.current_layer {
            self.transition_to(internal);
        }
    }

    fn transition_to(&mut self, new_layer: u32) {
        trace!(
            target: "parser",
            from = self.current_layer,
            to = new_layer,
            active = self.active_tools.len(),
            "layer_transition"
        );
        // Finalize the layer being left.
        self.layer_primary
            .insert(self.current_layer, self.current_tool.clone());
        let pending = std::mem::take(&mut self.pending_layer_changes);
        if !pending.is_empty() {
            self.layer_changes.insert(self.current_layer, pending);
        }
        self.seed_provisional = false;
        self.current_layer = new_layer;

        // Accumulation: the whole active set carries into the new layer.
        let list = self.layer_color_map.entry(new_layer).or_default();
        for tool in &self.active_tools {
            if !list.contains(tool) {
                list.push(tool.clone());
            }
            let last = self.last_seen.entry(tool.clone()).or_insert(new_layer);
            *last = (*last).max(new_layer);
        }
    }

    /// Finalize the trailing layer and hand everything to the finalizer.
    pub fn finish(mut self) -> RawParse {
        self.layer_primary
            .insert(self.current_layer, self.current_tool.clone());
        let pending = std::mem::take(&mut self.pending_layer_changes);
        if !pending.is_empty() {
            self.layer_changes.insert(self.current_layer, pending);
        }
        RawParse {
            layer_color_map: self.layer_color_map,
            tool_changes: self.tool_changes,
            layer_changes: self.layer_changes,
            layer_primary: self.layer_primary,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            layer_z: self.layer_z,
            total_height: self.current_z.unwrap_or(0.0),
            numbering_base: self.base.unwrap_or(NumberingBase::ZeroBased),
            meta: self.meta,
            warnings: self.warnings,
            lines: self.line_no,
        }
    }
}
