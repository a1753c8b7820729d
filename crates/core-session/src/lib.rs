//! Root coordinator owning the analysis state.
//!
//! `AnalysisSession` is the single owner of the authoritative stats,
//! optimization, validation, timeline, and event bus. Consumers read
//! through accessors and mutate through commands; events are emitted only
//! after state has settled, so a subscriber never observes a half-applied
//! mutation. Internal components receive handles (the bus) or values,
//! never `&mut` into the session.

use core_bundle::parse_any;
use core_config::Config;
use core_events::{AnalysisEvent, EventBus, Subscription};
use core_merge::{MergeError, merge_colors};
use core_model::{
    ConstraintValidation, GcodeStats, OptimizationResult, ParserAlgorithm, SnapshotId,
    StateSnapshot, SystemConfiguration, ToolId,
};
use core_optimizer::{StrategyRegistry, analyze};
use core_parser::{CancelToken, GcodeParser, ParseError};
use core_timeline::{TimelineManager, TimelineStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("no analysis loaded")]
    NoAnalysis,
    #[error("unknown optimization strategy {0}")]
    UnknownStrategy(String),
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct AnalysisSession {
    bus: EventBus,
    parser_algorithm: ParserAlgorithm,
    system: SystemConfiguration,
    strategy_name: String,
    registry: StrategyRegistry,
    cancel: CancelToken,
    timeline: TimelineManager,
    stats: Option<GcodeStats>,
    optimization: Option<OptimizationResult>,
    validation: Option<ConstraintValidation>,
}

impl AnalysisSession {
    pub fn new(config: &Config) -> Self {
        Self {
            bus: EventBus::new(),
            parser_algorithm: config.file.parser.algorithm,
            system: config.system_configuration(),
            strategy_name: config.file.optimizer.algorithm.clone(),
            registry: StrategyRegistry::with_builtins(config.file.optimizer.seconds_per_swap),
            cancel: CancelToken::new(),
            timeline: TimelineManager::new(config.file.timeline.max_history),
            stats: None,
            optimization: None,
            validation: None,
        }
    }

    /// Attach timeline persistence (injected key/value store).
    pub fn with_store(
        mut self,
        config: &Config,
        store: Arc<dyn TimelineStore>,
        key: impl Into<String>,
    ) -> Self {
        self.timeline = TimelineManager::new(config.file.timeline.max_history).with_store(
            store,
            key,
            Duration::from_millis(config.file.timeline.save_debounce_ms),
        );
        self
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Cheap clone sharing the same subscriber registry.
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Option<&GcodeStats> {
        self.stats.as_ref()
    }

    pub fn optimization(&self) -> Option<&OptimizationResult> {
        self.optimization.as_ref()
    }

    pub fn validation(&self) -> Option<&ConstraintValidation> {
        self.validation.as_ref()
    }

    pub fn timeline(&self) -> &TimelineManager {
        &self.timeline
    }

    /// Read, parse (bundle-aware), optimize, validate, and seed the
    /// timeline from a file on disk.
    pub fn analyze_path(&mut self, path: &Path) -> Result<&GcodeStats, SessionError> {
        let bytes = std::fs::read(path).map_err(|source| SessionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.analyze_bytes(&bytes, &name)
    }

    /// Same as [`analyze_path`](Self::analyze_path) over in-memory bytes.
    pub fn analyze_bytes(
        &mut self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<&GcodeStats, SessionError> {
        self.bus.emit(AnalysisEvent::ParseStarted {
            file_name: file_name.to_string(),
        });
        let progress_bus = self.bus.clone();
        let mut parser = GcodeParser::new(self.parser_algorithm)
            .with_cancel(self.cancel.clone())
            .on_progress(move |p| progress_bus.emit(AnalysisEvent::ParseProgress(p)));
        let stats = parse_any(&mut parser, bytes, file_name)?;
        self.bus.emit(AnalysisEvent::ParseCompleted {
            file_name: file_name.to_string(),
            total_layers: stats.total_layers,
            color_count: stats.colors.len(),
            parse_time_ms: stats.parse_time_ms.unwrap_or(0),
        });

        let (optimization, validation) = self.run_optimizer(&stats)?;
        let snapshot = self.timeline.add_initial(
            stats.clone(),
            optimization.clone(),
            validation.clone(),
        );
        self.emit_timeline_changed(snapshot);

        self.stats = Some(stats);
        self.optimization = Some(optimization);
        self.validation = Some(validation);
        info!(target: "session", file = file_name, "analysis_ready");
        Ok(self.stats.as_ref().expect("just set"))
    }

    /// Re-run the optimizer, optionally under a different hardware
    /// configuration. Does not snapshot; only merges commit to history.
    pub fn reoptimize(
        &mut self,
        system: Option<SystemConfiguration>,
    ) -> Result<&OptimizationResult, SessionError> {
        if let Some(system) = system {
            self.system = system;
        }
        let stats = self.stats.as_ref().ok_or(SessionError::NoAnalysis)?.clone();
        let (optimization, validation) = self.run_optimizer(&stats)?;
        self.optimization = Some(optimization);
        self.validation = Some(validation);
        Ok(self.optimization.as_ref().expect("just set"))
    }

    /// Fold `sources` into `target`, re-optimize, and commit a snapshot.
    pub fn merge(
        &mut self,
        target: &ToolId,
        sources: &[ToolId],
    ) -> Result<&GcodeStats, SessionError> {
        let stats = self.stats.as_ref().ok_or(SessionError::NoAnalysis)?;
        let outcome = merge_colors(stats, target, sources)?;
        let (optimization, validation) = self.run_optimizer(&outcome.stats)?;

        self.bus.emit(AnalysisEvent::MergeApplied {
            target: outcome.info.target.clone(),
            sources: outcome.info.sources.clone(),
        });
        if let Some(snapshot) = self.timeline.add_merge(
            outcome.stats.clone(),
            optimization.clone(),
            validation.clone(),
            outcome.info,
        ) {
            self.emit_timeline_changed(snapshot);
        }

        self.stats = Some(outcome.stats);
        self.optimization = Some(optimization);
        self.validation = Some(validation);
        Ok(self.stats.as_ref().expect("just set"))
    }

    /// Adopt a previously persisted timeline from the attached store,
    /// restoring the cursor snapshot as the live state. Returns whether
    /// anything was restored; store errors never propagate.
    pub fn restore_timeline(&mut self) -> bool {
        if !self.timeline.load_from_storage() {
            return false;
        }
        let snapshot = self.timeline.current().cloned();
        self.adopt(snapshot)
    }

    pub fn undo(&mut self) -> bool {
        let snapshot = self.timeline.undo().cloned();
        self.adopt(snapshot)
    }

    pub fn redo(&mut self) -> bool {
        let snapshot = self.timeline.redo().cloned();
        self.adopt(snapshot)
    }

    pub fn jump_to(&mut self, id: &SnapshotId) -> bool {
        let snapshot = self.timeline.jump_to(id).cloned();
        self.adopt(snapshot)
    }

    pub fn reset(&mut self) -> bool {
        let snapshot = self.timeline.reset().cloned();
        self.adopt(snapshot)
    }

    pub fn create_branch(&mut self, name: &str) -> bool {
        self.timeline.create_branch(name).is_some()
    }

    pub fn switch_branch(&mut self, name: &str) -> bool {
        let snapshot = self.timeline.switch_branch(name).cloned();
        self.adopt(snapshot)
    }

    fn run_optimizer(
        &self,
        stats: &GcodeStats,
    ) -> Result<(OptimizationResult, ConstraintValidation), SessionError> {
        let strategy = self
            .registry
            .get(&self.strategy_name)
            .ok_or_else(|| SessionError::UnknownStrategy(self.strategy_name.clone()))?;
        let (optimization, validation) = analyze(stats, &self.system, strategy);
        self.bus.emit(AnalysisEvent::OptimizationCompleted {
            strategy: self.strategy_name.clone(),
            swap_count: optimization.swaps.len(),
            required_slots: optimization.required_slots,
        });
        self.bus.emit(AnalysisEvent::ConstraintReport {
            violation_count: validation.violations.len(),
        });
        Ok((optimization, validation))
    }

    /// Restore session state from a timeline navigation result.
    fn adopt(&mut self, snapshot: Option<StateSnapshot>) -> bool {
        let Some(snapshot) = snapshot else {
            return false;
        };
        self.emit_timeline_changed(snapshot.id.clone());
        self.stats = Some(snapshot.stats);
        self.optimization = Some(snapshot.optimization);
        self.validation = Some(snapshot.validation);
        true
    }

    fn emit_timeline_changed(&self, snapshot: SnapshotId) {
        let (branch, depth) = self
            .timeline
            .timeline()
            .map(|tl| (tl.current_branch.clone(), tl.snapshots.len()))
            .unwrap_or_else(|| (String::new(), 0));
        self.bus.emit(AnalysisEvent::TimelineChanged {
            snapshot,
            branch,
            depth,
        });
    }
}
