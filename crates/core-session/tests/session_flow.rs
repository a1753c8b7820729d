//! End-to-end coordinator flow: analyze → merge → undo → branch, with
//! events observed along the way.

use core_config::Config;
use core_events::AnalysisEvent;
use core_model::ToolId;
use core_session::{AnalysisSession, SessionError};

const SIX_COLOR_GCODE: &str = "\
; generated by OrcaSlicer 2.1.1
; extruder_colour = #111111;#222222;#333333;#444444;#555555;#666666
; layer num/total_layer_count: 1/6
G1 Z0.2 E1
T0
; layer num/total_layer_count: 2/6
G1 Z0.4 E1
T1
; layer num/total_layer_count: 3/6
G1 Z0.6 E1
T2
; layer num/total_layer_count: 4/6
G1 Z0.8 E1
T3
; layer num/total_layer_count: 5/6
G1 Z1.0 E1
T4
; layer num/total_layer_count: 6/6
G1 Z1.2 E1
T5
";

fn tool(i: u32) -> ToolId {
    ToolId::from_index(i)
}

fn session_with_analysis() -> AnalysisSession {
    let mut session = AnalysisSession::new(&Config::default());
    session
        .analyze_bytes(SIX_COLOR_GCODE.as_bytes(), "six.gcode")
        .expect("analysis succeeds");
    session
}

#[test]
fn analyze_populates_all_three_documents() {
    let session = session_with_analysis();
    let stats = session.stats().unwrap();
    assert_eq!(stats.total_layers, 6);
    assert_eq!(stats.colors.len(), 6);
    let optimization = session.optimization().unwrap();
    assert_eq!(optimization.total_slots, 4);
    assert_eq!(optimization.swaps.len(), 2);
    // Accumulation puts all six colors on the last layer, over the
    // four-slot budget.
    let validation = session.validation().unwrap();
    assert!(validation.has_violations);
}

#[test]
fn merge_reoptimizes_and_snapshots() {
    let mut session = session_with_analysis();
    let before_colors = session.stats().unwrap().colors.len();

    session.merge(&tool(4), &[tool(5)]).unwrap();
    assert_eq!(session.stats().unwrap().colors.len(), before_colors - 1);
    assert_eq!(session.timeline().timeline().unwrap().snapshots.len(), 2);

    // Law: merge followed by undo restores the pre-merge stats.
    let before = session.timeline().timeline().unwrap().snapshots[0]
        .stats
        .clone();
    assert!(session.undo());
    assert_eq!(session.stats().unwrap(), &before);
    assert_eq!(session.stats().unwrap().colors.len(), before_colors);
}

#[test]
fn merge_error_leaves_state_untouched() {
    let mut session = session_with_analysis();
    let stats_before = session.stats().unwrap().clone();
    let err = session.merge(&tool(0), &[tool(9)]).unwrap_err();
    assert!(matches!(err, SessionError::Merge(_)));
    assert_eq!(session.stats().unwrap(), &stats_before);
    assert_eq!(
        session.timeline().timeline().unwrap().snapshots.len(),
        1,
        "failed merge commits nothing"
    );
}

#[test]
fn branching_after_undo_preserves_both_lines() {
    let mut session = session_with_analysis();
    session.merge(&tool(4), &[tool(5)]).unwrap();
    session.merge(&tool(2), &[tool(3)]).unwrap();
    assert!(session.undo());
    assert!(session.create_branch("alt"));
    session.merge(&tool(0), &[tool(1)]).unwrap();

    let tl = session.timeline().timeline().unwrap();
    tl.assert_invariants();
    assert_eq!(tl.branches["main"].len(), 3);
    assert_eq!(tl.branches["alt"].len(), 3);
    assert_eq!(tl.branches["main"][..2], tl.branches["alt"][..2]);

    // Main's tip still holds the second merge.
    assert!(session.switch_branch("main"));
    assert!(session.stats().unwrap().color(&tool(2)).is_some());
    assert!(session.stats().unwrap().color(&tool(3)).is_none());
}

#[test]
fn events_flow_through_the_bus() {
    let mut session = AnalysisSession::new(&Config::default());
    let sub = session.subscribe();
    session
        .analyze_bytes(SIX_COLOR_GCODE.as_bytes(), "six.gcode")
        .unwrap();
    session.merge(&tool(4), &[tool(5)]).unwrap();

    let events = sub.drain();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AnalysisEvent::ParseStarted { .. }))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AnalysisEvent::ParseCompleted { total_layers: 6, .. }))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AnalysisEvent::OptimizationCompleted { .. }))
    );
    assert!(events.iter().any(
        |e| matches!(e, AnalysisEvent::MergeApplied { target, .. } if *target == tool(4))
    ));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AnalysisEvent::TimelineChanged { .. }))
    );
}

#[test]
fn reoptimize_with_larger_magazine_clears_swaps() {
    let mut session = session_with_analysis();
    assert_eq!(session.optimization().unwrap().swaps.len(), 2);
    let result = session
        .reoptimize(Some(core_model::SystemConfiguration::magazine(2, 4)))
        .unwrap();
    assert!(result.swaps.is_empty(), "eight slots fit six colors");
    assert_eq!(result.required_slots, 6);
}

#[test]
fn restore_timeline_resumes_a_persisted_session() {
    let store = std::sync::Arc::new(core_timeline::MemoryStore::new());
    let config = Config::default();
    {
        let mut session =
            AnalysisSession::new(&config).with_store(&config, store.clone(), "resume-test");
        session
            .analyze_bytes(SIX_COLOR_GCODE.as_bytes(), "six.gcode")
            .unwrap();
        session.merge(&tool(4), &[tool(5)]).unwrap();
        // Dropping the session flushes the pending debounced save.
    }

    let mut resumed =
        AnalysisSession::new(&config).with_store(&config, store, "resume-test");
    assert!(resumed.stats().is_none());
    assert!(resumed.restore_timeline());
    let stats = resumed.stats().expect("cursor snapshot adopted");
    assert_eq!(stats.colors.len(), 5, "merged state came back");
    assert_eq!(
        resumed.timeline().timeline().unwrap().snapshots.len(),
        2
    );
    assert!(resumed.undo(), "history is navigable after restore");
    assert_eq!(resumed.stats().unwrap().colors.len(), 6);
}

#[test]
fn commands_without_analysis_are_rejected() {
    let mut session = AnalysisSession::new(&Config::default());
    assert!(matches!(
        session.merge(&tool(0), &[tool(1)]).unwrap_err(),
        SessionError::NoAnalysis
    ));
    assert!(matches!(
        session.reoptimize(None).unwrap_err(),
        SessionError::NoAnalysis
    ));
    assert!(!session.undo());
    assert!(!session.create_branch("alt"));
}
