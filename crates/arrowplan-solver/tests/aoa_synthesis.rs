//! AoA synthesis test suite.
//!
//! These tests validate the structural invariants of the synthesized
//! network: predecessor preservation, prefix factoring, parallel-arrow
//! splitting, cycle rejection and input-format equivalence.

use std::collections::{HashMap, HashSet};

use arrowplan_core::{Links, ModelError, NetworkSnapshot, Wbs, WbsEntry};
use arrowplan_solver::NetworkModel;
use serde_json::json;

fn wbs_of(entries: &[(u32, &str, f64)]) -> Wbs {
    let mut wbs = Wbs::new();
    for &(id, letter, effort) in entries {
        wbs.insert(id, WbsEntry::new(letter).expected(effort));
    }
    wbs
}

fn record_of(snapshot: &NetworkSnapshot, wbs_id: u32) -> &arrowplan_core::ActivityRecord {
    snapshot
        .activities
        .iter()
        .find(|a| a.wbs_id == wbs_id)
        .unwrap_or_else(|| panic!("activity {wbs_id} missing from snapshot"))
}

// ============================================================================
// Scenario 2: shared-prefix factorization
// ============================================================================

#[test]
fn shared_prefix_collapses_to_one_join_event() {
    // Parents A, B, C feed children E, F, G; each child also has a unique
    // input U1, U2, U3.
    let wbs = wbs_of(&[
        (1, "A", 2.0),
        (2, "B", 3.0),
        (3, "C", 4.0),
        (4, "E", 1.0),
        (5, "F", 1.0),
        (6, "G", 1.0),
        (7, "U1", 1.0),
        (8, "U2", 1.0),
        (9, "U3", 1.0),
    ]);
    let links = Links::from_pairs(&[
        (1, 4), (2, 4), (3, 4), (7, 4),
        (1, 5), (2, 5), (3, 5), (8, 5),
        (1, 6), (2, 6), (3, 6), (9, 6),
    ])
    .unwrap();

    let model = NetworkModel::new(&wbs, &links).unwrap();
    let snapshot = model.to_snapshot();

    // the prefix {A, B, C} is represented by a single fan-out event: the
    // common source of the dummies that feed the three children
    let child_sources: HashSet<usize> =
        [4, 5, 6].iter().map(|&c| record_of(&snapshot, c).src_id).collect();
    assert_eq!(child_sources.len(), 3, "each child keeps its own start event");

    let fan_out: Vec<_> = snapshot
        .activities
        .iter()
        .filter(|a| a.is_dummy() && child_sources.contains(&a.dst_id))
        .collect();
    assert_eq!(fan_out.len(), 3, "one dummy per child");
    let join = fan_out[0].src_id;
    assert!(fan_out.iter().all(|d| d.src_id == join), "a single join event fans out");

    // every parent reaches the join: directly or over one split-tail dummy
    for &parent in &[1, 2, 3] {
        let dst = record_of(&snapshot, parent).dst_id;
        let reaches = dst == join
            || snapshot
                .activities
                .iter()
                .any(|d| d.is_dummy() && d.src_id == dst && d.dst_id == join);
        assert!(reaches, "parent {parent} must reach the join event");
    }

    // children no longer receive direct arrows from the parents
    for &child in &[4, 5, 6] {
        let src = record_of(&snapshot, child).src_id;
        for &parent in &[1, 2, 3] {
            assert_ne!(record_of(&snapshot, parent).dst_id, src);
        }
    }

    // C(4.0) dominates the prefix, each child adds 1.0
    assert!((model.project_duration() - 5.0).abs() < 1e-9);
}

// ============================================================================
// Scenario 3: parallel arrows
// ============================================================================

#[test]
fn duplicate_arrows_are_split_with_a_fresh_tail() {
    // Two A-like activities and B all span the same pair of events.
    let wbs = wbs_of(&[(1, "A1", 2.0), (2, "A2", 3.0), (3, "B", 4.0), (4, "E", 1.0)]);
    let links = Links::from_pairs(&[(1, 4), (2, 4), (3, 4)]).unwrap();

    let model = NetworkModel::new(&wbs, &links).unwrap();
    let snapshot = model.to_snapshot();

    let a1 = record_of(&snapshot, 1);
    let a2 = record_of(&snapshot, 2);
    assert_eq!(a1.src_id, a2.src_id);
    assert_ne!(a1.dst_id, a2.dst_id, "split arrows must not share endpoints");

    // a fresh dummy links the tail event back to the join
    assert!(snapshot
        .activities
        .iter()
        .any(|d| d.is_dummy() && d.src_id == a2.dst_id));
}

#[test]
fn no_two_real_activities_share_both_endpoints() {
    // Property 4 over a denser graph
    let wbs = wbs_of(&[
        (1, "A", 1.0),
        (2, "B", 2.0),
        (3, "C", 3.0),
        (4, "D", 4.0),
        (5, "E", 5.0),
        (6, "F", 6.0),
    ]);
    let links = Links::from_pairs(&[
        (1, 3), (2, 3), (1, 4), (2, 4), (3, 5), (4, 5), (3, 6), (4, 6),
    ])
    .unwrap();

    let model = NetworkModel::new(&wbs, &links).unwrap();
    let snapshot = model.to_snapshot();

    let mut seen: HashMap<(usize, usize), u32> = HashMap::new();
    for a in snapshot.activities.iter().filter(|a| !a.is_dummy()) {
        if let Some(other) = seen.insert((a.src_id, a.dst_id), a.wbs_id) {
            panic!(
                "activities {} and {} share endpoints {:?}",
                other,
                a.wbs_id,
                (a.src_id, a.dst_id)
            );
        }
    }
}

// ============================================================================
// Scenario 4: cycles
// ============================================================================

#[test]
fn cycle_aborts_the_build() {
    let wbs = wbs_of(&[(1, "A", 1.0), (2, "B", 1.0), (3, "C", 1.0)]);
    let links = Links::from_pairs(&[(1, 2), (2, 3), (3, 1)]).unwrap();

    let err = NetworkModel::new(&wbs, &links).unwrap_err();
    assert!(matches!(err, ModelError::Cycle { .. }));
}

#[test]
fn self_dependency_aborts_the_build() {
    let wbs = wbs_of(&[(1, "A", 1.0)]);
    let links = Links::from_pairs(&[(1, 1)]).unwrap();

    let err = NetworkModel::new(&wbs, &links).unwrap_err();
    assert!(matches!(err, ModelError::Cycle { wbs_id: 1 }));
}

// ============================================================================
// Property 1: link format equivalence
// ============================================================================

#[test]
fn all_link_formats_build_identical_models() {
    let wbs = wbs_of(&[(1, "A", 2.0), (2, "B", 3.0), (3, "C", 4.0), (4, "D", 5.0)]);

    let twin = Links::from_arrays(&[1, 2, 1, 3], &[3, 3, 4, 4]).unwrap();
    let rows = Links::from_value(&json!([[1, 2, 1, 3], [3, 3, 4, 4]])).unwrap();
    let cols = Links::from_value(&json!([[1, 3], [2, 3], [1, 4], [3, 4]])).unwrap();
    let map = Links::from_value(&json!({"src": [1, 2, 1, 3], "dst": [3, 3, 4, 4]})).unwrap();

    let reference =
        serde_json::to_value(NetworkModel::new(&wbs, &twin).unwrap().to_snapshot()).unwrap();
    for links in [rows, cols, map] {
        let snapshot =
            serde_json::to_value(NetworkModel::new(&wbs, &links).unwrap().to_snapshot()).unwrap();
        assert_eq!(reference, snapshot);
    }
}

// ============================================================================
// Structure invariants
// ============================================================================

#[test]
fn events_form_a_single_source_single_sink_dag() {
    let wbs = wbs_of(&[
        (1, "A", 1.0),
        (2, "B", 2.0),
        (3, "C", 3.0),
        (4, "D", 4.0),
        (5, "E", 5.0),
    ]);
    let links = Links::from_pairs(&[(1, 3), (2, 3), (2, 4), (3, 5), (4, 5)]).unwrap();

    let model = NetworkModel::new(&wbs, &links).unwrap();
    let snapshot = model.to_snapshot();

    let n = snapshot.events.len();
    let mut in_deg = vec![0usize; n + 1];
    let mut out_deg = vec![0usize; n + 1];
    for a in &snapshot.activities {
        assert!(a.src_id >= 1 && a.src_id <= n);
        assert!(a.dst_id >= 1 && a.dst_id <= n);
        assert!(a.src_id < a.dst_id, "stage numbering must order arrows forward");
        out_deg[a.src_id] += 1;
        in_deg[a.dst_id] += 1;
    }
    assert_eq!((1..=n).filter(|&e| in_deg[e] == 0).count(), 1, "one source");
    assert_eq!((1..=n).filter(|&e| out_deg[e] == 0).count(), 1, "one sink");
    // event ids are dense and stage-ordered
    for w in snapshot.events.windows(2) {
        assert!(w[0].stage <= w[1].stage);
        assert_eq!(w[0].id + 1, w[1].id);
    }
}

#[test]
fn implicit_link_endpoints_become_activities() {
    // id 9 appears only in the links; it becomes a zero-effort activity
    let wbs = wbs_of(&[(1, "A", 2.0)]);
    let links = Links::from_pairs(&[(9, 1)]).unwrap();

    let model = NetworkModel::new(&wbs, &links).unwrap();
    let snapshot = model.to_snapshot();

    let implicit = record_of(&snapshot, 9);
    assert_eq!(implicit.expected, 0.0);
    assert_eq!(implicit.letter, "9");
    assert!((model.project_duration() - 2.0).abs() < 1e-9);
}

#[test]
fn missing_effort_form_is_rejected() {
    let mut wbs = Wbs::new();
    wbs.insert(1, WbsEntry::new("A"));
    let links = Links::new();

    let err = NetworkModel::new(&wbs, &links).unwrap_err();
    assert!(matches!(err, ModelError::EffortShape { wbs_id: 1, .. }));
}

#[test]
fn empty_input_builds_an_empty_model() {
    let model = NetworkModel::new(&Wbs::new(), &Links::new()).unwrap();
    assert_eq!(model.n_activities(), 0);
    assert_eq!(model.n_events(), 0);
    assert_eq!(model.project_duration(), 0.0);
}
