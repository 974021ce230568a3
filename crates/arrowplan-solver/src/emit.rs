//! Event emission.
//!
//! A Kahn-style sweep over the factored activity set assigns source and
//! destination events. Activities that become startable together share a
//! source event; the minimal predecessors of each new group receive the
//! group's event as their destination. A predecessor whose destination is
//! already taken would produce a second arrow into the same node, so a
//! collision dummy is inserted instead.

use tracing::debug;

use arrowplan_core::ModelError;

use crate::closure::DepGraph;

/// Raw AoA arrows straight out of the emitter, before optimization.
///
/// Activity indices `0..n_from_deps` mirror the dependency graph
/// (reals first, then prefix dummies); anything above is a collision
/// dummy created here.
pub(crate) struct AoaDraft {
    /// Source event per activity, 1-based.
    pub src: Vec<usize>,
    /// Destination event per activity, 1-based.
    pub dst: Vec<usize>,
    /// Activity count inherited from the dependency graph.
    pub n_from_deps: usize,
    /// Dense event id space is `1..=n_events`.
    pub n_events: usize,
}

pub(crate) fn emit_events(g: &DepGraph) -> Result<AoaDraft, ModelError> {
    let n = g.n_act;
    let succ = g.successors();
    let mut num_dep: Vec<usize> = (0..n).map(|i| g.min_list[i].len()).collect();
    let mut started = vec![false; n];
    let mut src = vec![0usize; n];
    let mut dst = vec![0usize; n];
    let mut extra: Vec<(usize, usize)> = Vec::new();

    let find_startable = |num_dep: &[usize], started: &mut [bool]| -> Vec<usize> {
        let group: Vec<usize> =
            (0..n).filter(|&a| num_dep[a] == 0 && !started[a]).collect();
        for &a in &group {
            started[a] = true;
        }
        group
    };

    let mut evt_counter = 1usize;
    let mut queue: Vec<usize> = Vec::new();

    let initial = find_startable(&num_dep, &mut started);
    if initial.is_empty() {
        return Err(ModelError::Internal(
            "no startable activity in an acyclic network".into(),
        ));
    }
    for &a in &initial {
        src[a] = evt_counter;
    }
    evt_counter += 1;
    queue.extend(initial);

    let mut head = 0;
    while head < queue.len() {
        let done = queue[head];
        head += 1;
        for &s in &succ[done] {
            num_dep[s] -= 1;
        }

        let group = find_startable(&num_dep, &mut started);
        if group.is_empty() {
            continue;
        }
        for &a in &group {
            src[a] = evt_counter;
        }
        for &pred in &g.min_list[group[0]] {
            if dst[pred] != 0 {
                extra.push((dst[pred], evt_counter));
            } else {
                dst[pred] = evt_counter;
            }
        }
        evt_counter += 1;
        queue.extend(group);
    }

    if started.iter().any(|&s| !s) {
        return Err(ModelError::Internal(
            "activities left unstarted after event emission".into(),
        ));
    }

    // The final event absorbs every arrow with no destination yet.
    let sink = evt_counter;
    for a in 0..n {
        if dst[a] == 0 {
            dst[a] = sink;
        }
    }

    for (s, d) in extra {
        src.push(s);
        dst.push(d);
    }

    debug!(
        activities = src.len(),
        collision_dummies = src.len() - n,
        events = sink,
        "event emission complete"
    );
    Ok(AoaDraft { src, dst, n_from_deps: n, n_events: sink })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrowplan_core::WbsId;
    use pretty_assertions::assert_eq;

    fn emit(n: usize, links: &[(usize, usize)]) -> (DepGraph, AoaDraft) {
        let ids: Vec<WbsId> = (1..=n as WbsId).collect();
        let mut g = DepGraph::build(n, links, &ids).unwrap();
        crate::dummy::insert_dummies(&mut g);
        let draft = emit_events(&g).unwrap();
        (g, draft)
    }

    #[test]
    fn chain_gets_sequential_events() {
        let (_, d) = emit(3, &[(0, 1), (1, 2)]);
        assert_eq!(d.src, vec![1, 2, 3]);
        assert_eq!(d.dst, vec![2, 3, 4]);
        assert_eq!(d.n_events, 4);
    }

    #[test]
    fn every_arrow_points_forward() {
        let (_, d) = emit(6, &[(0, 2), (1, 2), (0, 3), (2, 4), (3, 4), (3, 5)]);
        for a in 0..d.src.len() {
            assert!(d.src[a] >= 1);
            assert!(d.src[a] < d.dst[a], "arrow {a} must go forward");
            assert!(d.dst[a] <= d.n_events);
        }
    }

    #[test]
    fn parallel_starts_share_the_source_event() {
        let (_, d) = emit(3, &[(0, 2), (1, 2)]);
        assert_eq!(d.src[0], 1);
        assert_eq!(d.src[1], 1);
    }

    #[test]
    fn collision_spawns_an_extra_dummy() {
        // Emitted without prefix factoring: when 2 starts, 0's destination
        // is already taken by 1's start event, so the emitter has to fall
        // back to a collision dummy.
        let ids: Vec<WbsId> = vec![1, 2, 3];
        let g = DepGraph::build(3, &[(0, 1), (0, 2), (1, 2)], &ids).unwrap();
        let d = emit_events(&g).unwrap();

        assert_eq!(d.src.len(), d.n_from_deps + 1, "expected a collision dummy");
        let dummy = d.src.len() - 1;
        assert!(d.src[dummy] < d.dst[dummy]);
        assert_eq!(d.src[dummy], d.dst[0]);
    }

    #[test]
    fn single_activity_spans_source_to_sink() {
        let (_, d) = emit(1, &[]);
        assert_eq!(d.src, vec![1]);
        assert_eq!(d.dst, vec![2]);
        assert_eq!(d.n_events, 2);
    }
}
