//! Network optimization.
//!
//! The emitter leaves redundant structure behind: equivalent events fed by
//! the same dummy arrows, chain events whose only input or output is a
//! single dummy, and parallel arrows sharing both endpoints. The gluing
//! passes merge events through a substitution map, dead arrows are
//! tombstoned with [`FAKE`], and a final compaction makes event ids dense
//! again.

use std::collections::HashMap;

use tracing::debug;

use arrowplan_core::ModelError;

/// Tombstone for removed arrows; out of range of every real event id.
pub(crate) const FAKE: usize = usize::MAX;

/// Mutable AoA arrow set operated on by the optimizer.
pub(crate) struct Network {
    /// Source event per arrow, 1-based; `FAKE` marks a dead arrow.
    pub src: Vec<usize>,
    /// Destination event per arrow, 1-based.
    pub dst: Vec<usize>,
    /// Real-activity flag per arrow.
    pub real: Vec<bool>,
    /// Dense event id space is `1..=n_events`.
    pub n_events: usize,
    /// Event substitution map: `events[e-1]` is where `e` now points.
    events: Vec<usize>,
}

impl Network {
    pub fn new(src: Vec<usize>, dst: Vec<usize>, real: Vec<bool>, n_events: usize) -> Self {
        let events = (1..=n_events).collect();
        Self { src, dst, real, n_events, events }
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_live(&self, a: usize) -> bool {
        self.src[a] != FAKE
    }

    fn kill(&mut self, a: usize) {
        self.src[a] = FAKE;
        self.dst[a] = FAKE;
    }

    /// Follow the substitution map to the surviving event.
    fn resolve(&self, mut e: usize) -> usize {
        while self.events[e - 1] != e {
            e = self.events[e - 1];
        }
        e
    }

    /// Rewrite every live arrow through the substitution map.
    fn relink(&mut self) {
        for a in 0..self.len() {
            if self.is_live(a) {
                self.src[a] = self.resolve(self.src[a]);
                self.dst[a] = self.resolve(self.dst[a]);
            }
        }
    }

    fn live_arrows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&a| self.is_live(a))
    }

    /// Run the gluing passes to a fixpoint, then resolve parallel arrows
    /// and compact event ids. Returns the indices of surviving arrows in
    /// their original order so the caller can carry activity metadata
    /// across.
    pub fn optimize(&mut self) -> Result<Vec<usize>, ModelError> {
        loop {
            let changed = self.merge_by_predecessors()
                + self.merge_single_input()
                + self.merge_single_output()
                + self.drop_redundant_parallel()?;
            if changed == 0 {
                break;
            }
        }
        self.split_parallel_reals();
        let kept = self.compact();
        self.validate()?;
        debug!(
            arrows = kept.len(),
            events = self.n_events,
            "network optimization complete"
        );
        Ok(kept)
    }

    /// Pass 1: events fed only by dummies, with identical predecessor
    /// event sets of size >= 2, are the same milestone; merge them.
    fn merge_by_predecessors(&mut self) -> usize {
        let mut dummy_srcs: Vec<Vec<usize>> = vec![Vec::new(); self.n_events + 1];
        let mut real_in = vec![false; self.n_events + 1];
        for a in self.live_arrows() {
            if self.real[a] {
                real_in[self.dst[a]] = true;
            } else {
                dummy_srcs[self.dst[a]].push(self.src[a]);
            }
        }
        for srcs in &mut dummy_srcs {
            srcs.sort_unstable();
            srcs.dedup();
        }

        let candidates: Vec<usize> = (1..=self.n_events)
            .filter(|&e| {
                self.events[e - 1] == e && !real_in[e] && dummy_srcs[e].len() >= 2
            })
            .collect();

        let mut merged = 0;
        let mut gone = vec![false; self.n_events + 1];
        for (i, &e) in candidates.iter().enumerate() {
            if gone[e] {
                continue;
            }
            for &f in &candidates[i + 1..] {
                if gone[f] || dummy_srcs[f] != dummy_srcs[e] {
                    continue;
                }
                self.events[f - 1] = e;
                gone[f] = true;
                for a in 0..self.len() {
                    if self.is_live(a) && !self.real[a] && self.dst[a] == f {
                        self.kill(a);
                    }
                }
                merged += 1;
            }
        }
        self.relink();
        merged
    }

    /// Pass 2a: a dummy-only event with exactly one incoming dummy is the
    /// same milestone as its predecessor.
    fn merge_single_input(&mut self) -> usize {
        let mut in_arrows: Vec<Vec<usize>> = vec![Vec::new(); self.n_events + 1];
        for a in self.live_arrows() {
            in_arrows[self.dst[a]].push(a);
        }

        let mut merged = 0;
        for e in 1..=self.n_events {
            if self.events[e - 1] != e {
                continue;
            }
            let &[only] = in_arrows[e].as_slice() else { continue };
            if self.real[only] || !self.is_live(only) {
                continue;
            }
            let s = self.resolve(self.src[only]);
            if s == e {
                continue;
            }
            self.events[e - 1] = s;
            self.kill(only);
            merged += 1;
        }
        self.relink();
        merged
    }

    /// Pass 2b: an event whose only output is a dummy folds into its
    /// successor.
    fn merge_single_output(&mut self) -> usize {
        let mut out_arrows: Vec<Vec<usize>> = vec![Vec::new(); self.n_events + 1];
        for a in self.live_arrows() {
            out_arrows[self.src[a]].push(a);
        }

        let mut merged = 0;
        for e in 1..=self.n_events {
            if self.events[e - 1] != e {
                continue;
            }
            let &[only] = out_arrows[e].as_slice() else { continue };
            if self.real[only] || !self.is_live(only) {
                continue;
            }
            let t = self.resolve(self.dst[only]);
            if t == e {
                continue;
            }
            self.events[e - 1] = t;
            self.kill(only);
            merged += 1;
        }
        self.relink();
        merged
    }

    /// A dummy sharing both endpoints with any other surviving arrow adds
    /// no reachability; drop it. Returns the number of dropped dummies.
    fn drop_redundant_parallel(&mut self) -> Result<usize, ModelError> {
        let mut seen: HashMap<(usize, usize), bool> = HashMap::new();
        // reals claim their endpoint pair first
        let mut reals_first: Vec<usize> = self.live_arrows().collect();
        reals_first.sort_by_key(|&a| !self.real[a]);

        let mut to_kill = Vec::new();
        for a in reals_first {
            if self.real[a] && self.src[a] == self.dst[a] {
                return Err(ModelError::Internal(format!(
                    "real activity {a} collapsed onto a single event"
                )));
            }
            if !self.real[a] && self.src[a] == self.dst[a] {
                to_kill.push(a);
                continue;
            }
            let key = (self.src[a], self.dst[a]);
            if self.real[a] {
                seen.entry(key).or_insert(true);
            } else if seen.contains_key(&key) {
                to_kill.push(a);
            } else {
                seen.insert(key, false);
            }
        }
        let dropped = to_kill.len();
        for a in to_kill {
            self.kill(a);
        }
        Ok(dropped)
    }

    /// Pass 3: two real activities may not share both endpoints. The
    /// second one gets a fresh tail event linked forward by a dummy.
    fn split_parallel_reals(&mut self) {
        let mut taken: HashMap<(usize, usize), usize> = HashMap::new();
        for a in 0..self.len() {
            if !self.is_live(a) || !self.real[a] {
                continue;
            }
            let key = (self.src[a], self.dst[a]);
            if taken.contains_key(&key) {
                self.n_events += 1;
                self.events.push(self.n_events);
                let tail = self.n_events;
                self.src.push(tail);
                self.dst.push(key.1);
                self.real.push(false);
                self.dst[a] = tail;
            } else {
                taken.insert(key, a);
            }
        }
    }

    /// Compact surviving event ids to a dense `1..=K` and reset the
    /// substitution map. Returns surviving arrow indices in order.
    fn compact(&mut self) -> Vec<usize> {
        let mut used = vec![false; self.n_events + 1];
        let kept: Vec<usize> = self.live_arrows().collect();
        for &a in &kept {
            used[self.src[a]] = true;
            used[self.dst[a]] = true;
        }
        let mut map = vec![0usize; self.n_events + 1];
        let mut next = 0;
        for e in 1..=self.n_events {
            if used[e] {
                next += 1;
                map[e] = next;
            }
        }
        for &a in &kept {
            self.src[a] = map[self.src[a]];
            self.dst[a] = map[self.dst[a]];
        }
        self.n_events = next;
        self.events = (1..=next).collect();
        kept
    }

    /// Invariant 7: exactly one source and one sink event.
    fn validate(&self) -> Result<(), ModelError> {
        let mut in_deg = vec![0usize; self.n_events + 1];
        let mut out_deg = vec![0usize; self.n_events + 1];
        for a in self.live_arrows() {
            out_deg[self.src[a]] += 1;
            in_deg[self.dst[a]] += 1;
        }
        let sources: Vec<usize> =
            (1..=self.n_events).filter(|&e| in_deg[e] == 0).collect();
        let sinks: Vec<usize> =
            (1..=self.n_events).filter(|&e| out_deg[e] == 0).collect();
        if sources.len() != 1 {
            return Err(ModelError::Internal(format!(
                "expected one starting event, found {:?}",
                sources
            )));
        }
        if sinks.len() != 1 {
            return Err(ModelError::Internal(format!(
                "expected one final event, found {:?}",
                sinks
            )));
        }
        Ok(())
    }

    /// Optional straightening: in a triangle of dummies `d1: x→y`,
    /// `d2: y→z` and a real `r: x→z`, the largest-duration real at `x`
    /// trades arrows with `d2`, so the heavy activity runs through the
    /// intermediate event instead of across the chord. `durations` holds
    /// base-estimate durations parallel to the arrow set.
    pub fn straighten(&mut self, durations: &[f64]) {
        let arrows: Vec<usize> = self.live_arrows().collect();
        for &x in &self.events.clone() {
            let dummies_out: Vec<usize> = arrows
                .iter()
                .copied()
                .filter(|&a| self.is_live(a) && !self.real[a] && self.src[a] == x)
                .collect();
            if dummies_out.is_empty() {
                continue;
            }
            let mut best: Option<(usize, usize)> = None;
            for &r in &arrows {
                if !self.is_live(r) || !self.real[r] || self.src[r] != x {
                    continue;
                }
                let z = self.dst[r];
                let second = dummies_out.iter().copied().find_map(|d1| {
                    let y = self.dst[d1];
                    arrows
                        .iter()
                        .copied()
                        .find(|&d2| {
                            self.is_live(d2)
                                && !self.real[d2]
                                && self.src[d2] == y
                                && self.dst[d2] == z
                        })
                });
                if let Some(d2) = second {
                    let better = best.map_or(true, |(r0, _)| durations[r] > durations[r0]);
                    if better {
                        best = Some((r, d2));
                    }
                }
            }
            if let Some((r, d2)) = best {
                let y = self.src[d2];
                self.src[r] = y;
                self.src[d2] = x;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn equivalent_dummy_fed_events_merge() {
        // events 2 and 3 are both fed by dummies from {4, 5}; reals leave
        // from each
        //   reals: 1->4, 1->5, 2->6, 3->6 ... arrows below
        let src = vec![1, 1, 4, 5, 4, 5, 2, 3];
        let dst = vec![4, 5, 2, 2, 3, 3, 6, 6];
        let real = vec![true, true, false, false, false, false, true, true];
        let mut net = Network::new(src, dst, real, 6);

        let merged = net.merge_by_predecessors();
        assert_eq!(merged, 1);
        // both reals now leave the surviving event
        assert_eq!(net.src[6], 2);
        assert_eq!(net.src[7], 2);
        // event 3's dummies are gone
        assert!(!net.is_live(4));
        assert!(!net.is_live(5));
    }

    #[test]
    fn single_input_dummy_event_folds_into_predecessor() {
        // 1 -(real)-> 2 -(dummy)-> 3 -(real)-> 4, event 3 has one dummy in
        let src = vec![1, 2, 3];
        let dst = vec![2, 3, 4];
        let real = vec![true, false, true];
        let mut net = Network::new(src, dst, real, 4);

        let merged = net.merge_single_input();
        assert_eq!(merged, 1);
        assert!(!net.is_live(1));
        assert_eq!(net.src[2], 2);
    }

    #[test]
    fn single_output_dummy_event_folds_into_successor() {
        let src = vec![1, 2, 1];
        let dst = vec![2, 3, 3];
        let real = vec![true, false, true];
        let mut net = Network::new(src, dst, real, 3);

        let merged = net.merge_single_output();
        assert_eq!(merged, 1);
        assert!(!net.is_live(1));
        // the real into event 2 now lands on event 3
        assert_eq!(net.dst[0], 3);
    }

    #[test]
    fn parallel_reals_are_split_with_a_tail_dummy() {
        let src = vec![1, 1];
        let dst = vec![2, 2];
        let real = vec![true, true];
        let mut net = Network::new(src, dst, real, 2);

        let kept = net.optimize().unwrap();
        assert_eq!(kept.len(), 3);
        assert_ne!(net.dst[0], net.dst[1], "split reals must not share endpoints");
        // the added dummy links the tail event forward
        let tail = net.dst[1];
        assert!(net
            .live_arrows()
            .any(|a| !net.real[a] && net.src[a] == tail && net.dst[a] == net.dst[0]));
    }

    #[test]
    fn dummy_parallel_to_real_is_dropped() {
        let src = vec![1, 1, 2];
        let dst = vec![2, 2, 3];
        let real = vec![true, false, true];
        let mut net = Network::new(src, dst, real, 3);

        let kept = net.optimize().unwrap();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn compaction_renumbers_densely() {
        let src = vec![1, 3];
        let dst = vec![3, 7];
        let real = vec![true, true];
        let mut net = Network::new(src, dst, real, 7);
        // events 2, 4, 5, 6 are untouched by any arrow
        let kept = net.compact();
        assert_eq!(kept, vec![0, 1]);
        assert_eq!(net.n_events, 3);
        assert_eq!((net.src[0], net.dst[0]), (1, 2));
        assert_eq!((net.src[1], net.dst[1]), (2, 3));
    }

    #[test]
    fn two_sources_fail_validation() {
        let src = vec![1, 2];
        let dst = vec![3, 3];
        let real = vec![true, true];
        let net = Network::new(src, dst, real, 3);
        assert!(net.validate().is_err());
    }

    #[test]
    fn straighten_moves_largest_real_through_the_triangle() {
        // dummies 1->2 and 2->3, reals 1->3 (long) and 1->3 via... the
        // triangle is (d1: 1->2, d2: 2->3, r: 1->3)
        let src = vec![1, 2, 1, 2];
        let dst = vec![2, 3, 3, 4];
        let real = vec![false, false, true, true];
        let mut net = Network::new(src, dst, real, 4);

        net.straighten(&[0.0, 0.0, 5.0, 2.0]);
        // the real now runs 2->3, the dummy took the chord 1->3
        assert_eq!((net.src[2], net.dst[2]), (2, 3));
        assert_eq!((net.src[1], net.dst[1]), (1, 3));
    }
}
