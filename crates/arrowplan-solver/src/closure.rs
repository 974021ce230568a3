//! Dependency closure and minimal cover.
//!
//! The first pipeline stage turns the flat link list into, per activity,
//! a full transitive-closure predecessor set and a minimal-cover
//! (transitive-reduction) predecessor set. Both are kept in two shapes:
//! a bit matrix for O(1) membership and jagged lists for iteration.
//!
//! Capacity is preallocated beyond the activity count so that the dummy
//! insertion stage can append rows without reallocating the matrix.

use bitvec::prelude::*;
use tracing::debug;

use arrowplan_core::{ModelError, WbsId};

/// Dependency state shared by the closure and dummy-insertion stages.
///
/// Activities are positional indices; indices `< n_real` are the user's
/// activities in input order, everything above is an inserted dummy.
#[derive(Debug)]
pub(crate) struct DepGraph {
    /// Bit width of every matrix row.
    cap: usize,
    /// Number of user activities.
    pub n_real: usize,
    /// Current number of activities including dummies.
    pub n_act: usize,
    /// `full_dep[i][j]`: j precedes i, transitively.
    full_dep: Vec<BitVec>,
    /// List form of `full_dep`, in discovery order.
    pub full_list: Vec<Vec<usize>>,
    /// `min_dep[i][j]`: j is a direct (non-dominated) predecessor of i.
    min_dep: Vec<BitVec>,
    /// List form of `min_dep`, preserving `full_list` order.
    pub min_list: Vec<Vec<usize>>,
    /// Processing order: by minimal-list size, then full-list size.
    pub order: Vec<usize>,
}

impl DepGraph {
    /// Run the closure stage over `links` (pairs of activity indices).
    ///
    /// `wbs_of` maps activity indices back to user ids for error reporting.
    /// Fails with [`ModelError::Cycle`] on any self-reachability.
    pub fn build(
        n_act: usize,
        links: &[(usize, usize)],
        wbs_of: &[WbsId],
    ) -> Result<Self, ModelError> {
        let cap = (n_act.max(links.len()) + links.len()).max(n_act).max(1);
        let mut g = Self {
            cap,
            n_real: n_act,
            n_act,
            full_dep: vec![bitvec![0; cap]; n_act],
            full_list: vec![Vec::new(); n_act],
            min_dep: Vec::new(),
            min_list: vec![Vec::new(); n_act],
            order: (0..n_act).collect(),
        };

        for &(src, dst) in links {
            if src == dst {
                return Err(ModelError::Cycle { wbs_id: wbs_of[src] });
            }
            if !g.full_dep[dst][src] {
                g.full_dep[dst].set(src, true);
                g.full_list[dst].push(src);
            }
        }

        g.close(wbs_of)?;
        g.minimal_cover();
        g.refresh_order();

        debug!(
            activities = n_act,
            links = links.len(),
            "dependency closure complete"
        );
        Ok(g)
    }

    /// Transitive closure with a growing cursor per activity.
    fn close(&mut self, wbs_of: &[WbsId]) -> Result<(), ModelError> {
        for i in 0..self.n_act {
            let mut j = 0;
            while j < self.full_list[i].len() {
                let d = self.full_list[i][j];
                let mut k = 0;
                while k < self.full_list[d].len() {
                    let s = self.full_list[d][k];
                    if s == i {
                        return Err(ModelError::Cycle { wbs_id: wbs_of[i] });
                    }
                    if !self.full_dep[i][s] {
                        self.full_dep[i].set(s, true);
                        self.full_list[i].push(s);
                    }
                    k += 1;
                }
                j += 1;
            }
        }
        Ok(())
    }

    /// Minimal cover: a predecessor dominated by another predecessor is
    /// redundant. Pivots run from the largest closure down so removals
    /// see complete information.
    fn minimal_cover(&mut self) {
        let mut order: Vec<usize> = (0..self.n_act).collect();
        order.sort_by_key(|&i| self.full_list[i].len());

        self.min_dep = self.full_dep.clone();
        for &i in order.iter().rev() {
            for a in 0..self.full_list[i].len() {
                let j = self.full_list[i][a];
                for b in 0..self.full_list[i].len() {
                    let k = self.full_list[i][b];
                    if j != k && self.full_dep[k][j] {
                        self.min_dep[i].set(j, false);
                        break;
                    }
                }
            }
        }

        for i in 0..self.n_act {
            self.min_list[i] = self.full_list[i]
                .iter()
                .copied()
                .filter(|&d| self.min_dep[i][d])
                .collect();
        }
    }

    /// Recompute the processing order so that successors come later:
    /// ascending minimal-list size, ties by full-list size (stable).
    pub fn refresh_order(&mut self) {
        self.order = (0..self.n_act).collect();
        self.order
            .sort_by_key(|&i| (self.min_list[i].len(), self.full_list[i].len()));
    }

    /// O(1) membership in the full closure of `i`.
    pub fn full_has(&self, i: usize, j: usize) -> bool {
        self.full_dep[i][j]
    }

    /// True when every element of `prefix` is a minimal predecessor of `i`.
    pub fn contains_all(&self, i: usize, prefix: &[usize]) -> bool {
        prefix.iter().all(|&d| self.min_dep[i][d])
    }

    /// Intersection of `i`'s minimal list with `j`'s minimal set,
    /// in `i`'s order.
    pub fn common_prefix(&self, i: usize, j: usize) -> Vec<usize> {
        self.min_list[i]
            .iter()
            .copied()
            .filter(|&d| self.min_dep[j][d])
            .collect()
    }

    /// Intersection of the full closures of `i` and `j`, in `i`'s order.
    pub fn common_full(&self, i: usize, j: usize) -> Vec<usize> {
        self.full_list[i]
            .iter()
            .copied()
            .filter(|&d| self.full_dep[j][d])
            .collect()
    }

    /// Append a dummy activity with the given full and minimal
    /// predecessor sets; returns its index.
    pub fn add_dummy(&mut self, full: Vec<usize>, min: Vec<usize>) -> usize {
        let idx = self.n_act;
        self.ensure_width(idx + 1);
        let mut frow = bitvec![0; self.cap];
        for &d in &full {
            frow.set(d, true);
        }
        let mut mrow = bitvec![0; self.cap];
        for &d in &min {
            mrow.set(d, true);
        }
        self.full_dep.push(frow);
        self.full_list.push(full);
        self.min_dep.push(mrow);
        self.min_list.push(min);
        self.n_act += 1;
        idx
    }

    /// Rewire `target` to depend on `dummy` instead of the prefix.
    pub fn replace_prefix(&mut self, prefix: &[usize], target: usize, dummy: usize) {
        self.ensure_width(dummy + 1);
        for &d in prefix {
            self.min_dep[target].set(d, false);
        }
        self.min_dep[target].set(dummy, true);
        if !self.full_dep[target][dummy] {
            self.full_dep[target].set(dummy, true);
            self.full_list[target].push(dummy);
        }
        let mut kept: Vec<usize> = self.min_list[target]
            .iter()
            .copied()
            .filter(|d| !prefix.contains(d))
            .collect();
        kept.push(dummy);
        self.min_list[target] = kept;
    }

    /// Widen every matrix row when dummies exceed the preallocation.
    fn ensure_width(&mut self, need: usize) {
        if need <= self.cap {
            return;
        }
        let new_cap = (self.cap * 2).max(need);
        for row in self.full_dep.iter_mut().chain(self.min_dep.iter_mut()) {
            row.resize(new_cap, false);
        }
        self.cap = new_cap;
    }

    /// Successor lists over minimal predecessors.
    pub fn successors(&self) -> Vec<Vec<usize>> {
        let mut succ = vec![Vec::new(); self.n_act];
        for b in 0..self.n_act {
            for &a in &self.min_list[b] {
                succ[a].push(b);
            }
        }
        succ
    }
}
