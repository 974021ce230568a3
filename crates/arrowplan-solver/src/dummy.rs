//! Dummy insertion.
//!
//! Rewrites the dependency graph so that shared and overlapping
//! predecessor prefixes are factored into dummy activities. After this
//! stage, activities that become startable together have identical
//! minimal predecessor sets, which is what lets the event emitter assign
//! a single source event per group.

use tracing::debug;

use crate::closure::DepGraph;

/// Run the nested-prefix pass followed by the overlap pass.
pub(crate) fn insert_dummies(g: &mut DepGraph) {
    let before = g.n_act;
    nested_pass(g);
    g.refresh_order();
    overlap_pass(g);
    g.refresh_order();
    debug!(dummies = g.n_act - before, "prefix factoring complete");
}

/// Hoist whole minimal lists that appear as proper subsets of later
/// activities' minimal lists into a single dummy.
fn nested_pass(g: &mut DepGraph) {
    let order = g.order.clone();
    for p in 0..order.len() {
        let i = order[p];
        let prefix = g.min_list[i].clone();
        if prefix.is_empty() {
            continue;
        }
        let dummy = g.n_act;
        let mut hit = false;
        for &j in &order[p + 1..] {
            if g.min_list[j].len() > prefix.len() && g.contains_all(j, &prefix) {
                g.replace_prefix(&prefix, j, dummy);
                hit = true;
            }
        }
        if hit {
            let full = g.full_list[i].clone();
            g.add_dummy(full, prefix);
        }
    }
}

/// Factor partial overlaps: when two minimal lists share a prefix that is
/// all of neither, materialize the prefix as a pair of dummies, one
/// replacing it in the pivot, one in the partner, and rewire every later
/// activity that contains the whole prefix onto the partner's dummy.
fn overlap_pass(g: &mut DepGraph) {
    let order = g.order.clone();
    for p in 0..order.len() {
        let i = order[p];
        for q in p + 1..order.len() {
            let j = order[q];
            let common = g.common_prefix(i, j);
            if common.is_empty()
                || common.len() == g.min_list[i].len()
                || common.len() == g.min_list[j].len()
            {
                continue;
            }

            let full_common = g.common_full(i, j);

            let first = g.n_act;
            g.replace_prefix(&common, i, first);
            g.add_dummy(full_common.clone(), common.clone());

            let second = g.n_act;
            g.replace_prefix(&common, j, second);
            g.add_dummy(full_common, common.clone());

            for &k in &order[q + 1..] {
                if g.contains_all(k, &common) {
                    g.replace_prefix(&common, k, second);
                }
            }
            break;
        }
    }
}
