//! # arrowplan-solver
//!
//! AoA network synthesis and CPM/PERT scheduling.
//!
//! A [`NetworkModel`] is built once from an Activity-on-Node description
//! (a [`Wbs`] plus precedence [`Links`]) and is immutable afterwards.
//! Construction runs the full pipeline: transitive closure and minimal
//! cover, dummy insertion, event emission, network optimization, then the
//! certainty-aware CPM sweeps with optional PERT variance propagation.
//! Queries (snapshot export, tables, quantiles, probabilities) are pure.
//!
//! ## Example
//!
//! ```rust
//! use arrowplan_core::{Links, Wbs, WbsEntry};
//! use arrowplan_solver::NetworkModel;
//!
//! let mut wbs = Wbs::new();
//! wbs.insert(1, WbsEntry::new("A").expected(5.0));
//! wbs.insert(2, WbsEntry::new("B").expected(3.0));
//! let links = Links::from_arrays(&[1], &[2]).unwrap();
//!
//! let model = NetworkModel::new(&wbs, &links).unwrap();
//! assert_eq!(model.project_duration(), 8.0);
//! assert_eq!(model.critical_activities(), vec![1, 2]);
//! ```

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use arrowplan_core::{
    ActivityCtx, ActivityRecord, DurationFn, EffortEstimate, EventRecord, Links, ModelError,
    NetworkSnapshot, SnapshotMeta, Table, TimeTriple, Wbs, WbsId, DUMMY_WBS,
};

mod closure;
mod cpm;
mod dummy;
mod emit;
pub mod mpert;
mod optimize;

pub use mpert::{fit_mpert, MpertFit};

/// Per-arrow activity facts carried through the pipeline.
#[derive(Clone, Debug)]
pub(crate) struct ActInfo {
    pub wbs_id: WbsId,
    pub letter: String,
    pub data: BTreeMap<String, Value>,
    pub est: EffortEstimate,
    /// Modified-PERT shape fitted to the effort estimate, when usable.
    pub gamma: Option<f64>,
}

impl ActInfo {
    fn dummy() -> Self {
        Self {
            wbs_id: DUMMY_WBS,
            letter: String::new(),
            data: BTreeMap::new(),
            est: EffortEstimate {
                expected: 0.0,
                variance: 0.0,
                optimistic: 0.0,
                pessimistic: 0.0,
            },
            gamma: None,
        }
    }
}

/// One scheduled arrow of the built network.
#[derive(Clone, Debug)]
struct ModelActivity {
    info: ActInfo,
    src: usize,
    dst: usize,
    sched: cpm::ActSched,
}

/// Configuration for building a [`NetworkModel`].
pub struct NetworkBuilder {
    duration: DurationFn,
    p: f64,
    default_risk: f64,
    debug: bool,
    straighten: bool,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self {
            duration: Box::new(|effort, _, _| effort),
            p: 0.95,
            default_risk: 0.3,
            debug: false,
            straighten: false,
        }
    }

    /// Effort → duration callback. See [`DurationFn`] for the contract.
    pub fn duration(
        mut self,
        f: impl Fn(f64, &ActivityCtx<'_>, Option<f64>) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.duration = Box::new(f);
        self
    }

    /// Probability level for PERT quantile columns (default 0.95).
    pub fn p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    /// Interval factor for direct estimates (default 0.3).
    pub fn default_risk(mut self, risk: f64) -> Self {
        self.default_risk = risk;
        self
    }

    /// Export error-bound columns.
    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    /// Enable the aesthetic triangle swap after optimization.
    pub fn straighten(mut self, on: bool) -> Self {
        self.straighten = on;
        self
    }

    /// Run the pipeline and build the model.
    pub fn build(self, wbs: &Wbs, links: &Links) -> Result<NetworkModel, ModelError> {
        // ── Inputs: activities in caller order, link endpoints appended ─
        let mut infos: Vec<ActInfo> = Vec::with_capacity(wbs.len());
        let mut index_of: HashMap<WbsId, usize> = HashMap::new();
        for (id, entry) in wbs.iter() {
            if id == DUMMY_WBS {
                return Err(ModelError::EffortShape {
                    wbs_id: id,
                    reason: "wbs id 0 is reserved for internal dummies".into(),
                });
            }
            let effort = entry.effort.as_ref().ok_or_else(|| ModelError::EffortShape {
                wbs_id: id,
                reason: "no effort estimate (expected, three-point or two-point)".into(),
            })?;
            let est = effort
                .estimate(self.default_risk)
                .map_err(|reason| ModelError::EffortShape { wbs_id: id, reason })?;
            index_of.insert(id, infos.len());
            infos.push(ActInfo {
                wbs_id: id,
                letter: entry.letter.clone(),
                data: entry.data.clone(),
                est,
                gamma: None,
            });
        }

        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(links.len());
        for (s, d) in links.iter() {
            for id in [s, d] {
                if !index_of.contains_key(&id) {
                    index_of.insert(id, infos.len());
                    infos.push(ActInfo {
                        wbs_id: id,
                        letter: id.to_string(),
                        data: BTreeMap::new(),
                        est: EffortEstimate {
                            expected: 0.0,
                            variance: 0.0,
                            optimistic: 0.0,
                            pessimistic: 0.0,
                        },
                        gamma: None,
                    });
                }
            }
            pairs.push((index_of[&s], index_of[&d]));
        }

        let n_real = infos.len();
        if n_real == 0 {
            return Ok(NetworkModel {
                acts: Vec::new(),
                events: Vec::new(),
                p: self.p,
                debug: self.debug,
                is_pert: false,
                project_end: TimeTriple::zero(),
            });
        }

        let is_pert = infos.iter().any(|i| i.est.variance > 0.0);
        if is_pert {
            for info in &mut infos {
                if let MpertFit::Fitted { gamma, .. } = mpert::fit_mpert(
                    info.est.expected,
                    info.est.variance,
                    info.est.optimistic,
                    info.est.pessimistic,
                ) {
                    info.gamma = Some(gamma);
                }
            }
        }

        // ── C1 + C2: closure, minimal cover, prefix factoring ───────────
        let wbs_of: Vec<WbsId> = infos.iter().map(|i| i.wbs_id).collect();
        let mut graph = closure::DepGraph::build(n_real, &pairs, &wbs_of)?;
        dummy::insert_dummies(&mut graph);
        infos.resize_with(graph.n_act, ActInfo::dummy);

        // ── C3: event emission ──────────────────────────────────────────
        let draft = emit::emit_events(&graph)?;
        infos.resize_with(draft.src.len(), ActInfo::dummy);

        // ── C4: gluing, parallel-arrow split, compaction ────────────────
        let real_flags: Vec<bool> = (0..draft.src.len()).map(|a| a < n_real).collect();
        let mut net = optimize::Network::new(draft.src, draft.dst, real_flags, draft.n_events);
        let kept = net.optimize()?;
        infos.resize_with(net.len(), ActInfo::dummy);

        if self.straighten {
            let mut durations = vec![0.0; net.len()];
            for a in 0..net.len() {
                if net.real[a] {
                    durations[a] =
                        cpm::duration_triple(1.0, &infos[a], None, &self.duration, false)?.res;
                }
            }
            net.straighten(&durations);
        }

        let mut src: Vec<usize> = kept.iter().map(|&a| net.src[a]).collect();
        let mut dst: Vec<usize> = kept.iter().map(|&a| net.dst[a]).collect();
        let kept_infos: Vec<ActInfo> = kept.iter().map(|&a| infos[a].clone()).collect();

        // ── C5: stages, early/late, reserves, PERT overlays ─────────────
        let outcome = cpm::schedule(
            &mut src,
            &mut dst,
            &kept_infos,
            net.n_events,
            &self.duration,
            is_pert,
        )?;

        let acts = kept_infos
            .into_iter()
            .zip(outcome.acts)
            .enumerate()
            .map(|(a, (info, sched))| ModelActivity { info, src: src[a], dst: dst[a], sched })
            .collect();

        debug!(p = self.p, is_pert, "network model built");
        Ok(NetworkModel {
            acts,
            events: outcome.events,
            p: self.p,
            debug: self.debug,
            is_pert,
            project_end: outcome.project_end,
        })
    }
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built AoA network with its schedule. Logically immutable; every
/// query is pure.
#[derive(Debug)]
pub struct NetworkModel {
    acts: Vec<ModelActivity>,
    events: Vec<cpm::EventSched>,
    p: f64,
    debug: bool,
    is_pert: bool,
    project_end: TimeTriple,
}

impl NetworkModel {
    /// Build with the default configuration (identity durations,
    /// `p = 0.95`, `default_risk = 0.3`).
    pub fn new(wbs: &Wbs, links: &Links) -> Result<Self, ModelError> {
        NetworkBuilder::new().build(wbs, links)
    }

    /// Maximum early event time.
    pub fn project_duration(&self) -> f64 {
        self.project_end.res
    }

    /// Number of arrows, dummies included.
    pub fn n_activities(&self) -> usize {
        self.acts.len()
    }

    /// Number of events.
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    pub fn is_pert(&self) -> bool {
        self.is_pert
    }

    /// Ids of real activities with zero reserve, in schedule order.
    pub fn critical_activities(&self) -> Vec<WbsId> {
        let mut critical: Vec<&ModelActivity> = self
            .acts
            .iter()
            .filter(|a| a.info.wbs_id != DUMMY_WBS && a.sched.reserve.res == 0.0)
            .collect();
        critical.sort_by(|x, y| {
            x.sched
                .early_start
                .res
                .partial_cmp(&y.sched.early_start.res)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(x.info.wbs_id.cmp(&y.info.wbs_id))
        });
        critical.iter().map(|a| a.info.wbs_id).collect()
    }

    /// PERT quantile of an event's early time at level `p`.
    /// Deterministic models answer with the point estimate.
    pub fn event_quantile(&self, event: usize, p: f64) -> Option<f64> {
        let e = self.events.get(event.checked_sub(1)?)?;
        Some(mpert::quantile(p, e.early, e.optimistic, e.pessimistic))
    }

    /// Probability that an event happens no later than `value`.
    pub fn event_prob(&self, event: usize, value: f64) -> Option<f64> {
        let e = self.events.get(event.checked_sub(1)?)?;
        Some(mpert::prob(value, e.early, e.optimistic, e.pessimistic))
    }

    /// Dictionary-shaped export of the whole model.
    pub fn to_snapshot(&self) -> NetworkSnapshot {
        let pert = self.is_pert;
        let dbg = self.debug;

        let activities = self
            .acts
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let s = &a.sched;
                ActivityRecord {
                    id: i + 1,
                    wbs_id: a.info.wbs_id,
                    letter: a.info.letter.clone(),
                    src_id: a.src,
                    dst_id: a.dst,
                    expected: a.info.est.expected,
                    duration: s.duration,
                    early_start: s.early_start.res,
                    late_start: s.late_start.res,
                    early_end: s.early_end.res,
                    late_end: s.late_end.res,
                    reserve: s.reserve.res,
                    data: a.info.data.clone(),
                    exp_var: pert.then_some(a.info.est.variance),
                    variance: pert.then_some(s.variance),
                    optimistic: pert.then_some(a.info.est.optimistic),
                    opt_start: pert.then_some(s.opt_start),
                    opt_end: pert.then_some(s.opt_end),
                    pessimistic: pert.then_some(a.info.est.pessimistic),
                    pes_start: pert.then_some(s.pes_start),
                    pes_end: pert.then_some(s.pes_end),
                    early_start_var: pert.then_some(s.early_start.var),
                    early_end_var: pert.then_some(s.early_end.var),
                    early_start_pqe: pert.then(|| {
                        mpert::quantile(self.p, s.early_start, s.opt_start, s.pes_start)
                    }),
                    early_end_pqe: pert
                        .then(|| mpert::quantile(self.p, s.early_end, s.opt_end, s.pes_end)),
                    late_end_prob: pert
                        .then(|| mpert::prob(s.late_end.res, s.early_end, s.opt_end, s.pes_end)),
                    early_start_err: dbg.then_some(s.early_start.err),
                    late_start_err: dbg.then_some(s.late_start.err),
                    early_end_err: dbg.then_some(s.early_end.err),
                    late_end_err: dbg.then_some(s.late_end.err),
                }
            })
            .collect();

        let events = self
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| EventRecord {
                id: i + 1,
                stage: e.stage,
                early: e.early.res,
                late: e.late.res,
                reserve: e.reserve.res,
                optimistic: pert.then_some(e.optimistic),
                pessimistic: pert.then_some(e.pessimistic),
                early_var: pert.then_some(e.early.var),
                early_pqe: pert
                    .then(|| mpert::quantile(self.p, e.early, e.optimistic, e.pessimistic)),
                late_prob: pert
                    .then(|| mpert::prob(e.late.res, e.early, e.optimistic, e.pessimistic)),
                early_err: dbg.then_some(e.early.err),
                late_err: dbg.then_some(e.late.err),
                reserve_err: dbg.then_some(e.reserve.err),
            })
            .collect();

        NetworkSnapshot {
            meta: SnapshotMeta {
                p: self.p,
                is_pert: pert,
                debug: dbg,
                project_duration: self.project_end.res,
            },
            activities,
            events,
        }
    }

    /// Tabular export: `(activities, events)` with `data` fields expanded
    /// into per-column scalars.
    pub fn to_tables(&self) -> (Table, Table) {
        let snapshot = self.to_snapshot();
        (snapshot.activity_table(), snapshot.event_table())
    }
}
