//! CPM/PERT schedule computation.
//!
//! Four sweeps over the optimized AoA network:
//!
//! 1. Stage: topological rank per event; events are renumbered by
//!    ascending stage so the remaining sweeps are linear scans.
//! 2. Early: forward pass with `choice_early` folding at every event.
//! 3. Late: backward pass seeded with the project end, folding with
//!    `choice_late`; the duration callback receives negated effort.
//! 4. Optimistic/pessimistic: scalar forward sweeps, PERT models only.
//!
//! Every time quantity is a [`TimeTriple`]; competing estimates within
//! their combined error bounds are mixed instead of discarded, so both
//! variances survive.

use tracing::debug;

use arrowplan_core::{ActivityCtx, DurationFn, ModelError, TimeTriple};

use crate::ActInfo;

/// Schedule results per event.
#[derive(Clone, Debug)]
pub(crate) struct EventSched {
    pub stage: usize,
    pub early: TimeTriple,
    pub late: TimeTriple,
    pub reserve: TimeTriple,
    pub optimistic: f64,
    pub pessimistic: f64,
}

/// Schedule results per activity arrow.
#[derive(Clone, Debug, Default)]
pub(crate) struct ActSched {
    pub early_start: TimeTriple,
    pub early_end: TimeTriple,
    pub late_start: TimeTriple,
    pub late_end: TimeTriple,
    pub reserve: TimeTriple,
    pub duration: f64,
    pub variance: f64,
    pub opt_start: f64,
    pub opt_end: f64,
    pub pes_start: f64,
    pub pes_end: f64,
}

pub(crate) struct CpmOutcome {
    pub events: Vec<EventSched>,
    pub acts: Vec<ActSched>,
    pub project_end: TimeTriple,
}

/// Run the schedule sweeps. `src`/`dst` are renumbered in place when the
/// stage pass reorders events.
pub(crate) fn schedule(
    src: &mut [usize],
    dst: &mut [usize],
    info: &[ActInfo],
    n_events: usize,
    duration: &DurationFn,
    is_pert: bool,
) -> Result<CpmOutcome, ModelError> {
    let stages = stage_and_renumber(src, dst, n_events)?;

    let mut out_arrows: Vec<Vec<usize>> = vec![Vec::new(); n_events + 1];
    let mut in_arrows: Vec<Vec<usize>> = vec![Vec::new(); n_events + 1];
    for a in 0..src.len() {
        out_arrows[src[a]].push(a);
        in_arrows[dst[a]].push(a);
    }

    let mut acts = vec![ActSched::default(); src.len()];

    // ── Early: forward sweep ────────────────────────────────────────────
    let mut early: Vec<Option<TimeTriple>> = vec![None; n_events + 1];
    early[1] = Some(TimeTriple::zero());
    for e in 1..=n_events {
        let base = early[e].ok_or_else(|| {
            ModelError::Internal(format!("event {e} unreached in the forward pass"))
        })?;
        for &a in &out_arrows[e] {
            let dur = duration_triple(1.0, &info[a], Some(base.res), duration, is_pert)?;
            let end = base + dur;
            acts[a].early_start = base;
            acts[a].early_end = end;
            acts[a].duration = dur.res;
            acts[a].variance = dur.var;
            let t = dst[a];
            early[t] = Some(match early[t] {
                None => end,
                Some(old) => TimeTriple::choice_early(old, end),
            });
        }
    }
    let early: Vec<TimeTriple> =
        early.into_iter().map(|e| e.unwrap_or(TimeTriple::zero())).collect();

    let mut project_end = early[n_events];
    for e in 1..=n_events {
        project_end = TimeTriple::choice_early(project_end, early[e]);
    }

    // ── Late: backward sweep from the project end ───────────────────────
    let mut late = vec![project_end; n_events + 1];
    for e in (1..=n_events).rev() {
        let base = late[e];
        for &a in &in_arrows[e] {
            let dur = duration_triple(-1.0, &info[a], Some(base.res), duration, is_pert)?;
            let start = base + dur;
            acts[a].late_end = base;
            acts[a].late_start = start;
            let s = src[a];
            late[s] = TimeTriple::choice_late(late[s], start);
        }
    }

    // ── Optimistic / pessimistic scalar sweeps ──────────────────────────
    let mut ev_opt = vec![0.0f64; n_events + 1];
    let mut ev_pes = vec![0.0f64; n_events + 1];
    if is_pert {
        for e in 1..=n_events {
            for &a in &out_arrows[e] {
                let d = call_dur(duration, &info[a], info[a].est.optimistic, Some(ev_opt[e]))?;
                acts[a].opt_start = ev_opt[e];
                acts[a].opt_end = ev_opt[e] + d;
                let t = dst[a];
                ev_opt[t] = ev_opt[t].max(acts[a].opt_end);
            }
        }
        for e in 1..=n_events {
            for &a in &out_arrows[e] {
                let d = call_dur(duration, &info[a], info[a].est.pessimistic, Some(ev_pes[e]))?;
                acts[a].pes_start = ev_pes[e];
                acts[a].pes_end = ev_pes[e] + d;
                let t = dst[a];
                ev_pes[t] = ev_pes[t].max(acts[a].pes_end);
            }
        }
    }

    // ── Reserves and invariants ─────────────────────────────────────────
    let mut events = Vec::with_capacity(n_events);
    for e in 1..=n_events {
        let reserve = (late[e] - early[e]).round_to_zero();
        if reserve.res < -reserve.err {
            return Err(ModelError::Internal(format!(
                "event {e} has negative reserve {}",
                reserve.res
            )));
        }
        events.push(EventSched {
            stage: stages[e],
            early: early[e],
            late: late[e],
            reserve,
            optimistic: ev_opt[e],
            pessimistic: ev_pes[e],
        });
    }

    for (a, sched) in acts.iter_mut().enumerate() {
        let start_res = (sched.late_start - sched.early_start).round_to_zero();
        let end_res = (sched.late_end - sched.early_end).round_to_zero();
        if start_res.res < -start_res.err || end_res.res < -end_res.err {
            return Err(ModelError::Internal(format!(
                "activity {} scheduled later than its latest time",
                info[a].wbs_id
            )));
        }
        // the more certain of the two reserves wins
        sched.reserve = if end_res.err < start_res.err {
            end_res
        } else if start_res.err < end_res.err {
            start_res
        } else {
            TimeTriple::choice_late(start_res, end_res)
        }
        .round_to_zero();
    }

    debug!(
        events = n_events,
        project_duration = project_end.res,
        "schedule computation complete"
    );
    Ok(CpmOutcome { events, acts, project_end })
}

/// Topological stage per event, then renumber events by ascending stage
/// (stable on the previous id). Returns stages indexed by the new ids.
fn stage_and_renumber(
    src: &mut [usize],
    dst: &mut [usize],
    n_events: usize,
) -> Result<Vec<usize>, ModelError> {
    let mut in_deg = vec![0usize; n_events + 1];
    let mut out_arrows: Vec<Vec<usize>> = vec![Vec::new(); n_events + 1];
    for a in 0..src.len() {
        in_deg[dst[a]] += 1;
        out_arrows[src[a]].push(a);
    }

    let mut queue: Vec<usize> = (1..=n_events).filter(|&e| in_deg[e] == 0).collect();
    if queue.len() != 1 {
        return Err(ModelError::Internal(format!(
            "expected one starting event, found {}",
            queue.len()
        )));
    }

    let mut stage = vec![0usize; n_events + 1];
    let mut head = 0;
    while head < queue.len() {
        let e = queue[head];
        head += 1;
        for &a in &out_arrows[e] {
            let t = dst[a];
            stage[t] = stage[t].max(stage[e] + 1);
            in_deg[t] -= 1;
            if in_deg[t] == 0 {
                queue.push(t);
            }
        }
    }
    if queue.len() != n_events {
        return Err(ModelError::Internal("event graph is not acyclic".into()));
    }

    let mut by_stage: Vec<usize> = (1..=n_events).collect();
    by_stage.sort_by_key(|&e| (stage[e], e));
    let mut new_of = vec![0usize; n_events + 1];
    for (pos, &old) in by_stage.iter().enumerate() {
        new_of[old] = pos + 1;
    }
    for a in 0..src.len() {
        src[a] = new_of[src[a]];
        dst[a] = new_of[dst[a]];
    }

    let mut stages = vec![0usize; n_events + 1];
    for old in 1..=n_events {
        stages[new_of[old]] = stage[old];
    }
    Ok(stages)
}

fn call_dur(
    duration: &DurationFn,
    info: &ActInfo,
    effort: f64,
    base: Option<f64>,
) -> Result<f64, ModelError> {
    if effort == 0.0 {
        return Ok(0.0);
    }
    let ctx = ActivityCtx { wbs_id: info.wbs_id, letter: &info.letter, data: &info.data };
    let d = duration(effort, &ctx, base);
    if !d.is_finite() || (d != 0.0 && d.signum() != effort.signum()) {
        return Err(ModelError::Internal(format!(
            "duration callback returned {d} for effort {effort} of activity {}",
            info.wbs_id
        )));
    }
    Ok(d)
}

/// Resolve the duration triple of one arrow. `dir` is `+1` on forward
/// passes and `-1` on backward passes, so the callback sees signed effort.
pub(crate) fn duration_triple(
    dir: f64,
    info: &ActInfo,
    base: Option<f64>,
    duration: &DurationFn,
    is_pert: bool,
) -> Result<TimeTriple, ModelError> {
    let res = call_dur(duration, info, dir * info.est.expected, base)?;
    let mut var = 0.0;
    if is_pert && info.est.variance > 0.0 {
        let d_opt = call_dur(duration, info, dir * info.est.optimistic, base)?;
        let d_pes = call_dur(duration, info, dir * info.est.pessimistic, base)?;
        var = match info.gamma {
            Some(gamma) => {
                let v = (res - d_opt) * (d_pes - res) / (3.0 + gamma);
                let span = d_pes - d_opt;
                if v < -f64::EPSILON.sqrt() * span * span {
                    return Err(ModelError::Internal(format!(
                        "negative propagated variance {v} for activity {}",
                        info.wbs_id
                    )));
                }
                v.max(0.0)
            }
            None => info.est.variance,
        };
    }
    Ok(TimeTriple { res, var, err: f64::EPSILON * res.abs() })
}
